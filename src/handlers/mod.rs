pub mod health;
pub mod diagnostics;
pub mod report_logs;

pub use health::*;
pub use diagnostics::*;
pub use report_logs::*;
