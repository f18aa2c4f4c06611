pub mod activity;
pub mod delta;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod identity;
pub mod messages;
pub mod ready;
pub mod report;

pub use activity::*;
pub use delta::*;
pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use identity::*;
pub use messages::*;
pub use ready::*;
pub use report::*;
