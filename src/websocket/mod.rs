pub mod connection;
pub mod handler;
pub mod msg_close_handler;
pub mod msg_delta_handler;
pub mod msg_join_handler;
pub mod msg_sync_handler;
pub mod registry;
pub mod session;

pub use connection::{Connection, WsConnection};
pub use registry::{ConnectionRegistry, RoomKey};
pub use session::{Flow, RoomSession};
