pub mod handler;
pub mod protocol;

pub use protocol::{ClientMsg, EntitySnapshot, ProtocolError, ServerMsg};
