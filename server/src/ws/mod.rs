pub mod actor;
pub mod handler;
pub mod registry;

pub use registry::{Connection, ConnectionId, ConnectionRegistry, ConnectionSender, DeliveryError};
