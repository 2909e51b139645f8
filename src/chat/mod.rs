pub mod api;
pub mod connection;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod routing;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ChatApi, StreamChatClient};
pub use connection::ChatConnection;
pub use directory::{ChannelDirectory, PortalDirectory};
pub use dispatcher::{Dispatcher, Outbox, SelfEchoFilter};
pub use error::ChatError;
pub use routing::ChannelRoutingProvider;
pub use types::{ChannelInfo, ConnectionStatus, InboundChatMessage};
