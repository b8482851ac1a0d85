//! The REST client: host failover, request dispatch and channels.

pub mod channels;
pub mod client;
pub mod dispatcher;
pub mod hosts;
pub mod options;
pub mod transport;

pub use channels::{ChannelRegistry, RestChannel};
pub use client::RestClient;
pub use options::{ChannelOptions, ClientOptions};
