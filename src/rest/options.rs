use crate::error::{AblyError, Result};
use crate::proto::cipher::CipherParams;
use crate::proto::protocol::Protocol;


pub const DEFAULT_REST_HOST: &str = "rest.ably.io";

pub const DEFAULT_FALLBACK_HOSTS: [&str; 5] = [
    "a.ably-realtime.com",
    "b.ably-realtime.com",
    "c.ably-realtime.com",
    "d.ably-realtime.com",
    "e.ably-realtime.com",
];

pub const ABLY_VERSION_HEADER: &str = "X-Ably-Version";
pub const ABLY_VERSION: &str = "1.0";
pub const ABLY_LIB_HEADER: &str = "X-Ably-Lib";
pub const LIBRARY_STRING: &str = concat!("rust-", env!("CARGO_PKG_VERSION"));


#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// the primary host - requests always go here first
    pub rest_host: String,

    /// `None` uses the default rules, `Some(vec![])` disables fallback completely, and a
    ///  non-empty list replaces the default fallback hosts
    pub fallback_hosts: Option<Vec<String>>,
    /// use the default fallback hosts even if `rest_host` is overridden
    pub fallback_hosts_use_default: bool,

    /// msgpack if true, JSON otherwise
    pub use_binary_protocol: bool,

    /// Upper bound for the number of fallback hosts tried after the primary host failed. By
    ///  default, every host in the fallback sequence is tried once.
    pub http_max_retry_count: Option<usize>,
}

impl ClientOptions {
    pub fn new() -> ClientOptions {
        ClientOptions {
            rest_host: DEFAULT_REST_HOST.to_string(),
            fallback_hosts: None,
            fallback_hosts_use_default: false,
            use_binary_protocol: true,
            http_max_retry_count: None,
        }
    }

    pub fn with_rest_host(mut self, rest_host: impl Into<String>) -> ClientOptions {
        self.rest_host = rest_host.into();
        self
    }

    pub fn with_fallback_hosts(mut self, fallback_hosts: Vec<String>) -> ClientOptions {
        self.fallback_hosts = Some(fallback_hosts);
        self
    }

    pub fn protocol(&self) -> Protocol {
        if self.use_binary_protocol {
            Protocol::Msgpack
        }
        else {
            Protocol::Json
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rest_host.trim().is_empty() {
            return Err(AblyError::InvalidOptions("rest host must not be empty".to_string()));
        }
        if let Some(fallback_hosts) = &self.fallback_hosts {
            if fallback_hosts.iter().any(|h| h.trim().is_empty()) {
                return Err(AblyError::InvalidOptions(format!("fallback hosts must not be empty: {:?}", fallback_hosts)));
            }
        }
        Ok(())
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions::new()
    }
}


#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelOptions {
    /// messages are encrypted when publishing and decrypted when reading if this is set
    pub cipher: Option<CipherParams>,
}

impl ChannelOptions {
    pub fn with_cipher(cipher: CipherParams) -> ChannelOptions {
        ChannelOptions {
            cipher: Some(cipher),
        }
    }
}
