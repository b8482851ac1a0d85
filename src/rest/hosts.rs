use tracing::trace;

use crate::rest::options::{ClientOptions, DEFAULT_FALLBACK_HOSTS, DEFAULT_REST_HOST};
use crate::util::random::{Random, RngRandom};


/// Where the fallback hosts for a request sequence come from
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FallbackSource {
    /// the configured list, in the configured order
    Explicit,
    /// the default pool, shuffled for every sequence
    DefaultPool,
    /// only the primary host is tried
    None,
}

/// Decides which hosts a logical request is sent to, and in which order. The primary host always
///  comes first, and no host appears more than once.
#[derive(Clone, Debug)]
pub struct HostPolicy {
    primary: String,
    fallback_hosts: Option<Vec<String>>,
    use_default_fallbacks: bool,
    default_host: String,
    default_pool: Vec<String>,
}

impl HostPolicy {
    pub fn new(
        primary: impl Into<String>,
        fallback_hosts: Option<Vec<String>>,
        use_default_fallbacks: bool,
        default_host: impl Into<String>,
        default_pool: Vec<String>,
    ) -> HostPolicy {
        HostPolicy {
            primary: primary.into(),
            fallback_hosts,
            use_default_fallbacks,
            default_host: default_host.into(),
            default_pool,
        }
    }

    pub fn from_options(options: &ClientOptions) -> HostPolicy {
        HostPolicy::new(
            options.rest_host.clone(),
            options.fallback_hosts.clone(),
            options.fallback_hosts_use_default,
            DEFAULT_REST_HOST,
            DEFAULT_FALLBACK_HOSTS.iter().map(|h| h.to_string()).collect(),
        )
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn fallback_source(&self) -> FallbackSource {
        if self.fallback_hosts.is_some() {
            FallbackSource::Explicit
        }
        else if self.use_default_fallbacks || self.primary == self.default_host {
            FallbackSource::DefaultPool
        }
        else {
            FallbackSource::None
        }
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts_with::<RngRandom>()
    }

    pub fn hosts_with<R: Random>(&self) -> Vec<String> {
        let fallbacks = match self.fallback_source() {
            FallbackSource::Explicit => self.fallback_hosts.clone().unwrap_or_default(),
            FallbackSource::DefaultPool => R::permutation(self.default_pool.len())
                .into_iter()
                .filter_map(|i| self.default_pool.get(i).cloned())
                .collect(),
            FallbackSource::None => Vec::new(),
        };

        let mut result = Vec::with_capacity(1 + fallbacks.len());
        result.push(self.primary.clone());
        for host in fallbacks {
            if !result.contains(&host) {
                result.push(host);
            }
        }
        trace!(hosts = ?result, "host sequence");
        result
    }
}
