use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::{AblyError, Result};
use crate::rest::hosts::HostPolicy;
use crate::rest::transport::{HttpTransport, Request, Response, TransportError};


/// Sends a logical request to the hosts of a [HostPolicy] sequence until one of them produces
///  a response that is not a server error. There is no delay between attempts.
pub struct Dispatcher {
    hosts: Arc<HostPolicy>,
    transport: Arc<dyn HttpTransport>,
    max_retry_count: Option<usize>,
}

impl Dispatcher {
    pub fn new(hosts: Arc<HostPolicy>, transport: Arc<dyn HttpTransport>, max_retry_count: Option<usize>) -> Dispatcher {
        Dispatcher {
            hosts,
            transport,
            max_retry_count,
        }
    }

    pub fn host_policy(&self) -> &HostPolicy {
        &self.hosts
    }

    /// Returns the first response that is not a 5xx, 4xx included. Connection failures and
    ///  server errors move on to the next host, and once all hosts are used up the last failure
    ///  is returned. A cancelled send ends the sequence immediately.
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        let hosts = self.hosts.hosts();
        self.execute_on(&hosts, request).await
    }

    pub async fn execute_on(&self, hosts: &[String], request: &Request) -> Result<Response> {
        let max_attempts = match self.max_retry_count {
            Some(n) => n.saturating_add(1),
            None => hosts.len(),
        };

        let mut last_failure = None;
        for (attempt, host) in hosts.iter().take(max_attempts).enumerate() {
            trace!(host = %host, attempt, method = request.method.as_str(), path = %request.path, "sending request");

            match self.transport.send(host, request).await {
                Ok(response) if response.is_server_error() => {
                    let info = response.error_info();
                    warn!(host = %host, status = response.status, "server error, trying next host: {}", info);
                    last_failure = Some(AblyError::TransportFailure {
                        host: host.clone(),
                        status: Some(response.status),
                        reason: info.to_string(),
                    });
                }
                Ok(response) => {
                    debug!(host = %host, status = response.status, "received response");
                    return Ok(response);
                }
                Err(TransportError::Cancelled) => {
                    debug!(host = %host, "request cancelled - not trying other hosts");
                    return Err(AblyError::Cancelled);
                }
                Err(TransportError::Connection(e)) => {
                    warn!(host = %host, "connection error, trying next host: {}", e);
                    last_failure = Some(AblyError::TransportFailure {
                        host: host.clone(),
                        status: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        warn!(path = %request.path, "no host produced a response");
        Err(last_failure.unwrap_or_else(|| AblyError::TransportFailure {
            host: String::new(),
            status: None,
            reason: "no hosts to send the request to".to_string(),
        }))
    }
}
