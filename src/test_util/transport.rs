use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::proto::protocol::JSON_CONTENT_TYPE;
use crate::rest::transport::{HttpTransport, Method, Request, Response, TransportError};


type Responder = dyn Fn(&str, &Request) -> Result<Response, TransportError> + Send + Sync;

/// An [HttpTransport] that records every request together with the host it was sent to, and
///  replies with whatever its responder returns.
pub struct TrackingMockTransport {
    tracker: RwLock<Vec<(String, Request)>>,
    responder: Box<Responder>,
}

impl TrackingMockTransport {
    pub fn new(responder: impl Fn(&str, &Request) -> Result<Response, TransportError> + Send + Sync + 'static) -> Arc<TrackingMockTransport> {
        Arc::new(TrackingMockTransport {
            tracker: Default::default(),
            responder: Box::new(responder),
        })
    }

    /// replies to every request with the given status and an empty JSON object
    pub fn with_status(status: u16) -> Arc<TrackingMockTransport> {
        Self::new(move |_, _| Ok(Response::new(status, Bytes::from_static(b"{}"))
            .with_header("content-type", JSON_CONTENT_TYPE)))
    }

    /// fails every request with a connection error
    pub fn unreachable() -> Arc<TrackingMockTransport> {
        Self::new(|host, _| Err(TransportError::Connection(anyhow!("{} is unreachable", host))))
    }

    pub async fn num_attempts(&self) -> usize {
        self.tracker.read().await.len()
    }

    pub async fn hosts(&self) -> Vec<String> {
        self.tracker.read().await
            .iter()
            .map(|(host, _)| host.clone())
            .collect()
    }

    pub async fn requests(&self) -> Vec<(String, Request)> {
        self.tracker.read().await.clone()
    }

    /// removes the oldest recorded request after checking its target, and returns it for
    ///  further inspection
    pub async fn assert_request_sent(&self, host: &str, method: Method, path: &str) -> Request {
        let mut lock = self.tracker.write().await;
        if lock.is_empty() {
            panic!("no request was sent");
        }

        let (actual_host, request) = lock.remove(0);
        assert_eq!(actual_host, host);
        assert_eq!(request.method, method);
        assert_eq!(request.path, path);
        request
    }

    pub async fn assert_no_remaining_requests(&self) {
        assert!(
            self.tracker.read().await
                .is_empty()
        );
    }
}

#[async_trait]
impl HttpTransport for TrackingMockTransport {
    async fn send(&self, host: &str, request: &Request) -> Result<Response, TransportError> {
        self.tracker.write().await
            .push((host.to_string(), request.clone()));
        (self.responder)(host, request)
    }
}
