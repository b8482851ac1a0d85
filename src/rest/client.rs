use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{AblyError, Result};
use crate::proto::protocol::Protocol;
use crate::rest::channels::{ChannelRegistry, RestChannel};
use crate::rest::dispatcher::Dispatcher;
use crate::rest::hosts::HostPolicy;
use crate::rest::options::{ClientOptions, ABLY_LIB_HEADER, ABLY_VERSION, ABLY_VERSION_HEADER, LIBRARY_STRING};
use crate::rest::transport::{HttpTransport, Method, Request, Response};


/// State shared between a client and its channels
pub(crate) struct ClientInner {
    options: ClientOptions,
    protocol: Protocol,
    dispatcher: Dispatcher,
}

impl ClientInner {
    pub(crate) fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Request {
        Request::new(method, path)
            .with_header(ABLY_VERSION_HEADER, ABLY_VERSION)
            .with_header(ABLY_LIB_HEADER, LIBRARY_STRING)
            .with_header("Accept", self.protocol.content_type())
    }

    pub(crate) fn request_with_body<T: Serialize + ?Sized>(&self, method: Method, path: &str, body: &T) -> Result<Request> {
        let body = self.protocol.encode(body)?;
        Ok(self.request(method, path)
            .with_header("Content-Type", self.protocol.content_type())
            .with_body(body))
    }

    /// sends the request through the dispatcher, turning a non-success response into an error
    pub(crate) async fn execute(&self, request: &Request) -> Result<Response> {
        let response = self.dispatcher.execute(request).await?;
        if !response.is_success() {
            let info = response.error_info();
            debug!(status = response.status, path = %request.path, "request failed: {}", info);
            return Err(AblyError::NonRetryableResponse(info));
        }
        Ok(response)
    }

    /// decodes a response body in the protocol of its content type, falling back to the
    ///  client's protocol
    pub(crate) fn decode_body<T: DeserializeOwned>(&self, response: &Response) -> Result<T> {
        response.protocol()
            .unwrap_or(self.protocol)
            .decode(&response.body)
    }
}


pub struct RestClient {
    inner: Arc<ClientInner>,
    channels: ChannelRegistry,
}

impl RestClient {
    pub fn new(options: ClientOptions, transport: Arc<dyn HttpTransport>) -> Result<RestClient> {
        options.validate()?;

        let hosts = Arc::new(HostPolicy::from_options(&options));
        debug!(primary = hosts.primary(), fallback = ?hosts.fallback_source(), "creating REST client");

        let dispatcher = Dispatcher::new(hosts, transport, options.http_max_retry_count);
        let inner = Arc::new(ClientInner {
            protocol: options.protocol(),
            options,
            dispatcher,
        });

        Ok(RestClient {
            channels: ChannelRegistry::new(inner.clone()),
            inner,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// shorthand for `channels().get(name)`
    pub fn channel(&self, name: &str) -> Arc<RestChannel> {
        self.channels.get(name)
    }

    /// the service's current time
    pub async fn time(&self) -> Result<SystemTime> {
        let response = self.get("/time").await?;
        let times: Vec<i64> = self.inner.decode_body(&response)?;

        let millis = times.first()
            .and_then(|&ms| u64::try_from(ms).ok())
            .ok_or_else(|| AblyError::UnexpectedResponse(format!("expected a non-negative timestamp, was {:?}", times)))?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        let request = self.inner.request(Method::Get, path);
        self.inner.execute(&request).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let request = self.inner.request_with_body(Method::Post, path, body)?;
        self.inner.execute(&request).await
    }
}
