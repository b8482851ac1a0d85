use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;

use crate::proto::error_info::ErrorInfo;
use crate::proto::protocol::Protocol;


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A logical request, independent of the host it is sent to
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Request {
        Request {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Request {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Request {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Response {
        Response {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Response {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// the protocol of the body according to its content type, if that is a known one
    pub fn protocol(&self) -> Option<Protocol> {
        self.header("content-type")
            .and_then(Protocol::from_content_type)
    }

    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::from_response(self.status, &self.body, self.protocol().unwrap_or(Protocol::Json))
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}


#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// the request did not produce a response, e.g. because the host was unreachable
    #[error("connection error: {0}")]
    Connection(anyhow::Error),
    #[error("cancelled")]
    Cancelled,
}

/// Sends a single request to a single host. TLS, proxies, connection pooling and timeouts are
///  the implementation's concern.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, host: &str, request: &Request) -> Result<Response, TransportError>;
}
