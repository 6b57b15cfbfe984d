//! Frozen requests and transport options.

use crate::template::{HeaderField, RequestTemplate};
use http::Method;
use std::time::Duration;

/// The immutable, post-interceptor snapshot fed to the transport.
///
/// Carries a read-only handle to the template it was frozen from, which in turn
/// exposes the owning [`MethodMetadata`](crate::MethodMetadata) and
/// [`Target`](crate::Target) so transports, encoders, and decoders can inspect
/// operation identity.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: Vec<HeaderField>,
    body: Option<Vec<u8>>,
    charset: Option<String>,
    template: RequestTemplate,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        url: String,
        headers: Vec<HeaderField>,
        body: Option<Vec<u8>>,
        charset: Option<String>,
        template: RequestTemplate,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            charset,
            template,
        }
    }

    /// The HTTP verb.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The fully resolved URL, free of `{name}` placeholders.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The header fields, in insertion order of distinct names.
    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    /// The body bytes, when present.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The charset label recorded for the body.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// The template this request was frozen from.
    pub fn request_template(&self) -> &RequestTemplate {
        &self.template
    }
}

/// Per-call transport options.
///
/// The engine's default applies unless an invocation passes an
/// [`Arg::Options`](crate::Arg) override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    connect_timeout: Duration,
    read_timeout: Duration,
    follow_redirects: bool,
}

impl Options {
    /// Options with explicit timeouts and redirect behavior.
    pub fn new(connect_timeout: Duration, read_timeout: Duration, follow_redirects: bool) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            follow_redirects,
        }
    }

    /// Time allowed to establish a connection.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Time allowed for the full request/response exchange.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Whether the transport follows redirects.
    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            follow_redirects: true,
        }
    }
}
