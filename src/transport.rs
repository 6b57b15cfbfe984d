//! The transport seam and the bundled reqwest-backed implementation.

use crate::error::{Error, Result};
use crate::request::{Options, Request};
use crate::response::Response;
use async_trait::async_trait;

/// Error type transports surface; the pipeline wraps it into a retryable failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Executes one frozen request and reads the full response.
///
/// Implementations must be safe to invoke concurrently. I/O failures are reported as
/// [`BoxError`]; the engine wraps them into [`Error::Retryable`](crate::Error) with no
/// `retry_after` hint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` under `options`, buffering the response body.
    async fn execute(
        &self,
        request: &Request,
        options: &Options,
    ) -> std::result::Result<Response, BoxError>;
}

/// The bundled transport, backed by a pooled `reqwest` client.
///
/// Connect-timeout and redirect behavior are fixed at construction from the options
/// given to [`with_options`](Self::with_options); the per-call read timeout applies to
/// each request individually.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// A transport with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(&Options::default())
    }

    /// A transport configured from `options`.
    pub fn with_options(options: &Options) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(options.connect_timeout());
        builder = if options.follow_redirects() {
            builder.redirect(reqwest::redirect::Policy::limited(10))
        } else {
            builder.redirect(reqwest::redirect::Policy::none())
        };
        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP transport: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &Request,
        options: &Options,
    ) -> std::result::Result<Response, BoxError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .timeout(options.read_timeout());

        for field in request.headers() {
            for value in field.values() {
                builder = builder.header(field.name(), value);
            }
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        Ok(Response::builder()
            .status(status)
            .headers(headers)
            .body_bytes(bytes.to_vec())
            .request(request.clone())
            .build())
    }
}
