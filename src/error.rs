//! Error types for the binding pipeline.
//!
//! This module provides comprehensive error types that preserve maximum debugging information
//! while remaining ergonomic to use. Errors carry the `config_key` of the operation that
//! produced them wherever one is known, so failures can be correlated with log output.

use http::{HeaderMap, Method, StatusCode};
use std::time::SystemTime;

/// The main error type for the client engine.
///
/// Build-time failures (`Configuration`) and call-time failures share one enum so callers
/// match on a single type. Only [`Error::Retryable`] drives the retry loop; everything else
/// propagates immediately, preserving cause chains.
///
/// # Examples
///
/// ```no_run
/// use veneer::{Api, Arg, Error};
///
/// # async fn example(api: Api) {
/// match api.invoke::<serde_json::Value>("get", vec![Arg::from("1")]).await {
///     Ok(value) => println!("Success: {:?}", value),
///     Err(Error::Status { status, raw_body, .. }) => {
///         eprintln!("HTTP error {}: {}", status, raw_body);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A contract or builder violation detected at build time.
    ///
    /// Examples: missing HTTP verb, generic target interface, more than one parent
    /// interface, duplicate query-map parameters, empty binding values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An argument was incompatible with its expander or collection format at call time.
    #[error("binding error for {config_key}: {message}")]
    Binding {
        /// The operation whose invocation failed.
        config_key: String,
        /// What went wrong.
        message: String,
    },

    /// The encoder failed to produce a request body.
    #[error("encode error: {0}")]
    Encode(String),

    /// The decoder failed to turn a response body into the expected result.
    ///
    /// Preserves the raw response text alongside the decoder's message, making
    /// deserialization issues debuggable in production.
    #[error("decode error for {config_key} (status {status}): {message}")]
    Decode {
        /// The operation whose response failed to decode.
        config_key: String,
        /// The HTTP status of the response being decoded.
        status: StatusCode,
        /// The raw response body.
        raw_body: String,
        /// The decoder's error message.
        message: String,
    },

    /// The server returned a non-2xx status and the error decoder kept it as-is.
    #[error("HTTP {status} reading {config_key}")]
    Status {
        /// The operation that received the response.
        config_key: String,
        /// The HTTP status code.
        status: StatusCode,
        /// The raw response body.
        raw_body: String,
        /// The response headers.
        headers: HeaderMap,
    },

    /// A low-level I/O failure from the transport.
    ///
    /// The pipeline wraps this into [`Error::Retryable`] before the retry policy sees it;
    /// a bare `Transport` error only escapes when raised outside the execution loop.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A failure the retry policy is allowed to act on.
    #[error(transparent)]
    Retryable(RetryableError),

    /// The dispatch table has no operation under the invoked name.
    #[error("method \"{method}\" is not handled by target {target}")]
    UnknownMethod {
        /// The target the call was routed to.
        target: String,
        /// The unmatched operation name.
        method: String,
    },
}

impl Error {
    /// Returns `true` if this error may drive the retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Retryable(_))
    }

    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Decode { status, .. } => Some(*status),
            Error::Retryable(e) => e.cause.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error carries one.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Error::Status { raw_body, .. } => Some(raw_body),
            Error::Decode { raw_body, .. } => Some(raw_body),
            Error::Retryable(e) => e.cause.raw_body(),
            _ => None,
        }
    }

    /// Wraps a transport failure into the retryable form the pipeline feeds the retry
    /// policy. Transport I/O errors never carry a `retry_after` hint.
    pub(crate) fn retryable_io(
        method: Method,
        cause: Box<dyn std::error::Error + Send + Sync>,
    ) -> Error {
        Error::Retryable(RetryableError {
            method,
            retry_after: None,
            cause: Box::new(Error::Transport(cause)),
        })
    }
}

/// The only signal the retry policy acts on.
///
/// Carries the causal error, the HTTP method (so policies can distinguish idempotence
/// cases), and an optional absolute timestamp before which a retry is pointless.
#[derive(thiserror::Error, Debug)]
#[error("retryable error executing {method}: {cause}")]
pub struct RetryableError {
    /// The HTTP method of the failed request.
    pub method: Method,
    /// Absolute time the server asked the client to wait until, when it said so.
    pub retry_after: Option<SystemTime>,
    /// The underlying failure.
    #[source]
    pub cause: Box<Error>,
}

impl RetryableError {
    /// Consumes the wrapper and yields its cause, for the unwrap propagation policy.
    pub fn into_cause(self) -> Error {
        *self.cause
    }
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_predicate() {
        let err = Error::retryable_io(Method::GET, "connection reset".into());
        assert!(err.is_retryable());

        let err = Error::Configuration("no verb".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_reaches_through_retryable() {
        let inner = Error::Status {
            config_key: "Eg#get(String)".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
            raw_body: "busy".to_string(),
            headers: HeaderMap::new(),
        };
        let err = Error::Retryable(RetryableError {
            method: Method::GET,
            retry_after: None,
            cause: Box::new(inner),
        });
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.raw_body(), Some("busy"));
    }
}
