//! Codec seams: encoders, decoders, and the error decoder that drives retries.
//!
//! The engine consumes these as trait objects. The bundled defaults speak JSON for
//! bodies and results, `application/x-www-form-urlencoded` for form-parameter bodies,
//! and turn 5xx/429 responses into retryable failures honoring `Retry-After`.

use crate::binding::value_to_string;
use crate::error::{Error, Result, RetryableError};
use crate::iface::ReturnType;
use crate::response::Response;
use crate::template::RequestTemplate;
use http::Method;
use serde_json::Value;
use std::time::{Duration, SystemTime};

/// What the invocation pipeline hands back to the dispatcher.
#[derive(Debug)]
pub enum Decoded {
    /// The operation declared no result; the body was drained.
    Unit,
    /// The operation declared `ReturnType::Response`; the caller owns the body.
    Response(Response),
    /// The decoder's output, deserialized further by typed facades.
    Value(Value),
}

/// What kind of payload an encoder is being handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyType {
    /// A map of form fields collected from unreferenced `Param` bindings.
    Form,
    /// A body argument with its declared type name, when one was declared.
    Typed(Option<String>),
    /// The full argument list of an always-encode-body operation.
    ArgList,
}

/// Populates a template's body from an argument value.
///
/// Encode failures propagate as non-retryable [`Error::Encode`].
pub trait Encoder: Send + Sync {
    /// Encodes `value` into the template's body slot.
    fn encode(&self, value: &Value, body_type: &BodyType, template: &mut RequestTemplate)
        -> Result<()>;
}

/// Turns a successful response into a decoded value.
///
/// Decode failures propagate as non-retryable [`Error::Decode`] unless the decoder
/// itself raises [`Error::Retryable`].
pub trait Decoder: Send + Sync {
    /// Decodes the buffered response body for the declared result type.
    fn decode(&self, response: &Response, return_type: &ReturnType) -> Result<Value>;
}

/// Maps a non-2xx response to the error the caller sees.
///
/// Returning [`Error::Retryable`] hands the failure to the retry policy; anything else
/// propagates immediately.
pub trait ErrorDecoder: Send + Sync {
    /// Decodes an error response for the named operation.
    fn decode(&self, config_key: &str, response: &Response) -> Error;
}

/// Flattens a query-map argument into name/value pairs.
pub trait QueryMapEncoder: Send + Sync {
    /// Yields the pairs to fold into the query string, in iteration order.
    fn encode(&self, value: &Value) -> Result<Vec<(String, String)>>;
}

/// The bundled encoder: JSON bodies, form-encoded form parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(
        &self,
        value: &Value,
        body_type: &BodyType,
        template: &mut RequestTemplate,
    ) -> Result<()> {
        match body_type {
            BodyType::Form => {
                let fields = value.as_object().ok_or_else(|| {
                    Error::Encode("form parameters must collect into an object".to_string())
                })?;
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (name, field) in fields {
                    match field {
                        Value::Array(items) => {
                            for item in items {
                                if let Some(text) = value_to_string(item) {
                                    serializer.append_pair(name, &text);
                                }
                            }
                        }
                        other => {
                            if let Some(text) = value_to_string(other) {
                                serializer.append_pair(name, &text);
                            }
                        }
                    }
                }
                template.set_body(serializer.finish().into_bytes(), Some("UTF-8".to_string()));
                if template.header_value("Content-Type").is_none() {
                    template.header(
                        "Content-Type",
                        ["application/x-www-form-urlencoded".to_string()],
                    );
                }
            }
            BodyType::Typed(_) | BodyType::ArgList => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| Error::Encode(format!("serializing request body: {e}")))?;
                template.set_body(bytes, Some("UTF-8".to_string()));
                if template.header_value("Content-Type").is_none() {
                    template.header("Content-Type", ["application/json".to_string()]);
                }
            }
        }
        Ok(())
    }
}

/// The bundled decoder: parses the body as JSON. Empty bodies decode to `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, response: &Response, _return_type: &ReturnType) -> Result<Value> {
        let Some(body) = response.body() else {
            return Ok(Value::Null);
        };
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(body.as_bytes()).map_err(|e| Error::Decode {
            config_key: config_key_of(response),
            status: response.status(),
            raw_body: body.text(),
            message: e.to_string(),
        })
    }
}

/// The bundled error decoder.
///
/// 5xx and 429 responses become retryable; a `Retry-After` header (delta-seconds or
/// HTTP-date) is surfaced as the absolute `retry_after` timestamp. Everything else
/// stays a plain [`Error::Status`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusErrorDecoder;

impl ErrorDecoder for StatusErrorDecoder {
    fn decode(&self, config_key: &str, response: &Response) -> Error {
        let status = response.status();
        let error = Error::Status {
            config_key: config_key.to_string(),
            status,
            raw_body: response.text(),
            headers: response.headers().clone(),
        };
        if status.is_server_error() || status.as_u16() == 429 {
            let method = response
                .request()
                .map(|r| r.method().clone())
                .unwrap_or(Method::GET);
            return Error::Retryable(RetryableError {
                method,
                retry_after: parse_retry_after(response),
                cause: Box::new(error),
            });
        }
        error
    }
}

/// Parses `Retry-After` as delta-seconds or an HTTP-date into an absolute timestamp.
pub(crate) fn parse_retry_after(response: &Response) -> Option<SystemTime> {
    let header = response.header("retry-after")?;
    if let Ok(seconds) = header.parse::<u64>() {
        return Some(SystemTime::now() + Duration::from_secs(seconds));
    }
    httpdate::parse_http_date(header).ok()
}

/// The bundled query-map encoder: folds a JSON object into pairs, dropping nulls and
/// repeating array entries under their key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectQueryMapEncoder;

impl QueryMapEncoder for ObjectQueryMapEncoder {
    fn encode(&self, value: &Value) -> Result<Vec<(String, String)>> {
        let entries = value.as_object().ok_or_else(|| {
            Error::Encode("query map argument must be an object".to_string())
        })?;
        let mut pairs = Vec::new();
        for (name, entry) in entries {
            match entry {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        let text = value_to_string(item).ok_or_else(|| {
                            Error::Encode(format!("query map entry {name:?} is not a scalar"))
                        })?;
                        pairs.push((name.clone(), text));
                    }
                }
                other => {
                    let text = value_to_string(other).ok_or_else(|| {
                        Error::Encode(format!("query map entry {name:?} is not a scalar"))
                    })?;
                    pairs.push((name.clone(), text));
                }
            }
        }
        Ok(pairs)
    }
}

fn config_key_of(response: &Response) -> String {
    response
        .request()
        .and_then(|r| r.request_template().method_metadata())
        .map(|md| md.config_key().to_string())
        .unwrap_or_default()
}
