//! Response wrapper that preserves raw response details for decoding and debugging.

use crate::request::Request;
use http::{HeaderMap, StatusCode};

/// A buffered response body with its recorded charset.
#[derive(Debug, Clone)]
pub struct ResponseBody {
    bytes: Vec<u8>,
    charset: Option<String>,
}

impl ResponseBody {
    /// A body from raw bytes with an optional charset label.
    pub fn new(bytes: Vec<u8>, charset: Option<String>) -> Self {
        Self { bytes, charset }
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The body rendered as text. Invalid sequences in the declared charset are
    /// replaced rather than failing; decoders wanting strictness parse the bytes.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// The charset label, when one was declared.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the body is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An HTTP response as seen by the decoding pipeline.
///
/// Owned by whoever invoked the transport; the body is buffered and released on drop.
/// The only case in which a caller owns a `Response` is when an operation's declared
/// return type is `Response` itself.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Option<ResponseBody>,
    request: Option<Request>,
}

impl Response {
    /// Starts building a response. Transports construct responses this way.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// The HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase, when the transport surfaced one.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of the named header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The body, when one was read.
    pub fn body(&self) -> Option<&ResponseBody> {
        self.body.as_ref()
    }

    /// The body as text, or an empty string when absent.
    pub fn text(&self) -> String {
        self.body.as_ref().map(ResponseBody::text).unwrap_or_default()
    }

    /// The request that produced this response, when the transport attached it.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// Replaces the body, returning the previous one. Response interceptors use this
    /// to rewrite payloads.
    pub fn replace_body(&mut self, body: Option<ResponseBody>) -> Option<ResponseBody> {
        std::mem::replace(&mut self.body, body)
    }
}

/// Builder for [`Response`].
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: Option<StatusCode>,
    reason: Option<String>,
    headers: HeaderMap,
    body: Option<ResponseBody>,
    request: Option<Request>,
}

impl ResponseBuilder {
    /// Sets the status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the reason phrase.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the response headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the body from raw bytes; the charset is taken from `Content-Type` when
    /// already set via [`headers`](Self::headers).
    pub fn body_bytes(mut self, bytes: Vec<u8>) -> Self {
        let charset = charset_of(&self.headers);
        self.body = Some(ResponseBody::new(bytes, charset));
        self
    }

    /// Sets the body from text.
    pub fn body_text(self, text: impl Into<String>) -> Self {
        self.body_bytes(text.into().into_bytes())
    }

    /// Attaches the originating request.
    pub fn request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    /// Builds the response. Status defaults to 200 when unset.
    pub fn build(self) -> Response {
        Response {
            status: self.status.unwrap_or(StatusCode::OK),
            reason: self.reason,
            headers: self.headers,
            body: self.body,
            request: self.request,
        }
    }
}

fn charset_of(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(http::header::CONTENT_TYPE)?.to_str().ok()?;
    let (_, charset) = content_type.split_once("charset=")?;
    Some(
        charset
            .split(';')
            .next()
            .unwrap_or(charset)
            .trim()
            .trim_matches('"')
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn charset_parsed_from_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain; charset=iso-8859-1".parse().unwrap());
        let response = Response::builder()
            .status(StatusCode::OK)
            .headers(headers)
            .body_text("ok")
            .build();
        assert_eq!(response.body().unwrap().charset(), Some("iso-8859-1"));
    }

    #[test]
    fn text_of_missing_body_is_empty() {
        let response = Response::builder().status(StatusCode::NO_CONTENT).build();
        assert_eq!(response.text(), "");
    }

    #[test]
    fn header_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc".parse().unwrap());
        let response = Response::builder().headers(headers).build();
        assert_eq!(response.header("x-request-id"), Some("abc"));
    }
}
