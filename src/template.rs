//! Mutable request templates with `{name}` placeholder expansion.
//!
//! A [`RequestTemplate`] is the builder for one outgoing request. The contract parser
//! produces a skeleton per operation; each invocation deep-clones that skeleton, binds
//! arguments into its placeholders, and freezes it into a [`Request`](crate::Request).
//! Request interceptors receive the template between binding and freezing and may
//! mutate anything.

use crate::error::{Error, Result};
use crate::metadata::MethodMetadata;
use crate::request::Request;
use crate::target::Target;
use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeSet;
use std::sync::Arc;

/// How collection-valued arguments are joined into a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    /// Comma-separated: `a=1,2,3`.
    #[default]
    Csv,
    /// Space-separated.
    Ssv,
    /// Tab-separated.
    Tsv,
    /// Pipe-separated: `a=1|2|3`.
    Pipes,
    /// Repeated query keys: `a=1&a=2&a=3`. Outside query strings this joins as CSV.
    Multi,
}

impl CollectionFormat {
    /// The literal separator used when joining inline. `Multi` degrades to CSV here.
    pub(crate) fn separator(self) -> &'static str {
        match self {
            CollectionFormat::Csv | CollectionFormat::Multi => ",",
            CollectionFormat::Ssv => "%20",
            CollectionFormat::Tsv => "%09",
            CollectionFormat::Pipes => "|",
        }
    }
}

/// One query parameter: a name with its ordered values. An empty value list renders
/// as the bare name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub(crate) name: String,
    pub(crate) values: Vec<String>,
}

impl QueryPair {
    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter values, in insertion order.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// One header field: a name with its ordered values. Name comparison is
/// case-insensitive; insertion order of distinct names is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub(crate) name: String,
    pub(crate) values: Vec<String>,
}

impl HeaderField {
    /// The header name as first written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The header values, in insertion order.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// The body slot of a template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateBody {
    /// No body.
    #[default]
    Empty,
    /// A template string expanded at binding time.
    Template(String),
    /// Finished body bytes with an optional charset label.
    Data {
        /// The raw body.
        bytes: Vec<u8>,
        /// Charset label recorded for transports and observability.
        charset: Option<String>,
    },
}

/// Mutable builder for one outgoing request: method, URI template, ordered query
/// parameters, ordered case-insensitive headers, and body.
#[derive(Debug, Clone, Default)]
pub struct RequestTemplate {
    pub(crate) method: Option<Method>,
    pub(crate) path: String,
    pub(crate) queries: Vec<QueryPair>,
    pub(crate) headers: Vec<HeaderField>,
    pub(crate) body: TemplateBody,
    pub(crate) decode_slash: bool,
    pub(crate) collection_format: CollectionFormat,
    pub(crate) base_url: Option<String>,
    metadata: Option<Arc<MethodMetadata>>,
    target: Option<Target>,
}

impl RequestTemplate {
    /// An empty template: no verb, no URI, slash-decoding on, CSV collections.
    pub fn new() -> Self {
        Self {
            decode_slash: true,
            ..Self::default()
        }
    }

    /// The HTTP verb, once set.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Sets the HTTP verb.
    pub fn set_method(&mut self, method: Method) {
        self.method = Some(method);
    }

    /// The URI template's path part, placeholders included.
    pub fn uri(&self) -> &str {
        &self.path
    }

    /// Sets the URI template. A query part is split off and merged into the query
    /// parameters, preserving order.
    pub fn set_uri(&mut self, uri: &str) {
        match uri.split_once('?') {
            Some((path, query)) => {
                self.path = path.to_string();
                for piece in query.split('&').filter(|p| !p.is_empty()) {
                    match piece.split_once('=') {
                        Some((name, value)) => self.append_query(name, value.to_string()),
                        None => self.queries.push(QueryPair {
                            name: piece.to_string(),
                            values: Vec::new(),
                        }),
                    }
                }
            }
            None => self.path = uri.to_string(),
        }
    }

    /// The query parameters, in insertion order.
    pub fn queries(&self) -> &[QueryPair] {
        &self.queries
    }

    /// Replaces the values of the named query parameter. An empty iterator removes it.
    pub fn query<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        let values: Vec<String> = values.into_iter().collect();
        if values.is_empty() {
            self.queries.retain(|q| q.name != name);
            return;
        }
        match self.queries.iter_mut().find(|q| q.name == name) {
            Some(pair) => pair.values = values,
            None => self.queries.push(QueryPair {
                name: name.to_string(),
                values,
            }),
        }
    }

    /// Appends one value to the named query parameter, creating it if absent.
    pub fn append_query(&mut self, name: &str, value: String) {
        match self.queries.iter_mut().find(|q| q.name == name) {
            Some(pair) => pair.values.push(value),
            None => self.queries.push(QueryPair {
                name: name.to_string(),
                values: vec![value],
            }),
        }
    }

    /// The header fields, in insertion order of distinct names.
    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    /// Replaces the values of the named header, case-insensitively. An empty iterator
    /// removes it.
    pub fn header<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        let values: Vec<String> = values.into_iter().collect();
        if values.is_empty() {
            self.headers.retain(|h| !h.name.eq_ignore_ascii_case(name));
            return;
        }
        match self
            .headers
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(name))
        {
            Some(field) => field.values = values,
            None => self.headers.push(HeaderField {
                name: name.to_string(),
                values,
            }),
        }
    }

    /// Appends one value to the named header, creating it if absent.
    pub fn append_header(&mut self, name: &str, value: String) {
        match self
            .headers
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(name))
        {
            Some(field) => field.values.push(value),
            None => self.headers.push(HeaderField {
                name: name.to_string(),
                values: vec![value],
            }),
        }
    }

    /// The first value of the named header, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| h.values.first())
            .map(String::as_str)
    }

    /// The body slot.
    pub fn body(&self) -> &TemplateBody {
        &self.body
    }

    /// Sets finished body bytes.
    pub fn set_body(&mut self, bytes: Vec<u8>, charset: Option<String>) {
        self.body = TemplateBody::Data { bytes, charset };
    }

    /// Sets a body template expanded at binding time.
    pub fn set_body_template(&mut self, template: impl Into<String>) {
        self.body = TemplateBody::Template(template.into());
    }

    /// Whether encoded slashes in expanded path values decode back to `/`.
    pub fn decode_slash(&self) -> bool {
        self.decode_slash
    }

    /// Sets slash-decoding behavior for path expansion.
    pub fn set_decode_slash(&mut self, decode_slash: bool) {
        self.decode_slash = decode_slash;
    }

    /// How collection-valued arguments join.
    pub fn collection_format(&self) -> CollectionFormat {
        self.collection_format
    }

    /// Sets the collection format.
    pub fn set_collection_format(&mut self, format: CollectionFormat) {
        self.collection_format = format;
    }

    /// The base URL, once a target (or URL-override argument) has been applied.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Sets the base URL the path resolves against.
    pub fn set_base_url(&mut self, base: impl Into<String>) {
        self.base_url = Some(base.into().trim_end_matches('/').to_string());
    }

    /// The owning operation descriptor, attached on per-invocation clones.
    pub fn method_metadata(&self) -> Option<&Arc<MethodMetadata>> {
        self.metadata.as_ref()
    }

    /// The originating target, attached on per-invocation clones.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub(crate) fn attach(&mut self, metadata: Arc<MethodMetadata>, target: Target) {
        self.metadata = Some(metadata);
        self.target = Some(target);
    }

    /// True when `{name}` occurs in the URI, a query value, a header value, or the
    /// body template.
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables().contains(name)
    }

    /// All placeholder names referenced by the template.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        scan_variables(&self.path, &mut out);
        for pair in &self.queries {
            for value in &pair.values {
                scan_variables(value, &mut out);
            }
        }
        for field in &self.headers {
            for value in &field.values {
                scan_variables(value, &mut out);
            }
        }
        if let TemplateBody::Template(t) = &self.body {
            scan_variables(t, &mut out);
        }
        out
    }

    /// The fully resolved URL: base, path, and rendered query string.
    pub fn request_url(&self) -> String {
        let mut url = self.base_url.clone().unwrap_or_default();
        if !self.path.is_empty() && !self.path.starts_with('/') && !url.is_empty() {
            url.push('/');
        }
        url.push_str(&self.path);
        let query = self.render_query();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    fn render_query(&self) -> String {
        let mut out = String::new();
        for pair in &self.queries {
            if pair.values.is_empty() {
                if !out.is_empty() {
                    out.push('&');
                }
                out.push_str(&pair.name);
                continue;
            }
            for value in &pair.values {
                if !out.is_empty() {
                    out.push('&');
                }
                out.push_str(&pair.name);
                out.push('=');
                out.push_str(value);
            }
        }
        out
    }

    /// Freezes the template into the immutable [`Request`] fed to the transport.
    ///
    /// Fails when the verb is unset or any placeholder survived binding; a frozen
    /// request never contains `{name}` slots.
    pub fn freeze(self) -> Result<Request> {
        let method = self.method.clone().ok_or_else(|| {
            Error::Configuration("cannot freeze a template without an HTTP method".to_string())
        })?;
        let leftover = self.variables();
        if !leftover.is_empty() {
            let config_key = self
                .metadata
                .as_ref()
                .map(|md| md.config_key().to_string())
                .unwrap_or_default();
            return Err(Error::Binding {
                config_key,
                message: format!("unresolved placeholders: {leftover:?}"),
            });
        }
        let url = self.request_url();
        let (body, charset) = match &self.body {
            TemplateBody::Empty => (None, None),
            TemplateBody::Data { bytes, charset } => (Some(bytes.clone()), charset.clone()),
            // unreachable: a Template body still carries variables or expands to Data
            TemplateBody::Template(t) => (Some(t.clone().into_bytes()), None),
        };
        Ok(Request::new(method, url, self.headers.clone(), body, charset, self))
    }
}

/// Path-value encode set: everything but unreserved characters, slash excepted when
/// slashes decode.
const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
const PATH_VALUE_KEEP_SLASH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

pub(crate) fn encode_path_value(value: &str, decode_slash: bool) -> String {
    let set = if decode_slash { PATH_VALUE_KEEP_SLASH } else { PATH_VALUE };
    utf8_percent_encode(value, set).to_string()
}

pub(crate) fn encode_query_value(value: &str) -> String {
    utf8_percent_encode(value, PATH_VALUE).to_string()
}

/// Collects every `{name}` placeholder in `input` into `out`.
pub(crate) fn scan_variables(input: &str, out: &mut BTreeSet<String>) {
    let mut rest = input;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            return;
        };
        out.insert(rest[start + 1..start + 1 + len].to_string());
        rest = &rest[start + 1 + len + 1..];
    }
}

/// Expands every `{name}` in `input` through `resolve`. Returns `None` when any
/// placeholder resolves to `None`, so callers can drop the whole slot.
pub(crate) fn expand(
    input: &str,
    resolve: &mut dyn FnMut(&str) -> Option<String>,
) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&resolve(&rest[start + 1..start + 1 + len])?);
        rest = &rest[start + 1 + len + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_splits_query_part() {
        let mut t = RequestTemplate::new();
        t.set_uri("/x?a={a}&b=2&flag");
        assert_eq!(t.uri(), "/x");
        assert_eq!(t.queries().len(), 3);
        assert_eq!(t.queries()[0].name(), "a");
        assert_eq!(t.queries()[0].values(), ["{a}"]);
        assert_eq!(t.queries()[1].values(), ["2"]);
        assert!(t.queries()[2].values().is_empty());
    }

    #[test]
    fn header_replaces_case_insensitively() {
        let mut t = RequestTemplate::new();
        t.header("Accept", ["*/*".to_string()]);
        t.header("accept", ["application/json".to_string()]);
        assert_eq!(t.headers().len(), 1);
        assert_eq!(t.header_value("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn header_preserves_insertion_order() {
        let mut t = RequestTemplate::new();
        t.header("B-First", ["1".to_string()]);
        t.header("A-Second", ["2".to_string()]);
        let names: Vec<&str> = t.headers().iter().map(|h| h.name()).collect();
        assert_eq!(names, ["B-First", "A-Second"]);
    }

    #[test]
    fn variables_cover_all_slots() {
        let mut t = RequestTemplate::new();
        t.set_uri("/users/{id}?sort={sort}");
        t.header("X-Trace", ["{trace}".to_string()]);
        t.set_body_template("name={name}");
        let vars = t.variables();
        for name in ["id", "sort", "trace", "name"] {
            assert!(vars.contains(name), "missing {name}");
        }
    }

    #[test]
    fn expand_drops_on_missing() {
        assert_eq!(
            expand("v-{a}", &mut |n| (n == "a").then(|| "1".to_string())),
            Some("v-1".to_string())
        );
        assert_eq!(expand("v-{b}", &mut |_| None), None);
    }

    #[test]
    fn path_encoding_respects_decode_slash() {
        assert_eq!(encode_path_value("a/b c", true), "a/b%20c");
        assert_eq!(encode_path_value("a/b c", false), "a%2Fb%20c");
    }

    #[test]
    fn request_url_renders_multi_values() {
        let mut t = RequestTemplate::new();
        t.set_base_url("http://h");
        t.set_uri("/x");
        t.query("a", ["1".to_string(), "2".to_string()]);
        assert_eq!(t.request_url(), "http://h/x?a=1&a=2");
    }

    #[test]
    fn freeze_rejects_unresolved_placeholders() {
        let mut t = RequestTemplate::new();
        t.set_method(Method::GET);
        t.set_base_url("http://h");
        t.set_uri("/x/{id}");
        assert!(matches!(t.freeze(), Err(Error::Binding { .. })));
    }

    #[test]
    fn freeze_rejects_missing_method() {
        let mut t = RequestTemplate::new();
        t.set_uri("/x");
        assert!(matches!(t.freeze(), Err(Error::Configuration(_))));
    }
}
