//! Per-operation descriptors produced by the contract parser.

use crate::binding::Expander;
use crate::iface::ReturnType;
use crate::template::RequestTemplate;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable descriptor of one operation: the skeleton template plus everything the
/// binding step needs to resolve arguments into it.
///
/// Built once per operation by the [`Contract`](crate::Contract), then shared read-only
/// by every invocation. At most one of `form_params` / `body_index` is populated; the
/// parser rejects descriptions that would set both.
#[derive(Clone, Default)]
pub struct MethodMetadata {
    pub(crate) config_key: String,
    pub(crate) method_name: String,
    pub(crate) return_type: ReturnType,
    pub(crate) template: RequestTemplate,
    pub(crate) index_to_name: BTreeMap<usize, Vec<String>>,
    pub(crate) index_to_expander: BTreeMap<usize, Arc<dyn Expander>>,
    pub(crate) form_params: Vec<String>,
    pub(crate) body_index: Option<usize>,
    pub(crate) body_type: Option<String>,
    pub(crate) url_index: Option<usize>,
    pub(crate) header_map_index: Option<usize>,
    pub(crate) query_map_index: Option<usize>,
    pub(crate) always_encode_body: bool,
    pub(crate) ignored: bool,
    pub(crate) warnings: Vec<String>,
}

impl MethodMetadata {
    /// The canonical `Type#method(Arg,Arg)` identity used for routing and logs.
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    /// The bare operation name the dispatcher routes on.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The declared result type.
    pub fn return_type(&self) -> &ReturnType {
        &self.return_type
    }

    /// The skeleton template cloned for each invocation.
    pub fn template(&self) -> &RequestTemplate {
        &self.template
    }

    /// Placeholder names each argument position contributes to.
    pub fn index_to_name(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.index_to_name
    }

    /// Form-encoded field names, in declaration order.
    pub fn form_params(&self) -> &[String] {
        &self.form_params
    }

    /// The argument position whose value is the request body, if any.
    pub fn body_index(&self) -> Option<usize> {
        self.body_index
    }

    /// The declared type name of the body argument.
    pub fn body_type(&self) -> Option<&str> {
        self.body_type.as_deref()
    }

    /// The argument position providing an absolute URL, if any.
    pub fn url_index(&self) -> Option<usize> {
        self.url_index
    }

    /// The argument position folded into headers, if any.
    pub fn header_map_index(&self) -> Option<usize> {
        self.header_map_index
    }

    /// The argument position folded into the query string, if any.
    pub fn query_map_index(&self) -> Option<usize> {
        self.query_map_index
    }

    /// Whether no-body invocations still run through the encoder.
    pub fn always_encode_body(&self) -> bool {
        self.always_encode_body
    }

    /// Whether the operation must never produce a request.
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Non-fatal diagnostics accumulated while parsing (covariant-override conflicts).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// The expander for an argument position, when a custom one was declared.
    pub(crate) fn expander(&self, index: usize) -> Option<&Arc<dyn Expander>> {
        self.index_to_expander.get(&index)
    }

    /// True when the position is already consumed by a placeholder or URL binding.
    pub(crate) fn is_already_processed(&self, index: usize) -> bool {
        self.index_to_name.contains_key(&index) || self.url_index == Some(index)
    }
}

impl std::fmt::Debug for MethodMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodMetadata")
            .field("config_key", &self.config_key)
            .field("return_type", &self.return_type)
            .field("form_params", &self.form_params)
            .field("body_index", &self.body_index)
            .field("url_index", &self.url_index)
            .field("header_map_index", &self.header_map_index)
            .field("query_map_index", &self.query_map_index)
            .field("always_encode_body", &self.always_encode_body)
            .field("ignored", &self.ignored)
            .finish_non_exhaustive()
    }
}
