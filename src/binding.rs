//! Per-invocation argument binding: expanders, slot resolution, and template creation.
//!
//! [`TemplateFactory`] is the step between a call's arguments and a frozen request:
//! it deep-clones the operation's skeleton template, expands every `{name}` slot from
//! the arguments, folds in query/header maps, and hands body material to the encoder.

use crate::codec::{BodyType, Encoder, QueryMapEncoder};
use crate::error::{Error, Result};
use crate::metadata::MethodMetadata;
use crate::request::Options;
use crate::target::Target;
use crate::template::{
    self, encode_path_value, encode_query_value, CollectionFormat, RequestTemplate, TemplateBody,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One invocation argument, positionally matched to the operation's parameters.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A data value: expanded into placeholders, merged as a map, or encoded as the
    /// body. `Value::Null` drops the slots it would fill.
    Value(Value),
    /// A per-call transport-options override.
    Options(Options),
    /// Nothing: a skipped position (continuation slots).
    None,
}

impl Arg {
    fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(v) if !v.is_null() => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Value(Value::String(v.to_string()))
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Value(Value::String(v))
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Value(Value::Bool(v))
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Value(Value::from(v))
    }
}

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Arg::Value(Value::from(v))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Value(Value::from(v))
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<Options> for Arg {
    fn from(v: Options) -> Self {
        Arg::Options(v)
    }
}

/// A string-expansion strategy for a single parameter value.
///
/// The default renders scalars with their natural text form; custom expanders cover
/// formatting concerns like dates or enums.
pub trait Expander: Send + Sync {
    /// Renders one (non-null, non-collection) value. Errors surface as binding
    /// failures naming the operation.
    fn expand(&self, value: &Value) -> std::result::Result<String, String>;
}

/// The default expander: the value's natural text form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToStringExpander;

impl Expander for ToStringExpander {
    fn expand(&self, value: &Value) -> std::result::Result<String, String> {
        value_to_string(value).ok_or_else(|| format!("cannot render {value} as a string"))
    }
}

/// Natural text form of a scalar JSON value; `None` for nulls and composites.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// An argument's contribution to the placeholders it names.
#[derive(Debug, Clone)]
enum Slot {
    /// A single expanded value.
    Text(String),
    /// An expanded collection, joined per the template's collection format.
    List(Vec<String>),
    /// A null argument: the slot is dropped.
    Absent,
}

/// Resolves the per-invocation template for an operation: clone the skeleton, bind
/// arguments, merge maps, encode the body.
pub(crate) struct TemplateFactory {
    encoder: Arc<dyn Encoder>,
    query_map_encoder: Arc<dyn QueryMapEncoder>,
}

impl TemplateFactory {
    pub(crate) fn new(encoder: Arc<dyn Encoder>, query_map_encoder: Arc<dyn QueryMapEncoder>) -> Self {
        Self {
            encoder,
            query_map_encoder,
        }
    }

    /// Builds the template for one invocation. After this returns, the template has
    /// no remaining placeholders.
    pub(crate) fn create(
        &self,
        target: &Target,
        metadata: &Arc<MethodMetadata>,
        args: &[Arg],
    ) -> Result<RequestTemplate> {
        let mut tpl = metadata.template().clone();
        tpl.attach(Arc::clone(metadata), target.clone());

        match metadata
            .url_index()
            .and_then(|i| args.get(i))
            .and_then(Arg::as_value)
            .and_then(value_to_string)
        {
            Some(url) => tpl.set_base_url(url),
            None => tpl.set_base_url(target.url()),
        }

        let slots = self.resolve_slots(metadata, args)?;
        let format = tpl.collection_format();
        let decode_slash = tpl.decode_slash();

        // Path: missing or null slots collapse to nothing.
        let path = template::expand(tpl.uri(), &mut |name| {
            Some(match slots.get(name) {
                Some(Slot::Text(v)) => encode_path_value(v, decode_slash),
                Some(Slot::List(items)) => items
                    .iter()
                    .map(|v| encode_path_value(v, decode_slash))
                    .collect::<Vec<_>>()
                    .join(format.separator()),
                Some(Slot::Absent) | None => String::new(),
            })
        })
        .unwrap_or_default();
        tpl.path = path;

        self.expand_queries(&mut tpl, &slots, format)?;
        self.expand_headers(&mut tpl, &slots)?;

        if let TemplateBody::Template(body) = tpl.body().clone() {
            let expanded = template::expand(&body, &mut |name| {
                Some(match slots.get(name) {
                    Some(Slot::Text(v)) => v.clone(),
                    Some(Slot::List(items)) => items.join(format.separator()),
                    Some(Slot::Absent) | None => String::new(),
                })
            })
            .unwrap_or_default();
            tpl.set_body(expanded.into_bytes(), Some("UTF-8".to_string()));
        }

        if let Some(index) = metadata.query_map_index() {
            if let Some(value) = args.get(index).and_then(Arg::as_value) {
                for (name, entry) in self.query_map_encoder.encode(value)? {
                    tpl.append_query(&name, encode_query_value(&entry));
                }
            }
        }

        if let Some(index) = metadata.header_map_index() {
            if let Some(value) = args.get(index).and_then(Arg::as_value) {
                self.merge_header_map(metadata, &mut tpl, value)?;
            }
        }

        self.encode_body(metadata, &mut tpl, args)?;
        Ok(tpl)
    }

    /// Expands each named argument position into its slot value.
    fn resolve_slots(
        &self,
        metadata: &MethodMetadata,
        args: &[Arg],
    ) -> Result<HashMap<String, Slot>> {
        let mut slots = HashMap::new();
        for (&index, names) in metadata.index_to_name() {
            let slot = match args.get(index).and_then(Arg::as_value) {
                None => Slot::Absent,
                Some(Value::Array(items)) => {
                    let mut expanded = Vec::with_capacity(items.len());
                    for item in items {
                        if item.is_null() {
                            continue;
                        }
                        expanded.push(self.expand_one(metadata, index, item)?);
                    }
                    Slot::List(expanded)
                }
                Some(value) => Slot::Text(self.expand_one(metadata, index, value)?),
            };
            for name in names {
                slots.insert(name.clone(), slot.clone());
            }
        }
        Ok(slots)
    }

    fn expand_one(&self, metadata: &MethodMetadata, index: usize, value: &Value) -> Result<String> {
        let expanded = match metadata.expander(index) {
            Some(expander) => expander.expand(value),
            None => ToStringExpander.expand(value),
        };
        expanded.map_err(|message| Error::Binding {
            config_key: metadata.config_key().to_string(),
            message: format!("argument {index}: {message}"),
        })
    }

    /// Rewrites template query pairs from the slot map. A pair whose value is a bare
    /// placeholder explodes under the `Multi` format; unresolved values drop out.
    fn expand_queries(
        &self,
        tpl: &mut RequestTemplate,
        slots: &HashMap<String, Slot>,
        format: CollectionFormat,
    ) -> Result<()> {
        let mut queries = std::mem::take(&mut tpl.queries);
        queries.retain_mut(|pair| {
            if pair.values.is_empty() {
                return true;
            }
            let mut kept = Vec::with_capacity(pair.values.len());
            for value in pair.values.drain(..) {
                match bare_variable(&value) {
                    Some(name) => match slots.get(name) {
                        Some(Slot::Text(v)) => kept.push(encode_query_value(v)),
                        Some(Slot::List(items)) if format == CollectionFormat::Multi => {
                            kept.extend(items.iter().map(|v| encode_query_value(v)));
                        }
                        Some(Slot::List(items)) => kept.push(
                            items
                                .iter()
                                .map(|v| encode_query_value(v))
                                .collect::<Vec<_>>()
                                .join(format.separator()),
                        ),
                        Some(Slot::Absent) | None => {}
                    },
                    None => {
                        let expanded = template::expand(&value, &mut |name| match slots.get(name) {
                            Some(Slot::Text(v)) => Some(encode_query_value(v)),
                            Some(Slot::List(items)) => Some(
                                items
                                    .iter()
                                    .map(|v| encode_query_value(v))
                                    .collect::<Vec<_>>()
                                    .join(format.separator()),
                            ),
                            Some(Slot::Absent) | None => None,
                        });
                        if let Some(expanded) = expanded {
                            kept.push(expanded);
                        }
                    }
                }
            }
            pair.values = kept;
            !pair.values.is_empty()
        });
        tpl.queries = queries;
        Ok(())
    }

    /// Rewrites template header values from the slot map; unresolved values drop out,
    /// and a header with no surviving values disappears.
    fn expand_headers(&self, tpl: &mut RequestTemplate, slots: &HashMap<String, Slot>) -> Result<()> {
        let mut headers = std::mem::take(&mut tpl.headers);
        headers.retain_mut(|field| {
            let mut kept = Vec::with_capacity(field.values.len());
            for value in field.values.drain(..) {
                let expanded = template::expand(&value, &mut |name| match slots.get(name) {
                    Some(Slot::Text(v)) => Some(v.clone()),
                    Some(Slot::List(items)) => Some(items.join(",")),
                    Some(Slot::Absent) | None => None,
                });
                if let Some(expanded) = expanded {
                    kept.push(expanded);
                }
            }
            field.values = kept;
            !field.values.is_empty()
        });
        tpl.headers = headers;
        Ok(())
    }

    fn merge_header_map(
        &self,
        metadata: &MethodMetadata,
        tpl: &mut RequestTemplate,
        value: &Value,
    ) -> Result<()> {
        let entries = value.as_object().ok_or_else(|| Error::Binding {
            config_key: metadata.config_key().to_string(),
            message: "header map argument must be an object".to_string(),
        })?;
        for (name, entry) in entries {
            match entry {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = value_to_string(item) {
                            tpl.append_header(name, text);
                        }
                    }
                }
                other => {
                    let text = value_to_string(other).ok_or_else(|| Error::Binding {
                        config_key: metadata.config_key().to_string(),
                        message: format!("header map entry {name:?} is not a scalar"),
                    })?;
                    tpl.append_header(name, text);
                }
            }
        }
        Ok(())
    }

    /// Encodes the body: the body argument, collected form fields, or (for
    /// always-encode-body operations) the whole argument list.
    fn encode_body(
        &self,
        metadata: &Arc<MethodMetadata>,
        tpl: &mut RequestTemplate,
        args: &[Arg],
    ) -> Result<()> {
        if let Some(index) = metadata.body_index() {
            if let Some(value) = args.get(index).and_then(Arg::as_value) {
                let body_type = BodyType::Typed(metadata.body_type().map(str::to_string));
                self.encoder.encode(value, &body_type, tpl)?;
            }
            return Ok(());
        }

        if !metadata.form_params().is_empty() {
            let mut fields = serde_json::Map::new();
            for name in metadata.form_params() {
                let value = metadata
                    .index_to_name()
                    .iter()
                    .find(|(_, names)| names.iter().any(|n| n == name))
                    .and_then(|(&index, _)| args.get(index))
                    .and_then(Arg::as_value);
                if let Some(value) = value {
                    fields.insert(name.clone(), value.clone());
                }
            }
            self.encoder.encode(&Value::Object(fields), &BodyType::Form, tpl)?;
            return Ok(());
        }

        if metadata.always_encode_body() {
            let values: Vec<Value> = args
                .iter()
                .map(|arg| arg.as_value().cloned().unwrap_or(Value::Null))
                .collect();
            self.encoder.encode(&Value::Array(values), &BodyType::ArgList, tpl)?;
        }
        Ok(())
    }
}

/// `Some(name)` when the whole string is a single `{name}` placeholder.
fn bare_variable(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('{')?.strip_suffix('}')?;
    (!inner.contains('{') && !inner.contains('}')).then_some(inner)
}
