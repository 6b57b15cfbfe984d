//! Contracts: parsing interface descriptions into per-operation descriptors.
//!
//! A contract defines which binding declarations are valid and how they map onto a
//! [`MethodMetadata`]. The bundled [`DefaultContract`] interprets the declarations in
//! [`iface`](crate::iface): `Headers`, request lines, literal/template bodies, `Param`
//! placeholders, and query/header maps.

use crate::error::{Error, Result};
use crate::iface::{
    ClassBinding, InterfaceDef, MethodBinding, MethodDef, MethodKind, ParamBinding, ParamKind,
    ReturnType,
};
use crate::metadata::MethodMetadata;
use crate::target::config_key;
use crate::template::RequestTemplate;
use http::Method;

/// Parses a target interface description into one descriptor per bindable operation.
pub trait Contract: Send + Sync {
    /// Parses and validates `iface`, producing descriptors in declaration order
    /// (inherited operations first).
    fn parse_and_validate(&self, iface: &InterfaceDef) -> Result<Vec<MethodMetadata>>;
}

/// The bundled binding dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContract {
    always_encode_body: bool,
}

impl DefaultContract {
    /// A contract for the standard dialect.
    pub fn new() -> Self {
        Self::default()
    }

    /// A contract variant in which operations without a body parameter still run the
    /// encoder over their full argument list.
    pub fn with_always_encode_body() -> Self {
        Self {
            always_encode_body: true,
        }
    }
}

impl Contract for DefaultContract {
    fn parse_and_validate(&self, iface: &InterfaceDef) -> Result<Vec<MethodMetadata>> {
        if !iface.type_params.is_empty() {
            return Err(Error::Configuration(format!(
                "parameterized interfaces are not supported: {}",
                iface.name
            )));
        }
        if iface.parents.len() > 1 {
            return Err(Error::Configuration(format!(
                "only single inheritance is supported: {}",
                iface.name
            )));
        }

        let mut result: Vec<MethodMetadata> = Vec::new();
        let parent_methods = iface.parents.first().map(|p| p.methods.as_slice()).unwrap_or(&[]);
        for method in parent_methods.iter().chain(iface.methods.iter()) {
            if matches!(method.kind, MethodKind::Default(_)) {
                continue;
            }
            let metadata = self.parse_method(iface, method)?;

            if let Some(existing) = result
                .iter_mut()
                .find(|md| md.config_key == metadata.config_key)
            {
                // Covariant override: the later declaration wins only when its return
                // type is at least as specific as the one already recorded.
                let resolved = resolve_return_type(&existing.return_type, &metadata.return_type);
                if resolved == metadata.return_type {
                    let warnings = std::mem::take(&mut existing.warnings);
                    *existing = metadata;
                    existing.warnings = warnings;
                } else {
                    existing.warnings.push(format!(
                        "conflicting return types for {}: kept {}, ignored {}",
                        existing.config_key, existing.return_type, metadata.return_type
                    ));
                }
                continue;
            }
            result.push(metadata);
        }
        Ok(result)
    }
}

impl DefaultContract {
    fn parse_method(&self, iface: &InterfaceDef, method: &MethodDef) -> Result<MethodMetadata> {
        let mut md = MethodMetadata {
            config_key: config_key(&iface.name, method),
            method_name: method.name.clone(),
            return_type: method.return_type.clone(),
            template: RequestTemplate::new(),
            always_encode_body: self.always_encode_body,
            ..MethodMetadata::default()
        };

        // Interface-level bindings: the single parent first, then the interface
        // itself. Later applications override earlier ones per header name.
        if let Some(parent) = iface.parents.first() {
            for binding in &parent.bindings {
                self.apply_class_binding(&mut md, binding)?;
            }
        }
        for binding in &iface.bindings {
            self.apply_class_binding(&mut md, binding)?;
        }

        for binding in &method.bindings {
            self.apply_method_binding(&mut md, binding)?;
        }

        if matches!(method.kind, MethodKind::Ignored) {
            md.ignored = true;
            return Ok(md);
        }

        if md.template.method().is_none() {
            return Err(Error::Configuration(format!(
                "method {} has no request line (an HTTP verb such as GET or POST)",
                md.config_key
            )));
        }

        for (index, param) in method.params.iter().enumerate() {
            let mut is_http_binding = false;
            for binding in &param.bindings {
                match binding {
                    ParamBinding::Param { name, expander } => {
                        let name = name
                            .clone()
                            .or_else(|| param.name.clone())
                            .filter(|n| !n.is_empty())
                            .ok_or_else(|| {
                                Error::Configuration(format!(
                                    "Param binding on parameter {index} of {} has no name",
                                    md.config_key
                                ))
                            })?;
                        md.index_to_name.entry(index).or_default().push(name.clone());
                        if let Some(expander) = expander {
                            md.index_to_expander.insert(index, expander.clone());
                        }
                        if !md.template.has_variable(&name) {
                            md.form_params.push(name);
                        }
                        is_http_binding = true;
                    }
                    ParamBinding::QueryMap => {
                        if md.query_map_index.is_some() {
                            return Err(Error::Configuration(format!(
                                "QueryMap binding present on multiple parameters of {}",
                                md.config_key
                            )));
                        }
                        check_map_key("QueryMap", &md.config_key, param.map_key_type.as_deref())?;
                        md.query_map_index = Some(index);
                        is_http_binding = true;
                    }
                    ParamBinding::HeaderMap => {
                        if md.header_map_index.is_some() {
                            return Err(Error::Configuration(format!(
                                "HeaderMap binding present on multiple parameters of {}",
                                md.config_key
                            )));
                        }
                        check_map_key("HeaderMap", &md.config_key, param.map_key_type.as_deref())?;
                        md.header_map_index = Some(index);
                        is_http_binding = true;
                    }
                }
            }

            match param.kind {
                ParamKind::Url => md.url_index = Some(index),
                ParamKind::Options | ParamKind::Continuation => {}
                ParamKind::Data => {
                    if !is_http_binding && !md.is_already_processed(index) && !md.always_encode_body
                    {
                        if md.body_index.is_some() {
                            return Err(Error::Configuration(format!(
                                "method {} has too many body parameters",
                                md.config_key
                            )));
                        }
                        md.body_index = Some(index);
                        md.body_type = Some(param.type_name.clone());
                    }
                }
            }
        }

        if md.body_index.is_some() && !md.form_params.is_empty() {
            return Err(Error::Configuration(format!(
                "cannot mix form parameters with body parameter in {}",
                md.config_key
            )));
        }

        let bound: Vec<&String> = md.index_to_name.values().flatten().collect();
        for variable in md.template.variables() {
            if !bound.iter().any(|name| **name == variable) {
                return Err(Error::Configuration(format!(
                    "placeholder {{{variable}}} in {} has no Param binding",
                    md.config_key
                )));
            }
        }

        Ok(md)
    }

    fn apply_class_binding(&self, md: &mut MethodMetadata, binding: &ClassBinding) -> Result<()> {
        match binding {
            ClassBinding::Headers(lines) => self.apply_headers(md, lines),
        }
    }

    fn apply_method_binding(&self, md: &mut MethodMetadata, binding: &MethodBinding) -> Result<()> {
        match binding {
            MethodBinding::RequestLine {
                value,
                decode_slash,
                collection_format,
            } => {
                let (verb, uri) = split_request_line(value).ok_or_else(|| {
                    Error::Configuration(format!(
                        "request line {value:?} on {} does not begin with an HTTP verb",
                        md.config_key
                    ))
                })?;
                let method = Method::from_bytes(verb.as_bytes()).map_err(|_| {
                    Error::Configuration(format!(
                        "request line {value:?} on {} has an invalid HTTP verb",
                        md.config_key
                    ))
                })?;
                md.template.set_method(method);
                md.template.set_uri(uri);
                md.template.set_decode_slash(*decode_slash);
                md.template.set_collection_format(*collection_format);
                Ok(())
            }
            MethodBinding::Body(body) => {
                if body.is_empty() {
                    return Err(Error::Configuration(format!(
                        "Body binding on {} is empty",
                        md.config_key
                    )));
                }
                if body.contains('{') {
                    md.template.set_body_template(body.clone());
                } else {
                    md.template
                        .set_body(body.clone().into_bytes(), Some("UTF-8".to_string()));
                }
                Ok(())
            }
            MethodBinding::Headers(lines) => self.apply_headers(md, lines),
        }
    }

    fn apply_headers(&self, md: &mut MethodMetadata, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return Err(Error::Configuration(format!(
                "Headers binding on {} is empty",
                md.config_key
            )));
        }
        for (name, values) in parse_header_lines(&md.config_key, lines)? {
            md.template.header(&name, values);
        }
        Ok(())
    }
}

/// Matches `^([A-Z]+)[ ]*(.*)$`: the verb, then the URI template.
fn split_request_line(line: &str) -> Option<(&str, &str)> {
    let verb_end = line
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(line.len());
    if verb_end == 0 {
        return None;
    }
    let (verb, rest) = line.split_at(verb_end);
    Some((verb, rest.trim_start_matches(' ')))
}

fn check_map_key(what: &str, config_key: &str, declared: Option<&str>) -> Result<()> {
    if let Some(key_type) = declared {
        if key_type != "String" {
            return Err(Error::Configuration(format!(
                "{what} key type must be String on {config_key}: {key_type}"
            )));
        }
    }
    Ok(())
}

/// Parses `"Name: value"` lines into an ordered name → values mapping. Values for a
/// repeated name accumulate in order.
fn parse_header_lines(config_key: &str, lines: &[String]) -> Result<Vec<(String, Vec<String>)>> {
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for line in lines {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            Error::Configuration(format!(
                "header {line:?} on {config_key} is not in \"Name: value\" form"
            ))
        })?;
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            return Err(Error::Configuration(format!(
                "header {line:?} on {config_key} has an empty name or value"
            )));
        }
        match out.iter_mut().find(|(n, _)| n == name) {
            Some((_, values)) => values.push(value.to_string()),
            None => out.push((name.to_string(), vec![value.to_string()])),
        }
    }
    Ok(out)
}

/// Resolves a covariant-override conflict: the more specific type wins, `Any` losing
/// to everything; unrelated types resolve to the first.
fn resolve_return_type(existing: &ReturnType, overriding: &ReturnType) -> ReturnType {
    if existing == overriding || *existing == ReturnType::Any {
        overriding.clone()
    } else if *overriding == ReturnType::Any {
        existing.clone()
    } else {
        existing.clone()
    }
}
