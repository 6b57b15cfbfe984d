//! Target identity: an interface description bound to a name and base URL.

use crate::error::{Error, Result};
use crate::iface::{InterfaceDef, MethodDef};
use std::sync::Arc;
use url::Url;

/// Identifies a bound remote API: an interface description, a symbolic name, and a
/// base URL. Immutable after construction and cheap to clone.
///
/// The produced [`Api`](crate::Api) answers its identity operations (equality,
/// hashing, display) from its target.
#[derive(Clone)]
pub struct Target {
    iface: Arc<InterfaceDef>,
    name: String,
    url: String,
}

impl Target {
    /// Binds `iface` to `url`, using the URL as the symbolic name.
    pub fn new(iface: InterfaceDef, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        Self::with_name(iface, url.clone(), url)
    }

    /// Binds `iface` to `url` under an explicit symbolic name.
    pub fn with_name(
        iface: InterfaceDef,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self> {
        let url = url.into();
        Url::parse(&url)
            .map_err(|e| Error::Configuration(format!("invalid target url {url:?}: {e}")))?;
        Ok(Self {
            iface: Arc::new(iface),
            name: name.into(),
            url: url.trim_end_matches('/').to_string(),
        })
    }

    /// The bound interface description.
    pub fn iface(&self) -> &InterfaceDef {
        &self.iface
    }

    /// The symbolic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The base URL, without a trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.iface.name == other.iface.name && self.name == other.name && self.url == other.url
    }
}

impl Eq for Target {}

impl std::hash::Hash for Target {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.iface.name.hash(state);
        self.name.hash(state);
        self.url.hash(state);
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Target(type={}, name={}, url={})", self.iface.name, self.name, self.url)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Renders the canonical identity of an operation within a target type.
///
/// The format is `SimpleName#method(ArgType,ArgType)` with no whitespace;
/// zero-argument operations render as `SimpleName#method()`. The same value is
/// used for routing, logging, and error correlation.
pub fn config_key(type_name: &str, method: &MethodDef) -> String {
    let mut key = String::with_capacity(type_name.len() + method.name.len() + 16);
    key.push_str(type_name);
    key.push('#');
    key.push_str(&method.name);
    key.push('(');
    for (i, param) in method.params.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(&param.type_name);
    }
    key.push(')');
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::{MethodDef, ParamDef};

    #[test]
    fn config_key_zero_args() {
        let m = MethodDef::new("list");
        assert_eq!(config_key("Route53", &m), "Route53#list()");
    }

    #[test]
    fn config_key_multiple_args() {
        let m = MethodDef::new("listByNameAndType")
            .param(ParamDef::new("name", "String"))
            .param(ParamDef::new("type", "String"));
        assert_eq!(
            config_key("Route53", &m),
            "Route53#listByNameAndType(String,String)"
        );
    }

    #[test]
    fn target_rejects_bad_url() {
        let t = Target::new(InterfaceDef::new("Eg"), "not a url");
        assert!(matches!(t, Err(crate::Error::Configuration(_))));
    }

    #[test]
    fn target_identity() {
        let a = Target::new(InterfaceDef::new("Eg"), "http://h").unwrap();
        let b = Target::new(InterfaceDef::new("Eg"), "http://h").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Target(type=Eg, name=http://h, url=http://h)");
    }
}
