//! Interface descriptions: the declarative input to the contract parser.
//!
//! Rust has no runtime reflection, so a bound API starts from a description built with
//! [`InterfaceDef`], [`MethodDef`], and [`ParamDef`]. Each carries the HTTP-binding
//! declarations a contract knows how to interpret; the bundled
//! [`DefaultContract`](crate::DefaultContract) understands the declarations in this module.
//!
//! ```
//! use veneer::{InterfaceDef, MethodDef, ParamDef, ReturnType};
//!
//! let iface = InterfaceDef::new("Repos")
//!     .headers(["Accept: application/json"])
//!     .method(
//!         MethodDef::new("contributors")
//!             .request_line("GET /repos/{owner}/{repo}/contributors")
//!             .returns(ReturnType::named("Vec<Contributor>"))
//!             .param(ParamDef::new("owner", "String").bind("owner"))
//!             .param(ParamDef::new("repo", "String").bind("repo")),
//!     );
//! # let _ = iface;
//! ```

use crate::binding::{Arg, Expander};
use crate::client::Api;
use crate::codec::Decoded;
use crate::error::Result;
use crate::template::CollectionFormat;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a default-method implementation.
pub type DefaultFuture = Pin<Box<dyn Future<Output = Result<Decoded>> + Send>>;

/// A default-method body: runs locally against the built [`Api`] instead of
/// binding to HTTP.
pub type DefaultFn = Arc<dyn Fn(Api, Vec<Arg>) -> DefaultFuture + Send + Sync>;

/// Semantic descriptor of an operation's decoded result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReturnType {
    /// No meaningful result; the body is drained unless `decode_void` is set.
    #[default]
    Unit,
    /// The raw [`Response`](crate::Response); the caller owns the body.
    Response,
    /// Assignable from every other return type. Participates in covariant-override
    /// resolution the way a top type does.
    Any,
    /// A named result type, decoded by the configured decoder.
    Named(String),
}

impl ReturnType {
    /// A named result type.
    pub fn named(name: impl Into<String>) -> Self {
        ReturnType::Named(name.into())
    }
}

impl std::fmt::Display for ReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnType::Unit => f.write_str("void"),
            ReturnType::Response => f.write_str("Response"),
            ReturnType::Any => f.write_str("Any"),
            ReturnType::Named(name) => f.write_str(name),
        }
    }
}

/// Interface-level binding declarations.
#[derive(Debug, Clone)]
pub enum ClassBinding {
    /// Static headers in `"Name: value"` form, applied to every operation.
    Headers(Vec<String>),
}

/// Method-level binding declarations.
#[derive(Clone)]
pub enum MethodBinding {
    /// `"VERB /path?query"`: the request line. Must be present on HTTP methods.
    RequestLine {
        /// The raw request line.
        value: String,
        /// Whether encoded slashes in expanded path values are decoded back to `/`.
        decode_slash: bool,
        /// How collection-valued arguments are joined.
        collection_format: CollectionFormat,
    },
    /// A literal body, or a body template when the value contains `{`.
    Body(String),
    /// Static headers in `"Name: value"` form. Replaces interface-level values per name.
    Headers(Vec<String>),
}

/// Parameter-level binding declarations.
#[derive(Clone)]
pub enum ParamBinding {
    /// Binds the parameter to a named placeholder. A `None` name falls back to the
    /// declared parameter name. Unreferenced names become form fields.
    Param {
        /// Placeholder name, when given explicitly.
        name: Option<String>,
        /// Custom string-expansion strategy.
        expander: Option<Arc<dyn Expander>>,
    },
    /// The parameter value is folded into the query string at request time.
    QueryMap,
    /// The parameter value is folded into the headers at request time.
    HeaderMap,
}

/// What kind of slot a parameter occupies in the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Ordinary data: expanded, merged, or encoded as the body.
    Data,
    /// A per-call transport-options override.
    Options,
    /// An absolute URL replacing the target base.
    Url,
    /// An async suspension handle from a source ecosystem; skipped entirely.
    Continuation,
}

/// How an operation is realized.
#[derive(Clone)]
pub enum MethodKind {
    /// Bound to HTTP through its declarations.
    Http,
    /// Implemented locally; receives the built [`Api`] and the call arguments.
    Default(DefaultFn),
    /// Declared but excluded from binding; invoking it is an error.
    Ignored,
}

/// One parameter of an operation.
#[derive(Clone)]
pub struct ParamDef {
    pub(crate) name: Option<String>,
    pub(crate) type_name: String,
    pub(crate) map_key_type: Option<String>,
    pub(crate) kind: ParamKind,
    pub(crate) bindings: Vec<ParamBinding>,
}

impl ParamDef {
    /// A data parameter with a declared name and type name.
    ///
    /// The type name appears verbatim in the operation's `config_key`.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            type_name: type_name.into(),
            map_key_type: None,
            kind: ParamKind::Data,
            bindings: Vec::new(),
        }
    }

    /// An anonymous data parameter (no source name preserved).
    pub fn unnamed(type_name: impl Into<String>) -> Self {
        Self {
            name: None,
            type_name: type_name.into(),
            map_key_type: None,
            kind: ParamKind::Data,
            bindings: Vec::new(),
        }
    }

    /// A per-call transport-options parameter.
    pub fn options() -> Self {
        Self {
            name: None,
            type_name: "Options".to_string(),
            map_key_type: None,
            kind: ParamKind::Options,
            bindings: Vec::new(),
        }
    }

    /// A parameter providing an absolute URL that overrides the target base.
    pub fn url() -> Self {
        Self {
            name: None,
            type_name: "Uri".to_string(),
            map_key_type: None,
            kind: ParamKind::Url,
            bindings: Vec::new(),
        }
    }

    /// A continuation slot; the contract skips it and callers pass [`Arg::None`].
    pub fn continuation() -> Self {
        Self {
            name: None,
            type_name: "Continuation".to_string(),
            map_key_type: None,
            kind: ParamKind::Continuation,
            bindings: Vec::new(),
        }
    }

    /// Declares the parameter's map key type, validated for query-map and header-map slots.
    pub fn map_key(mut self, type_name: impl Into<String>) -> Self {
        self.map_key_type = Some(type_name.into());
        self
    }

    /// Binds the parameter to the named placeholder.
    pub fn bind(mut self, placeholder: impl Into<String>) -> Self {
        self.bindings.push(ParamBinding::Param {
            name: Some(placeholder.into()),
            expander: None,
        });
        self
    }

    /// Binds the parameter to a placeholder named after the parameter itself.
    pub fn bind_implicit(mut self) -> Self {
        self.bindings.push(ParamBinding::Param {
            name: None,
            expander: None,
        });
        self
    }

    /// Binds with a custom expansion strategy.
    pub fn bind_with(
        mut self,
        placeholder: impl Into<String>,
        expander: Arc<dyn Expander>,
    ) -> Self {
        self.bindings.push(ParamBinding::Param {
            name: Some(placeholder.into()),
            expander: Some(expander),
        });
        self
    }

    /// Folds the argument's entries into the query string at request time.
    pub fn query_map(mut self) -> Self {
        self.bindings.push(ParamBinding::QueryMap);
        self
    }

    /// Folds the argument's entries into the headers at request time.
    pub fn header_map(mut self) -> Self {
        self.bindings.push(ParamBinding::HeaderMap);
        self
    }

    /// The declared type name, as rendered into `config_key`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// One operation of an interface.
#[derive(Clone)]
pub struct MethodDef {
    pub(crate) name: String,
    pub(crate) bindings: Vec<MethodBinding>,
    pub(crate) params: Vec<ParamDef>,
    pub(crate) return_type: ReturnType,
    pub(crate) kind: MethodKind,
}

impl MethodDef {
    /// A new HTTP-bound operation. Names must be unique within an interface.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
            params: Vec::new(),
            return_type: ReturnType::Unit,
            kind: MethodKind::Http,
        }
    }

    /// Sets the request line, e.g. `"GET /users/{id}"`.
    ///
    /// Encoded slashes decode and collections join as CSV; use
    /// [`request_line_with`](Self::request_line_with) to change either.
    pub fn request_line(self, line: impl Into<String>) -> Self {
        self.request_line_with(line, true, CollectionFormat::Csv)
    }

    /// Sets the request line with explicit slash-decoding and collection-format flags.
    pub fn request_line_with(
        mut self,
        line: impl Into<String>,
        decode_slash: bool,
        collection_format: CollectionFormat,
    ) -> Self {
        self.bindings.push(MethodBinding::RequestLine {
            value: line.into(),
            decode_slash,
            collection_format,
        });
        self
    }

    /// Adds static headers in `"Name: value"` form.
    pub fn headers<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings
            .push(MethodBinding::Headers(lines.into_iter().map(Into::into).collect()));
        self
    }

    /// Sets a literal body, or a body template when the value contains `{`.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.bindings.push(MethodBinding::Body(body.into()));
        self
    }

    /// Declares the decoded result type.
    pub fn returns(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter. Order is the invocation argument order.
    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Makes this a default method: implemented locally against the built [`Api`].
    pub fn default_impl<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Api, Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Decoded>> + Send + 'static,
    {
        self.kind = MethodKind::Default(Arc::new(move |api, args| Box::pin(f(api, args))));
        self
    }

    /// Excludes the operation from binding; invoking it fails.
    pub fn ignored(mut self) -> Self {
        self.kind = MethodKind::Ignored;
        self
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared result type.
    pub fn return_type(&self) -> &ReturnType {
        &self.return_type
    }

    /// The declared parameters, in argument order.
    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }
}

/// A user-defined interface description: the unit the engine binds to a base URL.
#[derive(Clone)]
pub struct InterfaceDef {
    pub(crate) name: String,
    pub(crate) type_params: Vec<String>,
    pub(crate) parents: Vec<InterfaceDef>,
    pub(crate) bindings: Vec<ClassBinding>,
    pub(crate) methods: Vec<MethodDef>,
}

impl InterfaceDef {
    /// A new interface description with the given simple name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            parents: Vec::new(),
            bindings: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Declares a generic type parameter. Parameterized interfaces are rejected at
    /// parse time; the declaration exists so the rejection can be tested.
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    /// Declares a parent interface. At most one is accepted at parse time.
    pub fn extends(mut self, parent: InterfaceDef) -> Self {
        self.parents.push(parent);
        self
    }

    /// Adds interface-level static headers in `"Name: value"` form.
    pub fn headers<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings
            .push(ClassBinding::Headers(lines.into_iter().map(Into::into).collect()));
        self
    }

    /// Adds an operation.
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// The interface's simple name, as rendered into `config_key`s.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared operations, own methods after inherited ones.
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }
}
