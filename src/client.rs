//! The engine: a fluent builder wiring every seam, and the dispatch object it produces.
//!
//! [`Veneer`] is the factory. Its [`Builder`] accumulates the contract, codecs,
//! transport, retry policy, interceptors, and capabilities; [`Veneer::new_instance`]
//! parses a target's interface description and produces an [`Api`] whose invocations
//! run the full binding pipeline.

use crate::binding::{Arg, TemplateFactory};
use crate::codec::{
    Decoded, Decoder, Encoder, ErrorDecoder, JsonDecoder, JsonEncoder, ObjectQueryMapEncoder,
    QueryMapEncoder, StatusErrorDecoder,
};
use crate::contract::{Contract, DefaultContract};
use crate::error::{Error, Result};
use crate::handler::{MethodHandler, PropagationPolicy, ResponseHandler};
use crate::iface::{DefaultFn, InterfaceDef, MethodKind};
use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::request::Options;
use crate::response::Response;
use crate::retry::{ExponentialBackoff, Retryer};
use crate::target::Target;
use crate::transport::{ReqwestTransport, Transport};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// A build-time plugin that may wrap installed components.
///
/// Capabilities are applied in registration order when the engine is built; each
/// method defaults to passing the component through unchanged.
pub trait Capability: Send + Sync {
    /// Wraps the encoder.
    fn enrich_encoder(&self, encoder: Arc<dyn Encoder>) -> Arc<dyn Encoder> {
        encoder
    }

    /// Wraps the decoder.
    fn enrich_decoder(&self, decoder: Arc<dyn Decoder>) -> Arc<dyn Decoder> {
        decoder
    }

    /// Wraps the error decoder.
    fn enrich_error_decoder(&self, error_decoder: Arc<dyn ErrorDecoder>) -> Arc<dyn ErrorDecoder> {
        error_decoder
    }

    /// Wraps the transport.
    fn enrich_transport(&self, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        transport
    }

    /// Wraps the retry policy.
    fn enrich_retryer(&self, retryer: Arc<dyn Retryer>) -> Arc<dyn Retryer> {
        retryer
    }

    /// Wraps or reorders the request interceptor list.
    fn enrich_request_interceptors(
        &self,
        interceptors: Vec<Arc<dyn RequestInterceptor>>,
    ) -> Vec<Arc<dyn RequestInterceptor>> {
        interceptors
    }

    /// Wraps or reorders the response interceptor list.
    fn enrich_response_interceptors(
        &self,
        interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    ) -> Vec<Arc<dyn ResponseInterceptor>> {
        interceptors
    }
}

struct Components {
    contract: Arc<dyn Contract>,
    factory: Arc<TemplateFactory>,
    transport: Arc<dyn Transport>,
    retryer: Arc<dyn Retryer>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_handler: Arc<ResponseHandler>,
    options: Options,
    propagation: PropagationPolicy,
}

/// The engine: produces bound [`Api`] objects from targets.
///
/// # Examples
///
/// ```no_run
/// use veneer::{Arg, InterfaceDef, MethodDef, ParamDef, ReturnType, Veneer};
///
/// # async fn example() -> Result<(), veneer::Error> {
/// let iface = InterfaceDef::new("Eg")
///     .headers(["Accept: */*"])
///     .method(
///         MethodDef::new("get")
///             .request_line("GET /x?a={a}")
///             .returns(ReturnType::named("String"))
///             .param(ParamDef::new("a", "String").bind("a")),
///     );
///
/// let api = Veneer::builder().target(iface, "http://h")?;
/// let body: String = api.invoke("get", vec![Arg::from("1")]).await?;
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Veneer {
    components: Arc<Components>,
}

impl Veneer {
    /// Creates a new [`Builder`] for configuring an engine.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Produces the dispatch object for `target`. Results should be cached and
    /// cloned; parsing runs once per call.
    pub fn new_instance(&self, target: Target) -> Result<Api> {
        let metadata_list = self.components.contract.parse_and_validate(target.iface())?;

        let mut dispatch: HashMap<String, Dispatch> = HashMap::new();
        for metadata in metadata_list {
            for warning in metadata.warnings() {
                tracing::warn!(config_key = metadata.config_key(), "{warning}");
            }
            if metadata.is_ignored() {
                dispatch.insert(
                    metadata.method_name().to_string(),
                    Dispatch::Ignored(metadata.config_key().to_string()),
                );
                continue;
            }
            let handler = MethodHandler {
                target: target.clone(),
                metadata: Arc::new(metadata),
                factory: Arc::clone(&self.components.factory),
                transport: Arc::clone(&self.components.transport),
                retryer: Arc::clone(&self.components.retryer),
                request_interceptors: self.components.request_interceptors.clone(),
                response_handler: Arc::clone(&self.components.response_handler),
                options: self.components.options.clone(),
                propagation: self.components.propagation,
            };
            dispatch.insert(handler.metadata.method_name().to_string(), Dispatch::Handler(handler));
        }

        let own_defaults = target.iface().methods.iter();
        let inherited_defaults = target
            .iface()
            .parents
            .first()
            .map(|p| p.methods.as_slice())
            .unwrap_or(&[])
            .iter();
        for method in inherited_defaults.chain(own_defaults) {
            if let MethodKind::Default(body) = &method.kind {
                dispatch.insert(method.name.clone(), Dispatch::Default(body.clone()));
            }
        }

        Ok(Api {
            inner: Arc::new(ApiInner { target, dispatch }),
        })
    }
}

enum Dispatch {
    Handler(MethodHandler),
    Default(DefaultFn),
    Ignored(String),
}

struct ApiInner {
    target: Target,
    dispatch: HashMap<String, Dispatch>,
}

/// A bound API: routes named invocations to their per-operation handlers.
///
/// Cheap to clone; all state is shared and immutable. Equality, hashing, and display
/// are answered from the [`Target`].
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl Api {
    /// Invokes an operation and decodes the result into `T`.
    ///
    /// Unit results decode from `null`; operations declared to return `Response`
    /// must use [`invoke_response`](Self::invoke_response) instead.
    pub async fn invoke<T: DeserializeOwned>(&self, method: &str, args: Vec<Arg>) -> Result<T> {
        match self.invoke_raw(method, args).await? {
            Decoded::Value(value) => {
                serde_json::from_value(value.clone()).map_err(|e| Error::Decode {
                    config_key: self.config_key_of(method),
                    status: http::StatusCode::OK,
                    raw_body: value.to_string(),
                    message: e.to_string(),
                })
            }
            Decoded::Unit => {
                serde_json::from_value(serde_json::Value::Null).map_err(|e| Error::Decode {
                    config_key: self.config_key_of(method),
                    status: http::StatusCode::OK,
                    raw_body: String::new(),
                    message: e.to_string(),
                })
            }
            Decoded::Response(_) => Err(Error::Configuration(format!(
                "{} declares a Response return; use invoke_response",
                self.config_key_of(method)
            ))),
        }
    }

    /// Invokes an operation declared to return the raw [`Response`]. The caller owns
    /// the body.
    pub async fn invoke_response(&self, method: &str, args: Vec<Arg>) -> Result<Response> {
        match self.invoke_raw(method, args).await? {
            Decoded::Response(response) => Ok(response),
            _ => Err(Error::Configuration(format!(
                "{} does not declare a Response return",
                self.config_key_of(method)
            ))),
        }
    }

    /// Invokes an operation and returns the undecoded pipeline result.
    pub async fn invoke_raw(&self, method: &str, args: Vec<Arg>) -> Result<Decoded> {
        match self.inner.dispatch.get(method) {
            Some(Dispatch::Handler(handler)) => handler.invoke(&args).await,
            Some(Dispatch::Default(body)) => body(self.clone(), args).await,
            Some(Dispatch::Ignored(config_key)) => Err(Error::Configuration(format!(
                "{config_key} is not an operation handled by this client"
            ))),
            None => Err(Error::UnknownMethod {
                target: self.inner.target.to_string(),
                method: method.to_string(),
            }),
        }
    }

    /// The target this API is bound to.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    fn config_key_of(&self, method: &str) -> String {
        match self.inner.dispatch.get(method) {
            Some(Dispatch::Handler(handler)) => handler.metadata.config_key().to_string(),
            Some(Dispatch::Ignored(config_key)) => config_key.clone(),
            _ => format!("{}#{}", self.inner.target.iface().name(), method),
        }
    }
}

impl PartialEq for Api {
    fn eq(&self, other: &Self) -> bool {
        self.inner.target == other.inner.target
    }
}

impl Eq for Api {}

impl std::hash::Hash for Api {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.target.hash(state);
    }
}

impl std::fmt::Display for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner.target, f)
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").field("target", &self.inner.target).finish()
    }
}

/// Builder for configuring and creating a [`Veneer`] engine.
///
/// Every seam has a default: the standard contract, JSON codecs, the status error
/// decoder, a reqwest transport, exponential backoff, and empty interceptor lists.
pub struct Builder {
    contract: Arc<dyn Contract>,
    encoder: Arc<dyn Encoder>,
    decoder: Arc<dyn Decoder>,
    error_decoder: Arc<dyn ErrorDecoder>,
    query_map_encoder: Arc<dyn QueryMapEncoder>,
    transport: Option<Arc<dyn Transport>>,
    retryer: Arc<dyn Retryer>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    options: Options,
    propagation: PropagationPolicy,
    dismiss_404: bool,
    decode_void: bool,
    capabilities: Vec<Arc<dyn Capability>>,
}

impl Builder {
    /// Creates a new `Builder` with default components.
    pub fn new() -> Self {
        Self {
            contract: Arc::new(DefaultContract::new()),
            encoder: Arc::new(JsonEncoder),
            decoder: Arc::new(JsonDecoder),
            error_decoder: Arc::new(StatusErrorDecoder),
            query_map_encoder: Arc::new(ObjectQueryMapEncoder),
            transport: None,
            retryer: Arc::new(ExponentialBackoff::default()),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            options: Options::default(),
            propagation: PropagationPolicy::default(),
            dismiss_404: false,
            decode_void: false,
            capabilities: Vec::new(),
        }
    }

    /// Sets the contract that parses interface descriptions.
    pub fn contract(mut self, contract: impl Contract + 'static) -> Self {
        self.contract = Arc::new(contract);
        self
    }

    /// Sets the request body encoder.
    pub fn encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    /// Sets the response decoder.
    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Sets the error decoder for non-2xx responses.
    pub fn error_decoder(mut self, error_decoder: impl ErrorDecoder + 'static) -> Self {
        self.error_decoder = Arc::new(error_decoder);
        self
    }

    /// Sets the query-map encoder.
    pub fn query_map_encoder(mut self, encoder: impl QueryMapEncoder + 'static) -> Self {
        self.query_map_encoder = Arc::new(encoder);
        self
    }

    /// Sets the transport. Defaults to a reqwest-backed transport built from the
    /// configured options.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the retry policy cloned for each invocation.
    pub fn retryer(mut self, retryer: impl Retryer + 'static) -> Self {
        self.retryer = Arc::new(retryer);
        self
    }

    /// Appends a request interceptor. Interceptors run in registration order.
    pub fn request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.request_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Appends a response interceptor. Interceptors run in registration order.
    pub fn response_interceptor(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        self.response_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Sets the default transport options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Sets what happens to an exhausted retryable failure.
    pub fn propagation_policy(mut self, policy: PropagationPolicy) -> Self {
        self.propagation = policy;
        self
    }

    /// Treats 404 responses as empty results for operations with a decodable return.
    pub fn dismiss_404(mut self) -> Self {
        self.dismiss_404 = true;
        self
    }

    /// Runs the decoder even for operations declared to return nothing.
    pub fn decode_void(mut self) -> Self {
        self.decode_void = true;
        self
    }

    /// Registers a capability, applied in order at build time.
    pub fn capability(mut self, capability: impl Capability + 'static) -> Self {
        self.capabilities.push(Arc::new(capability));
        self
    }

    /// Builds the configured engine.
    pub fn build(self) -> Result<Veneer> {
        let mut encoder = self.encoder;
        let mut decoder = self.decoder;
        let mut error_decoder = self.error_decoder;
        let mut transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_options(&self.options)?),
        };
        let mut retryer = self.retryer;
        let mut request_interceptors = self.request_interceptors;
        let mut response_interceptors = self.response_interceptors;

        for capability in &self.capabilities {
            encoder = capability.enrich_encoder(encoder);
            decoder = capability.enrich_decoder(decoder);
            error_decoder = capability.enrich_error_decoder(error_decoder);
            transport = capability.enrich_transport(transport);
            retryer = capability.enrich_retryer(retryer);
            request_interceptors = capability.enrich_request_interceptors(request_interceptors);
            response_interceptors = capability.enrich_response_interceptors(response_interceptors);
        }

        let response_handler = Arc::new(ResponseHandler {
            decoder,
            error_decoder,
            dismiss_404: self.dismiss_404,
            decode_void: self.decode_void,
            response_interceptors,
        });

        Ok(Veneer {
            components: Arc::new(Components {
                contract: self.contract,
                factory: Arc::new(TemplateFactory::new(encoder, self.query_map_encoder)),
                transport,
                retryer,
                request_interceptors,
                response_handler,
                options: self.options,
                propagation: self.propagation,
            }),
        })
    }

    /// Builds the engine and binds `iface` to `url` in one step.
    pub fn target(self, iface: InterfaceDef, url: impl Into<String>) -> Result<Api> {
        self.build()?.new_instance(Target::new(iface, url)?)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
