//! # Veneer - a declarative HTTP client core
//!
//! Veneer turns a described interface into a live HTTP client: you declare operations
//! with request lines, header bindings, and parameter placeholders; the engine parses
//! the description into per-operation descriptors and produces an [`Api`] object that
//! translates named invocations into requests, executes them through a pluggable
//! transport, and decodes responses back into typed results.
//!
//! ## Quick Start
//!
//! ```no_run
//! use serde::Deserialize;
//! use veneer::{Arg, InterfaceDef, MethodDef, ParamDef, ReturnType, Veneer};
//!
//! #[derive(Deserialize)]
//! struct Contributor {
//!     login: String,
//!     contributions: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), veneer::Error> {
//!     let github = InterfaceDef::new("GitHub")
//!         .headers(["Accept: application/vnd.github.v3+json"])
//!         .method(
//!             MethodDef::new("contributors")
//!                 .request_line("GET /repos/{owner}/{repo}/contributors")
//!                 .returns(ReturnType::named("Vec<Contributor>"))
//!                 .param(ParamDef::new("owner", "String").bind("owner"))
//!                 .param(ParamDef::new("repo", "String").bind("repo")),
//!         );
//!
//!     let api = Veneer::builder().target(github, "https://api.github.com")?;
//!
//!     let contributors: Vec<Contributor> = api
//!         .invoke("contributors", vec![Arg::from("rust-lang"), Arg::from("cargo")])
//!         .await?;
//!     for c in contributors {
//!         println!("{}: {}", c.login, c.contributions);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Declarative bindings** - request lines, static headers, body templates, and
//!   `{name}` placeholders parsed once into immutable per-operation descriptors
//! - **Pluggable seams** - transport, encoder, decoder, error decoder, query-map
//!   encoder, and retry policy are all trait objects with bundled defaults
//! - **Retry pipeline** - only failures the error decoder marks retryable reach the
//!   retry policy; exponential backoff honors `Retry-After` hints
//! - **Interceptors** - request interceptors mutate templates before freezing,
//!   response interceptors observe or replace responses before decoding
//! - **Capabilities** - build-time plugins that wrap any installed component
//! - **Structured logging** - request execution, responses, and retries emit
//!   `tracing` events with operation identity attached
//!
//! ## Binding pipeline
//!
//! Each invocation flows through the same stages: clone the operation's skeleton
//! template, expand argument slots, apply request interceptors, freeze into a
//! [`Request`], execute the transport, run response interceptors, then hand the
//! response to the decoder or the error decoder. A retryable failure loops back
//! through a per-invocation clone of the retry policy.
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`] variant preserving raw response data where it
//! exists:
//!
//! ```no_run
//! use veneer::{Api, Arg, Error};
//!
//! # async fn example(api: Api) {
//! match api.invoke::<serde_json::Value>("get", vec![Arg::from("1")]).await {
//!     Ok(value) => println!("Success: {value:?}"),
//!     Err(Error::Status { status, raw_body, .. }) => {
//!         eprintln!("HTTP error {status}: {raw_body}");
//!     }
//!     Err(Error::Decode { raw_body, message, .. }) => {
//!         eprintln!("Failed to decode: {message}");
//!         eprintln!("  Raw response: {raw_body}");
//!     }
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! # }
//! ```

mod binding;
mod client;
mod codec;
mod contract;
mod error;
mod handler;
mod iface;
mod interceptor;
mod metadata;
mod request;
mod response;
mod retry;
mod target;
mod template;
mod transport;

pub use binding::{Arg, Expander, ToStringExpander};
pub use client::{Api, Builder, Capability, Veneer};
pub use codec::{
    BodyType, Decoded, Decoder, Encoder, ErrorDecoder, JsonDecoder, JsonEncoder,
    ObjectQueryMapEncoder, QueryMapEncoder, StatusErrorDecoder,
};
pub use contract::{Contract, DefaultContract};
pub use error::{Error, Result, RetryableError};
pub use handler::PropagationPolicy;
pub use iface::{
    ClassBinding, DefaultFn, DefaultFuture, InterfaceDef, MethodBinding, MethodDef, MethodKind,
    ParamBinding, ParamDef, ParamKind, ReturnType,
};
pub use interceptor::{InvocationContext, RequestInterceptor, ResponseInterceptor};
pub use metadata::MethodMetadata;
pub use request::{Options, Request};
pub use response::{Response, ResponseBody};
pub use retry::{ExponentialBackoff, NeverRetry, Retryer};
pub use target::{config_key, Target};
pub use template::{CollectionFormat, HeaderField, QueryPair, RequestTemplate, TemplateBody};
pub use transport::{BoxError, ReqwestTransport, Transport};
