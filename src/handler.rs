//! The per-operation invocation pipeline: binding, transport, decoding, retries.

use crate::binding::{Arg, TemplateFactory};
use crate::codec::{Decoded, Decoder, ErrorDecoder};
use crate::error::{Error, Result};
use crate::iface::ReturnType;
use crate::interceptor::{InvocationContext, RequestInterceptor, ResponseInterceptor};
use crate::metadata::MethodMetadata;
use crate::request::{Options, Request};
use crate::response::Response;
use crate::retry::Retryer;
use crate::target::Target;
use crate::transport::Transport;
use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// What happens to an exhausted retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationPolicy {
    /// Propagate the retryable wrapper itself.
    #[default]
    Propagate,
    /// Propagate its cause instead.
    Unwrap,
}

/// Dispatches a response to the decoder or the error decoder, running the response
/// interceptor chain first.
pub(crate) struct ResponseHandler {
    pub(crate) decoder: Arc<dyn Decoder>,
    pub(crate) error_decoder: Arc<dyn ErrorDecoder>,
    pub(crate) dismiss_404: bool,
    pub(crate) decode_void: bool,
    pub(crate) response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl ResponseHandler {
    pub(crate) fn handle(
        &self,
        context: &InvocationContext,
        mut response: Response,
    ) -> Result<Decoded> {
        for interceptor in &self.response_interceptors {
            response = interceptor.intercept(context, response)?;
        }

        let status = response.status();
        let dismissed_404 = status == StatusCode::NOT_FOUND
            && self.dismiss_404
            && !matches!(
                context.return_type(),
                ReturnType::Unit | ReturnType::Response
            );
        if status.is_success() || dismissed_404 {
            return self.decode(context, response, dismissed_404);
        }

        Err(self.error_decoder.decode(context.config_key(), &response))
    }

    fn decode(
        &self,
        context: &InvocationContext,
        response: Response,
        dismissed_404: bool,
    ) -> Result<Decoded> {
        match context.return_type() {
            ReturnType::Response => Ok(Decoded::Response(response)),
            ReturnType::Unit if !self.decode_void => Ok(Decoded::Unit),
            return_type => {
                if dismissed_404 {
                    // Dismissed misses decode as null so optional facades observe "empty".
                    return Ok(Decoded::Value(Value::Null));
                }
                let value = self
                    .decoder
                    .decode(&response, return_type)
                    .map_err(|e| match e {
                        kept @ (Error::Retryable(_) | Error::Decode { .. }) => kept,
                        other => Error::Decode {
                            config_key: context.config_key().to_string(),
                            status: response.status(),
                            raw_body: response.text(),
                            message: other.to_string(),
                        },
                    })?;
                Ok(Decoded::Value(value))
            }
        }
    }
}

/// One instance per operation per target: binds arguments, runs interceptors, drives
/// the transport, and loops on retryable failures under a fresh retry-policy clone.
pub(crate) struct MethodHandler {
    pub(crate) target: Target,
    pub(crate) metadata: Arc<MethodMetadata>,
    pub(crate) factory: Arc<TemplateFactory>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) retryer: Arc<dyn Retryer>,
    pub(crate) request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    pub(crate) response_handler: Arc<ResponseHandler>,
    pub(crate) options: Options,
    pub(crate) propagation: PropagationPolicy,
}

impl MethodHandler {
    pub(crate) async fn invoke(&self, args: &[Arg]) -> Result<Decoded> {
        let mut template = self.factory.create(&self.target, &self.metadata, args)?;
        for interceptor in &self.request_interceptors {
            interceptor.apply(&mut template);
        }
        let request = template.freeze()?;

        let options = args
            .iter()
            .find_map(|arg| match arg {
                Arg::Options(options) => Some(options.clone()),
                _ => None,
            })
            .unwrap_or_else(|| self.options.clone());

        let context = InvocationContext::new(
            self.metadata.config_key().to_string(),
            self.metadata.return_type().clone(),
        );
        let mut retryer = self.retryer.clone_boxed();
        let mut attempt: u32 = 1;

        loop {
            match self.execute_and_decode(&context, &request, &options).await {
                Ok(decoded) => return Ok(decoded),
                Err(Error::Retryable(err)) => match retryer.continue_or_propagate(err).await {
                    Ok(_) => {
                        attempt += 1;
                        tracing::warn!(
                            config_key = %self.metadata.config_key(),
                            attempt,
                            "retrying request"
                        );
                    }
                    Err(exhausted) => return Err(self.propagate(exhausted)),
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn propagate(&self, error: Error) -> Error {
        match (self.propagation, error) {
            (PropagationPolicy::Unwrap, Error::Retryable(err)) => err.into_cause(),
            (_, error) => error,
        }
    }

    async fn execute_and_decode(
        &self,
        context: &InvocationContext,
        request: &Request,
        options: &Options,
    ) -> Result<Decoded> {
        tracing::debug!(
            method = %request.method(),
            url = request.url(),
            config_key = %self.metadata.config_key(),
            "executing HTTP request"
        );
        let start = Instant::now();

        let response = match self.transport.execute(request, options).await {
            Ok(response) => response,
            Err(e) => return Err(Error::retryable_io(request.method().clone(), e)),
        };

        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            config_key = %self.metadata.config_key(),
            "received HTTP response"
        );

        self.response_handler.handle(context, response)
    }
}
