//! Interceptor seams on both sides of the transport.

use crate::error::Result;
use crate::iface::ReturnType;
use crate::response::Response;
use crate::template::RequestTemplate;

/// Mutates the request template after argument binding and before freezing.
///
/// Interceptors run in configured order and see the template with all slots resolved;
/// typical uses are authentication headers and tracing propagation.
pub trait RequestInterceptor: Send + Sync {
    /// Applies this interceptor to the template.
    fn apply(&self, template: &mut RequestTemplate);
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut RequestTemplate) + Send + Sync,
{
    fn apply(&self, template: &mut RequestTemplate) {
        self(template)
    }
}

/// What a response interceptor knows about the invocation it observes.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    config_key: String,
    return_type: ReturnType,
}

impl InvocationContext {
    pub(crate) fn new(config_key: String, return_type: ReturnType) -> Self {
        Self {
            config_key,
            return_type,
        }
    }

    /// The canonical identity of the invoked operation.
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    /// The operation's declared result type.
    pub fn return_type(&self) -> &ReturnType {
        &self.return_type
    }
}

/// Observes or replaces the response before decoding.
///
/// Interceptors run in configured order; each receives the previous one's output and
/// may return a different `Response`, or an error to short-circuit decoding.
pub trait ResponseInterceptor: Send + Sync {
    /// Applies this interceptor, yielding the response decoding proceeds with.
    fn intercept(&self, context: &InvocationContext, response: Response) -> Result<Response>;
}

impl<F> ResponseInterceptor for F
where
    F: Fn(&InvocationContext, Response) -> Result<Response> + Send + Sync,
{
    fn intercept(&self, context: &InvocationContext, response: Response) -> Result<Response> {
        self(context, response)
    }
}
