//! Retry policies: the default backoff, the never-retry sentinel, and a custom policy.
//!
//! Run with: cargo run --example custom_retry

use async_trait::async_trait;
use std::time::Duration;
use veneer::{
    Arg, Error, ExponentialBackoff, InterfaceDef, MethodDef, NeverRetry, ParamDef,
    PropagationPolicy, Result, RetryableError, Retryer, ReturnType, Veneer,
};

/// Retries immediately, up to a fixed number of attempts, with no sleeping at all.
/// Useful against local services where backoff only adds latency.
struct EagerRetry {
    remaining: u32,
}

impl EagerRetry {
    fn new(attempts: u32) -> Self {
        Self { remaining: attempts }
    }
}

#[async_trait]
impl Retryer for EagerRetry {
    async fn continue_or_propagate(&mut self, err: RetryableError) -> Result<RetryableError> {
        if self.remaining == 0 {
            return Err(Error::Retryable(err));
        }
        self.remaining -= 1;
        Ok(err)
    }

    fn clone_boxed(&self) -> Box<dyn Retryer> {
        Box::new(Self { remaining: self.remaining })
    }
}

fn status_iface() -> InterfaceDef {
    InterfaceDef::new("Httpbin").method(
        MethodDef::new("status")
            .request_line("GET /status/{code}")
            .returns(ReturnType::named("String"))
            .param(ParamDef::new("code", "u16").bind("code")),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let base = "https://httpbin.org";

    // The default policy shape: a base period growing 1.5x per attempt under a cap.
    let api = Veneer::builder()
        .retryer(ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            3,
        ))
        .target(status_iface(), base)?;
    match api.invoke::<String>("status", vec![Arg::from(503u64)]).await {
        Ok(_) => println!("backoff: unexpectedly succeeded"),
        Err(e) => println!("backoff: gave up with: {e}"),
    }

    // Never retry: the first retryable failure propagates untouched.
    let api = Veneer::builder()
        .retryer(NeverRetry)
        .target(status_iface(), base)?;
    match api.invoke::<String>("status", vec![Arg::from(503u64)]).await {
        Ok(_) => println!("never: unexpectedly succeeded"),
        Err(e) => println!("never: failed fast with: {e}"),
    }

    // Custom policy plus unwrap propagation: the caller sees the status error, not
    // the retryable wrapper.
    let api = Veneer::builder()
        .retryer(EagerRetry::new(2))
        .propagation_policy(PropagationPolicy::Unwrap)
        .target(status_iface(), base)?;
    match api.invoke::<String>("status", vec![Arg::from(503u64)]).await {
        Ok(_) => println!("eager: unexpectedly succeeded"),
        Err(e) => println!("eager: exhausted with cause: {e}"),
    }

    Ok(())
}
