//! Interceptors installed by [`LocalNode`](crate::node::LocalNode).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use node_rpc::transport::AUTHORIZATION_HEADER;
use node_rpc::{BoxMessage, CallContext, Interceptor, MethodInfo, Next, Status};
use snafu::{Location, Snafu, ensure};
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Wraps each call in an `rpc` span and logs its outcome and latency.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        ctx: CallContext,
        request: BoxMessage,
        info: &MethodInfo,
        next: Next,
    ) -> Result<BoxMessage, Status> {
        let span = tracing::info_span!("rpc", method = %info);
        let started = Instant::now();
        let result = next.run(ctx, request).instrument(span).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(method = %info, code = "OK", elapsed_ms, "Call completed"),
            Err(status) => tracing::warn!(
                method = %info,
                code = %status.code(),
                elapsed_ms,
                "Call failed: {}",
                status.message()
            ),
        }
        result
    }
}

/// Requires `authorization: Bearer <token>` on every call except the exempt
/// methods.
#[derive(Clone, Debug)]
pub struct AuthInterceptor {
    token: String,
    exempt: HashSet<String>,
}

impl AuthInterceptor {
    pub fn new(token: impl Into<String>) -> Self {
        AuthInterceptor {
            token: token.into(),
            exempt: HashSet::new(),
        }
    }

    /// Lets `full_method` (`/<service>/<method>`) through without a token.
    pub fn exempt(mut self, full_method: impl Into<String>) -> Self {
        self.exempt.insert(full_method.into());
        self
    }

    fn authorize(&self, ctx: &CallContext) -> Result<(), Status> {
        let header = ctx
            .metadata()
            .get(AUTHORIZATION_HEADER)
            .ok_or_else(|| Status::permission_denied("missing bearer token"))?;
        match header.strip_prefix("Bearer ") {
            Some(token) if token == self.token => Ok(()),
            _ => Err(Status::permission_denied("invalid bearer token")),
        }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn intercept(
        &self,
        ctx: CallContext,
        request: BoxMessage,
        info: &MethodInfo,
        next: Next,
    ) -> Result<BoxMessage, Status> {
        if !self.exempt.contains(info.full_method()) {
            if let Err(status) = self.authorize(&ctx) {
                tracing::debug!(method = %info, "Rejecting unauthorized call");
                return Err(status);
            }
        }
        next.run(ctx, request).await
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterceptorError {
    #[snafu(display("Concurrency limit {limit} is outside 1..={max}"))]
    InvalidConcurrencyLimit {
        limit: usize,
        max: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Bounds the number of calls running at once.
///
/// Waiting callers give up when their context is done. With `fail_fast` a call
/// that finds no free slot fails immediately with `ResourceExhausted`.
#[derive(Clone, Debug)]
pub struct RateLimitInterceptor {
    permits: Arc<Semaphore>,
    fail_fast: bool,
}

impl RateLimitInterceptor {
    /// Fails unless `max_concurrent_calls` is in `1..=Semaphore::MAX_PERMITS`.
    /// A zero limit would park every call without a deadline forever.
    pub fn new(max_concurrent_calls: usize, fail_fast: bool) -> Result<Self, InterceptorError> {
        ensure!(
            (1..=Semaphore::MAX_PERMITS).contains(&max_concurrent_calls),
            InvalidConcurrencyLimitSnafu {
                limit: max_concurrent_calls,
                max: Semaphore::MAX_PERMITS,
            }
        );
        Ok(RateLimitInterceptor {
            permits: Arc::new(Semaphore::new(max_concurrent_calls)),
            fail_fast,
        })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Interceptor for RateLimitInterceptor {
    async fn intercept(
        &self,
        ctx: CallContext,
        request: BoxMessage,
        info: &MethodInfo,
        next: Next,
    ) -> Result<BoxMessage, Status> {
        let _permit = if self.fail_fast {
            Arc::clone(&self.permits).try_acquire_owned().map_err(|_| {
                tracing::debug!(method = %info, "No capacity left");
                Status::resource_exhausted("too many concurrent calls")
            })?
        } else {
            tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => {
                    permit.map_err(|_| Status::unavailable("rate limiter closed"))?
                }
                _ = ctx.done() => {
                    return Err(Status::deadline_exceeded("deadline exceeded while waiting for capacity"));
                }
            }
        };
        next.run(ctx, request).await
    }
}
