//! Interceptor chains around unary handlers.
//!
//! Interceptors are kept as an ordered list and folded right to left into a
//! single [`UnaryCall`] per method when the dispatcher is built. The first
//! interceptor in the list is the outermost one: it sees the call first and the
//! response last. Each interceptor receives a [`Next`] continuation and decides
//! whether to run it, short-circuit, or rewrite the request or the result.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::descriptor::BoxFuture;
use crate::message::BoxMessage;
use crate::status::Status;

/// Identity of the method a call is routed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    service: &'static str,
    method: &'static str,
    full_method: String,
}

impl MethodInfo {
    pub fn new(service: &'static str, method: &'static str) -> Self {
        MethodInfo {
            service,
            method,
            full_method: crate::descriptor::full_method_name(service, method),
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    /// `/<package>.<Service>/<Method>`
    pub fn full_method(&self) -> &str {
        &self.full_method
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_method)
    }
}

/// One step of a composed call: either an interceptor layer or the handler.
pub trait UnaryCall: Send + Sync {
    fn call(
        &self,
        ctx: CallContext,
        request: BoxMessage,
    ) -> BoxFuture<'static, Result<BoxMessage, Status>>;
}

#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(
        &self,
        ctx: CallContext,
        request: BoxMessage,
        info: &MethodInfo,
        next: Next,
    ) -> Result<BoxMessage, Status>;
}

/// The remainder of the chain, ending in the handler.
#[derive(Clone)]
pub struct Next {
    inner: Arc<dyn UnaryCall>,
}

impl Next {
    pub async fn run(self, ctx: CallContext, request: BoxMessage) -> Result<BoxMessage, Status> {
        self.inner.call(ctx, request).await
    }
}

struct Layer {
    interceptor: Arc<dyn Interceptor>,
    info: Arc<MethodInfo>,
    next: Arc<dyn UnaryCall>,
}

impl UnaryCall for Layer {
    fn call(
        &self,
        ctx: CallContext,
        request: BoxMessage,
    ) -> BoxFuture<'static, Result<BoxMessage, Status>> {
        let interceptor = Arc::clone(&self.interceptor);
        let info = Arc::clone(&self.info);
        let next = Next {
            inner: Arc::clone(&self.next),
        };
        Box::pin(async move { interceptor.intercept(ctx, request, &info, next).await })
    }
}

/// Wraps `terminal` in `interceptors`, first element outermost.
pub fn compose(
    interceptors: &[Arc<dyn Interceptor>],
    info: Arc<MethodInfo>,
    terminal: Arc<dyn UnaryCall>,
) -> Arc<dyn UnaryCall> {
    interceptors
        .iter()
        .rev()
        .fold(terminal, |next, interceptor| {
            Arc::new(Layer {
                interceptor: Arc::clone(interceptor),
                info: Arc::clone(&info),
                next,
            })
        })
}

struct FnInterceptor<F>(F);

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(
            CallContext,
            BoxMessage,
            &'a MethodInfo,
            Next,
        ) -> BoxFuture<'static, Result<BoxMessage, Status>>
        + Send
        + Sync
        + 'static,
{
    async fn intercept(
        &self,
        ctx: CallContext,
        request: BoxMessage,
        info: &MethodInfo,
        next: Next,
    ) -> Result<BoxMessage, Status> {
        (self.0)(ctx, request, info, next).await
    }
}

/// Builds an interceptor from a closure.
pub fn interceptor_fn<F>(f: F) -> Arc<dyn Interceptor>
where
    F: for<'a> Fn(
            CallContext,
            BoxMessage,
            &'a MethodInfo,
            Next,
        ) -> BoxFuture<'static, Result<BoxMessage, Status>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnInterceptor(f))
}
