//! Server-side routing of unary calls.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::instrument;

use crate::context::CallContext;
use crate::descriptor::{DecodeFn, split_full_method_name};
use crate::interceptor::{Interceptor, MethodInfo, UnaryCall, compose};
use crate::registry::ServiceRegistry;
use crate::status::Status;

struct Route {
    info: Arc<MethodInfo>,
    decode: DecodeFn,
    pipeline: Arc<dyn UnaryCall>,
}

struct ServiceRoutes {
    method_order: Vec<&'static str>,
    methods: HashMap<&'static str, Route>,
}

#[derive(Default)]
pub struct DispatcherBuilder {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl DispatcherBuilder {
    /// Appends an interceptor. Interceptors observe calls in the order they
    /// were added.
    pub fn interceptor<I: Interceptor>(self, interceptor: I) -> Self {
        self.interceptor_arc(Arc::new(interceptor))
    }

    pub fn interceptor_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Freezes the registry and composes one pipeline per method.
    pub fn build(self, registry: ServiceRegistry) -> Dispatcher {
        let mut services = HashMap::new();
        let mut service_order = Vec::new();

        for service in registry.into_services() {
            let mut routes = ServiceRoutes {
                method_order: Vec::with_capacity(service.methods.len()),
                methods: HashMap::with_capacity(service.methods.len()),
            };
            for method in service.methods {
                let info = Arc::new(MethodInfo::new(service.name, method.name));
                let pipeline = compose(&self.interceptors, Arc::clone(&info), method.handler);
                routes.method_order.push(method.name);
                routes.methods.insert(
                    method.name,
                    Route {
                        info,
                        decode: method.decode,
                        pipeline,
                    },
                );
            }
            service_order.push(service.name);
            services.insert(service.name, routes);
        }

        tracing::info!(
            target: "node_rpc::dispatcher",
            services = ?service_order,
            interceptors = self.interceptors.len(),
            "Dispatcher built"
        );
        Dispatcher {
            services,
            service_order,
            interceptor_count: self.interceptors.len(),
        }
    }
}

/// Routes `(service, method, payload)` to the registered handler.
///
/// Immutable once built; share it as `Arc<Dispatcher>` between the tasks that
/// serve inbound calls.
pub struct Dispatcher {
    services: HashMap<&'static str, ServiceRoutes>,
    service_order: Vec<&'static str>,
    interceptor_count: usize,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Dispatcher without interceptors.
    pub fn new(registry: ServiceRegistry) -> Self {
        Self::builder().build(registry)
    }

    /// Runs one unary call.
    ///
    /// Routing, cancellation and decode failures are produced here and never
    /// reach the handler. Handler errors are returned as they are unless an
    /// interceptor rewrites them.
    #[instrument(
        name = "Dispatcher::dispatch",
        skip(self, payload, ctx),
        fields(payload_len = payload.len())
    )]
    pub async fn dispatch(
        &self,
        service: &str,
        method: &str,
        payload: &[u8],
        ctx: CallContext,
    ) -> Result<Vec<u8>, Status> {
        if let Err(status) = ctx.check() {
            tracing::debug!(target: "node_rpc::dispatcher", "Context done before dispatch");
            return Err(status);
        }

        let routes = self
            .services
            .get(service)
            .ok_or_else(|| Status::not_found(format!("unknown service {service}")))?;
        let route = routes.methods.get(method).ok_or_else(|| {
            Status::unimplemented(format!("unknown method {method} for service {service}"))
        })?;

        let request = (route.decode)(payload).inspect_err(|status| {
            tracing::debug!(
                target: "node_rpc::dispatcher",
                method = %route.info,
                "Rejecting undecodable request: {status}"
            );
        })?;

        let response = route.pipeline.call(ctx, request).await?;
        Ok(response.encode_message())
    }

    /// Same as [`Dispatcher::dispatch`] with a `/<service>/<method>` path.
    pub async fn dispatch_path(
        &self,
        full_method: &str,
        payload: &[u8],
        ctx: CallContext,
    ) -> Result<Vec<u8>, Status> {
        let (service, method) = split_full_method_name(full_method)
            .ok_or_else(|| Status::unimplemented(format!("malformed method name {full_method}")))?;
        self.dispatch(service, method, payload, ctx).await
    }

    pub fn services(&self) -> &[&'static str] {
        &self.service_order
    }

    pub fn methods(&self, service: &str) -> Option<&[&'static str]> {
        self.services
            .get(service)
            .map(|routes| routes.method_order.as_slice())
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptor_count
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("services", &self.service_order)
            .field("interceptor_count", &self.interceptor_count)
            .finish()
    }
}
