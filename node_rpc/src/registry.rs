use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use snafu::{Location, Snafu, ensure};

use crate::context::CallContext;
use crate::descriptor::{BoxFuture, DecodeFn, InvokeFn, ServiceDescriptor};
use crate::interceptor::UnaryCall;
use crate::message::BoxMessage;
use crate::status::Status;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RegistryError {
    #[snafu(display("Service {service} is already registered"))]
    DuplicateService {
        service: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Method {method} is declared more than once by service {service}"))]
    DuplicateMethod {
        service: String,
        method: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid service name: {service:?}"))]
    InvalidServiceName {
        service: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid method name {method:?} in service {service}"))]
    InvalidMethodName {
        service: String,
        method: String,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Terminal step of a method pipeline: the handler instance plus the typed
/// invoke function from the method descriptor.
struct HandlerCall<S: ?Sized + 'static> {
    handler: Arc<S>,
    invoke: InvokeFn<S>,
}

impl<S> UnaryCall for HandlerCall<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    fn call(
        &self,
        ctx: CallContext,
        request: BoxMessage,
    ) -> BoxFuture<'static, Result<BoxMessage, Status>> {
        (self.invoke)(Arc::clone(&self.handler), ctx, request)
    }
}

pub(crate) struct RegisteredMethod {
    pub(crate) name: &'static str,
    pub(crate) decode: DecodeFn,
    pub(crate) handler: Arc<dyn UnaryCall>,
}

pub(crate) struct RegisteredService {
    pub(crate) name: &'static str,
    pub(crate) methods: Vec<RegisteredMethod>,
}

/// Services bound to their handler instances, in registration order.
///
/// Built during startup and handed to
/// [`DispatcherBuilder::build`](crate::dispatcher::DispatcherBuilder::build),
/// which freezes it.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to every method declared by `descriptor`.
    ///
    /// `handler` must implement the whole service trait, so a handler that
    /// lacks a method does not compile. Nothing is registered when an error is
    /// returned.
    pub fn register<S>(
        &mut self,
        descriptor: &'static ServiceDescriptor<S>,
        handler: Arc<S>,
    ) -> Result<(), RegistryError>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let service = descriptor.name();
        ensure!(
            is_valid_service_name(service),
            InvalidServiceNameSnafu { service }
        );
        ensure!(
            !self.contains(service),
            DuplicateServiceSnafu { service }
        );

        let mut seen = HashSet::new();
        let mut methods = Vec::with_capacity(descriptor.methods().len());
        for method in descriptor.methods() {
            ensure!(
                is_valid_method_name(method.name),
                InvalidMethodNameSnafu {
                    service,
                    method: method.name,
                }
            );
            ensure!(
                seen.insert(method.name),
                DuplicateMethodSnafu {
                    service,
                    method: method.name,
                }
            );
            methods.push(RegisteredMethod {
                name: method.name,
                decode: method.decode,
                handler: Arc::new(HandlerCall {
                    handler: Arc::clone(&handler),
                    invoke: method.invoke,
                }),
            });
        }

        tracing::debug!(
            target: "node_rpc::registry",
            service,
            method_count = methods.len(),
            "Service registered"
        );
        self.services.push(RegisteredService {
            name: service,
            methods,
        });
        Ok(())
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.iter().any(|s| s.name == service)
    }

    pub fn service_names(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.name).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub(crate) fn into_services(self) -> Vec<RegisteredService> {
        self.services
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .finish()
    }
}

fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains(['/', ' '])
}

fn is_valid_method_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', ' ', '.'])
}
