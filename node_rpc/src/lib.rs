//! Unary RPC core: service descriptors, a handler registry, a dispatcher with
//! interceptor chains, typed clients and an in-process transport.

pub mod client;
pub mod compression;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod interceptor;
pub mod message;
pub mod registry;
pub mod service;
pub mod status;
pub mod transport;

pub use async_trait;
pub use prost;

pub use client::{CallOptions, Client};
pub use compression::Compression;
pub use context::{CallContext, Metadata};
pub use descriptor::{BoxFuture, MethodDescriptor, ServiceDescriptor};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use interceptor::{Interceptor, MethodInfo, Next, interceptor_fn};
pub use message::BoxMessage;
pub use registry::{RegistryError, ServiceRegistry};
pub use status::{Code, Status};
pub use transport::{Channel, LocalChannel, OutboundCall, Server, TransportError};
