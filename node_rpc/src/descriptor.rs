//! Static metadata describing services and their unary methods.
//!
//! Descriptors are produced by [`unary_service!`](crate::unary_service) as
//! `static` items and never change afterwards. `S` is the trait object type of
//! the service (`dyn NodeService`), which ties every method descriptor to the
//! handler trait it invokes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::CallContext;
use crate::message::BoxMessage;
use crate::status::Status;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Decodes a raw payload into the method's request type.
pub type DecodeFn = fn(&[u8]) -> Result<BoxMessage, Status>;

/// Invokes one method of a handler with an already decoded request.
pub type InvokeFn<S> =
    fn(Arc<S>, CallContext, BoxMessage) -> BoxFuture<'static, Result<BoxMessage, Status>>;

pub struct MethodDescriptor<S: ?Sized + 'static> {
    /// Unqualified method name, e.g. `GetFrames`.
    pub name: &'static str,
    pub decode: DecodeFn,
    pub invoke: InvokeFn<S>,
}

impl<S: ?Sized + 'static> fmt::Debug for MethodDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

pub struct ServiceDescriptor<S: ?Sized + 'static> {
    name: &'static str,
    methods: &'static [MethodDescriptor<S>],
}

impl<S: ?Sized + 'static> ServiceDescriptor<S> {
    pub const fn new(name: &'static str, methods: &'static [MethodDescriptor<S>]) -> Self {
        ServiceDescriptor { name, methods }
    }

    /// Fully qualified service name, e.g. `quilibrium.node.node.pb.NodeService`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn package(&self) -> &'static str {
        self.name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }

    pub fn short_name(&self) -> &'static str {
        self.name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(self.name)
    }

    pub fn methods(&self) -> &'static [MethodDescriptor<S>] {
        self.methods
    }

    pub fn method(&self, name: &str) -> Option<&'static MethodDescriptor<S>> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn full_method_name(&self, method: &str) -> String {
        full_method_name(self.name, method)
    }
}

impl<S: ?Sized + 'static> fmt::Debug for ServiceDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// `/<package>.<Service>/<Method>`
pub fn full_method_name(service: &str, method: &str) -> String {
    format!("/{service}/{method}")
}

/// Splits `/<service>/<method>` into its two parts.
pub fn split_full_method_name(path: &str) -> Option<(&str, &str)> {
    let (service, method) = path.strip_prefix('/')?.split_once('/')?;
    if service.is_empty() || method.is_empty() || method.contains('/') {
        return None;
    }
    Some((service, method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    trait Echo: Send + Sync {}

    fn reject(_: &[u8]) -> Result<BoxMessage, Status> {
        Err(Status::invalid_argument("no payload accepted"))
    }

    fn never(
        _: Arc<dyn Echo>,
        _: CallContext,
        _: BoxMessage,
    ) -> BoxFuture<'static, Result<BoxMessage, Status>> {
        Box::pin(async { Err(Status::internal("not callable")) })
    }

    static ECHO: ServiceDescriptor<dyn Echo> = ServiceDescriptor::new(
        "example.echo.v1.Echo",
        &[
            MethodDescriptor {
                name: "Say",
                decode: reject,
                invoke: never,
            },
            MethodDescriptor {
                name: "Shout",
                decode: reject,
                invoke: never,
            },
        ],
    );

    #[test]
    fn test_descriptor_names() {
        assert_eq!(ECHO.name(), "example.echo.v1.Echo");
        assert_eq!(ECHO.package(), "example.echo.v1");
        assert_eq!(ECHO.short_name(), "Echo");
        assert_eq!(ECHO.full_method_name("Say"), "/example.echo.v1.Echo/Say");
        assert_eq!(ECHO.methods().len(), 2);
        assert!(ECHO.method("Shout").is_some());
        assert!(ECHO.method("shout").is_none());
    }

    #[test]
    fn test_full_method_name_matches_wire_convention() {
        assert_eq!(
            full_method_name("quilibrium.node.node.pb.NodeService", "GetFrames"),
            "/quilibrium.node.node.pb.NodeService/GetFrames"
        );
    }

    #[test_case("/quilibrium.node.node.pb.NodeStats/PutPeerInfo", Some(("quilibrium.node.node.pb.NodeStats", "PutPeerInfo")))]
    #[test_case("quilibrium.node.node.pb.NodeStats/PutPeerInfo", None)]
    #[test_case("/NodeStats/", None)]
    #[test_case("//PutPeerInfo", None)]
    #[test_case("/a/b/c", None)]
    #[test_case("", None)]
    fn test_split_full_method_name(path: &str, expected: Option<(&str, &str)>) {
        assert_eq!(split_full_method_name(path), expected);
    }
}
