//! Declarative service definitions.
//!
//! [`unary_service!`](crate::unary_service) expands one service declaration
//! into everything needed on both sides of a call:
//!
//! * the async handler trait, one method per rpc;
//! * a `static` [`ServiceDescriptor`](crate::descriptor::ServiceDescriptor)
//!   that decodes requests and invokes the trait;
//! * a fallback type whose methods all return `Unimplemented`, for handlers
//!   that only serve part of a service;
//! * a typed client over any [`Channel`](crate::transport::Channel);
//! * a module of full method name constants.
//!
//! ```ignore
//! node_rpc::unary_service! {
//!     pub service Greeter = "example.greeter.v1.Greeter" {
//!         descriptor: GREETER;
//!         fallback: UnimplementedGreeter;
//!         client: GreeterClient;
//!         methods: greeter_methods;
//!
//!         rpc SayHello(HelloRequest) -> HelloReply as say_hello, const SAY_HELLO;
//!     }
//! }
//! ```

#[macro_export]
macro_rules! unary_service {
    (
        $(#[$attr:meta])*
        $vis:vis service $service:ident = $full_name:literal {
            descriptor: $descriptor:ident;
            fallback: $fallback:ident;
            client: $client:ident;
            methods: $methods_mod:ident;

            $(
                $(#[$method_attr:meta])*
                rpc $method:ident($request:ty) -> $response:ty as $fn_name:ident, const $const_name:ident;
            )+
        }
    ) => {
        $(#[$attr])*
        #[$crate::async_trait::async_trait]
        $vis trait $service: ::std::marker::Send + ::std::marker::Sync + 'static {
            $(
                $(#[$method_attr])*
                async fn $fn_name(
                    &self,
                    ctx: $crate::context::CallContext,
                    request: $request,
                ) -> ::std::result::Result<$response, $crate::status::Status>;
            )+
        }

        $vis static $descriptor: $crate::descriptor::ServiceDescriptor<dyn $service> =
            $crate::descriptor::ServiceDescriptor::new(
                $full_name,
                &[
                    $(
                        $crate::descriptor::MethodDescriptor {
                            name: ::std::stringify!($method),
                            decode: $crate::message::decode_boxed::<$request>,
                            invoke: |handler: ::std::sync::Arc<dyn $service>,
                                     ctx: $crate::context::CallContext,
                                     request: $crate::message::BoxMessage|
                             -> $crate::descriptor::BoxFuture<
                                'static,
                                ::std::result::Result<$crate::message::BoxMessage, $crate::status::Status>,
                            > {
                                ::std::boxed::Box::pin(async move {
                                    let request: $request = $crate::message::downcast(request)?;
                                    let response = handler.$fn_name(ctx, request).await?;
                                    ::std::result::Result::Ok($crate::message::boxed(response))
                                })
                            },
                        },
                    )+
                ],
            );

        #[doc = ::std::concat!("Answers every `", $full_name, "` method with `Unimplemented`.")]
        #[derive(Clone, Copy, Debug, Default)]
        $vis struct $fallback;

        #[$crate::async_trait::async_trait]
        impl $service for $fallback {
            $(
                async fn $fn_name(
                    &self,
                    _ctx: $crate::context::CallContext,
                    _request: $request,
                ) -> ::std::result::Result<$response, $crate::status::Status> {
                    ::std::result::Result::Err($crate::status::Status::unimplemented(
                        ::std::concat!("method ", ::std::stringify!($method), " not implemented"),
                    ))
                }
            )+
        }

        #[doc = ::std::concat!("Full method names of `", $full_name, "`.")]
        $vis mod $methods_mod {
            $(
                pub const $const_name: &str =
                    ::std::concat!("/", $full_name, "/", ::std::stringify!($method));
            )+
        }

        #[doc = ::std::concat!("Typed client for `", $full_name, "`.")]
        #[derive(Clone, Debug)]
        $vis struct $client<C> {
            inner: $crate::client::Client<C>,
        }

        impl<C: $crate::transport::Channel> $client<C> {
            pub fn new(channel: C) -> Self {
                Self::from_client($crate::client::Client::new(channel))
            }

            pub fn with_defaults(channel: C, defaults: $crate::client::CallOptions) -> Self {
                Self::from_client($crate::client::Client::with_defaults(channel, defaults))
            }

            pub fn from_client(inner: $crate::client::Client<C>) -> Self {
                $client { inner }
            }

            pub fn inner(&self) -> &$crate::client::Client<C> {
                &self.inner
            }

            $(
                $(#[$method_attr])*
                pub async fn $fn_name(
                    &self,
                    ctx: &$crate::context::CallContext,
                    request: $request,
                    options: $crate::client::CallOptions,
                ) -> ::std::result::Result<$response, $crate::status::Status> {
                    self.inner
                        .unary(ctx, $methods_mod::$const_name, &request, options)
                        .await
                }
            )+
        }
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::client::CallOptions;
    use crate::context::CallContext;
    use crate::dispatcher::Dispatcher;
    use crate::registry::ServiceRegistry;
    use crate::status::{Code, Status};
    use crate::transport::LocalChannel;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HelloRequest {
        #[prost(string, tag = "1")]
        pub name: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HelloReply {
        #[prost(string, tag = "1")]
        pub message: String,
    }

    crate::unary_service! {
        pub service Greeter = "example.greeter.v1.Greeter" {
            descriptor: GREETER;
            fallback: UnimplementedGreeter;
            client: GreeterClient;
            methods: greeter_methods;

            /// Says hello.
            rpc SayHello(HelloRequest) -> HelloReply as say_hello, const SAY_HELLO;
            rpc SayGoodbye(HelloRequest) -> HelloReply as say_goodbye, const SAY_GOODBYE;
        }
    }

    struct Friendly;

    #[async_trait::async_trait]
    impl Greeter for Friendly {
        async fn say_hello(
            &self,
            _ctx: CallContext,
            request: HelloRequest,
        ) -> Result<HelloReply, Status> {
            Ok(HelloReply {
                message: format!("hello {}", request.name),
            })
        }

        async fn say_goodbye(
            &self,
            ctx: CallContext,
            request: HelloRequest,
        ) -> Result<HelloReply, Status> {
            UnimplementedGreeter.say_goodbye(ctx, request).await
        }
    }

    fn client() -> GreeterClient<LocalChannel> {
        let mut registry = ServiceRegistry::new();
        registry.register(&GREETER, Arc::new(Friendly)).unwrap();
        GreeterClient::new(LocalChannel::from_dispatcher(Arc::new(Dispatcher::new(
            registry,
        ))))
    }

    #[test]
    fn test_generated_names() {
        assert_eq!(GREETER.name(), "example.greeter.v1.Greeter");
        assert_eq!(greeter_methods::SAY_HELLO, "/example.greeter.v1.Greeter/SayHello");
        assert_eq!(
            greeter_methods::SAY_GOODBYE,
            "/example.greeter.v1.Greeter/SayGoodbye"
        );
        let names: Vec<_> = GREETER.methods().iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["SayHello", "SayGoodbye"]);
    }

    #[tokio::test]
    async fn test_generated_client_round_trip() {
        let reply = client()
            .say_hello(
                &CallContext::new(),
                HelloRequest {
                    name: "node".to_string(),
                },
                CallOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(reply.message, "hello node");
    }

    #[tokio::test]
    async fn test_fallback_reports_method_name() {
        let status = client()
            .say_goodbye(&CallContext::new(), HelloRequest::default(), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
        assert_eq!(status.message(), "method SayGoodbye not implemented");
    }
}
