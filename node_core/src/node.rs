//! Wiring of the node services into a running in-process server.

use std::sync::Arc;

use chrono::Utc;
use node_rpc::descriptor::split_full_method_name;
use node_rpc::{
    CallContext, CallOptions, Channel, Dispatcher, LocalChannel, OutboundCall, RegistryError,
    Server, ServiceRegistry, Status,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{Location, ResultExt, Snafu};
use uuid::Uuid;

use crate::apis::node::{ApiError, NodeIdentity, NodeState, TokenBalances};
use crate::config::NodeConfig;
use crate::interceptors::{
    AuthInterceptor, InterceptorError, LoggingInterceptor, RateLimitInterceptor,
};
use crate::protobuf_apis::{NodeServiceImpl, StatsCollector};
use crate::protobuf_gen::node::*;

pub const PACKAGE: &str = "quilibrium.node.node.pb";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum NodeError {
    #[snafu(display("Failed to register services"))]
    Registration {
        source: RegistryError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid interceptor configuration"))]
    Interceptor {
        source: InterceptorError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Invalid JSON request"))]
    RequestJson {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to render response"))]
    ResponseJson {
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Call failed: {source}"))]
    Call {
        source: Status,
        #[snafu(implicit)]
        location: Location,
    },
}

impl NodeError {
    /// Status of a failed call, if that is what this error is.
    pub fn status(&self) -> Option<&Status> {
        match self {
            NodeError::Call { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// `NodeService` and `NodeStats` served over an in-process channel.
pub struct LocalNode {
    config: NodeConfig,
    state: Arc<NodeState>,
    dispatcher: Arc<Dispatcher>,
    channel: LocalChannel,
}

impl LocalNode {
    /// Registers both services and installs the interceptors the config asks
    /// for: call logging, bearer auth when a token is set, and the concurrency
    /// limit, in that order.
    pub fn start(config: NodeConfig, state: Arc<NodeState>) -> Result<Self, NodeError> {
        let mut registry = ServiceRegistry::new();
        let node_service = Arc::new(NodeServiceImpl::new(
            Arc::clone(&state),
            config.server.max_frames_per_request,
        ));
        registry
            .register(&NODE_SERVICE, node_service)
            .context(RegistrationSnafu)?;
        let stats = Arc::new(StatsCollector::new(
            Arc::clone(&state),
            config.server.idempotency_cache_size,
        ));
        registry
            .register(&NODE_STATS, stats)
            .context(RegistrationSnafu)?;

        let mut builder = Dispatcher::builder();
        if config.server.log_calls {
            builder = builder.interceptor(LoggingInterceptor);
        }
        if let Some(token) = &config.server.auth_token {
            builder = builder.interceptor(AuthInterceptor::new(token.clone()));
        }
        let rate_limit = RateLimitInterceptor::new(
            config.server.max_concurrent_calls,
            config.server.rate_limit_fail_fast,
        )
        .context(InterceptorSnafu)?;
        builder = builder.interceptor(rate_limit);
        let dispatcher = Arc::new(builder.build(registry));
        let server = Server::new(Arc::clone(&dispatcher))
            .with_max_request_bytes(config.server.max_request_bytes);
        let channel = LocalChannel::new(Arc::new(server));

        tracing::info!(
            services = ?dispatcher.services(),
            auth = config.server.auth_token.is_some(),
            "Local node started"
        );
        Ok(LocalNode {
            config,
            state,
            dispatcher,
            channel,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn channel(&self) -> &LocalChannel {
        &self.channel
    }

    /// Client whose calls default to the configured client options.
    pub fn node_service(&self) -> NodeServiceClient<LocalChannel> {
        NodeServiceClient::with_defaults(self.channel.clone(), self.config.client.call_options())
    }

    pub fn node_stats(&self) -> NodeStatsClient<LocalChannel> {
        NodeStatsClient::with_defaults(self.channel.clone(), self.config.client.call_options())
    }

    /// Fails every later call with `Unavailable`.
    pub fn shutdown(&self) {
        self.channel.close();
        tracing::info!("Local node stopped");
    }

    /// Issues one call with a JSON request and renders the JSON response.
    ///
    /// `method` is either a full path or `<Service>/<Method>` within the node
    /// package. An empty request means the default message.
    pub async fn call_json(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &str,
    ) -> Result<String, NodeError> {
        let path = resolve_method_path(method);
        let service = self.node_service();
        let stats = self.node_stats();
        let options = CallOptions::new();

        match path.as_str() {
            node_service_methods::GET_FRAMES => render(
                &service
                    .get_frames(ctx, parse(request)?, options)
                    .await
                    .context(CallSnafu)?,
            ),
            node_service_methods::GET_FRAME_INFO => render(
                &service
                    .get_frame_info(ctx, parse(request)?, options)
                    .await
                    .context(CallSnafu)?,
            ),
            node_service_methods::GET_PEER_INFO => render(
                &service
                    .get_peer_info(ctx, parse(request)?, options)
                    .await
                    .context(CallSnafu)?,
            ),
            node_service_methods::GET_NODE_INFO => render(
                &service
                    .get_node_info(ctx, parse(request)?, options)
                    .await
                    .context(CallSnafu)?,
            ),
            node_service_methods::GET_NETWORK_INFO => render(
                &service
                    .get_network_info(ctx, parse(request)?, options)
                    .await
                    .context(CallSnafu)?,
            ),
            node_service_methods::GET_TOKEN_INFO => render(
                &service
                    .get_token_info(ctx, parse(request)?, options)
                    .await
                    .context(CallSnafu)?,
            ),
            node_stats_methods::PUT_NODE_INFO => render(
                &stats
                    .put_node_info(ctx, parse(request)?, options.idempotent())
                    .await
                    .context(CallSnafu)?,
            ),
            node_stats_methods::PUT_PEER_INFO => render(
                &stats
                    .put_peer_info(ctx, parse(request)?, options.idempotent())
                    .await
                    .context(CallSnafu)?,
            ),
            _ => {
                // Not a node method: let the server produce the routing error.
                let call = OutboundCall {
                    full_method: path.clone(),
                    payload: Vec::new(),
                    metadata: ctx.metadata().clone(),
                    timeout: ctx.remaining(),
                    credentials: self.config.client.auth_token.clone(),
                    compression: Default::default(),
                };
                let status = match self.channel.invoke(call).await {
                    Ok(_) => Status::internal("unexpected response from unknown method"),
                    Err(e) => e.into_status(),
                };
                Err(status).context(CallSnafu)
            }
        }
    }
}

/// Expands `<Service>/<Method>` to `/<package>.<Service>/<Method>`.
pub fn resolve_method_path(method: &str) -> String {
    if method.starts_with('/') {
        return method.to_string();
    }
    let path = format!("/{PACKAGE}.{method}");
    match split_full_method_name(&path) {
        Some(_) => path,
        None => format!("/{method}"),
    }
}

fn parse<Req: DeserializeOwned>(request: &str) -> Result<Req, NodeError> {
    let request = if request.trim().is_empty() {
        "{}"
    } else {
        request
    };
    serde_json::from_str(request).context(RequestJsonSnafu)
}

fn render<Resp: Serialize>(response: &Resp) -> Result<String, NodeError> {
    serde_json::to_string_pretty(response).context(ResponseJsonSnafu)
}

/// A node populated with a short chain of frames, a few peers and token
/// balances, for demos and manual testing.
pub fn demo_state() -> Result<NodeState, ApiError> {
    let state = NodeState::new(NodeIdentity {
        peer_id: Uuid::new_v4().as_bytes().to_vec(),
        multiaddrs: vec!["/ip4/127.0.0.1/udp/8336/quic".to_string()],
        version: vec![1, 4, 21],
        peer_score: 100,
    });
    let now = Utc::now().timestamp_millis();
    let filter = vec![0u8; 32];
    let mut parent_selector = Vec::new();
    for frame_number in 1..=16u64 {
        let output = Uuid::new_v4().as_bytes().to_vec();
        state.insert_frame(ClockFrame {
            filter: filter.clone(),
            frame_number,
            timestamp: now - (16 - frame_number as i64) * 10_000,
            difficulty: 100_000,
            input: frame_number.to_be_bytes().to_vec(),
            output: output.clone(),
            parent_selector: std::mem::replace(&mut parent_selector, output),
        })?;
    }
    for (index, cooperative) in [true, true, true, false].into_iter().enumerate() {
        state.upsert_peer(
            PeerInfo {
                peer_id: Uuid::new_v4().as_bytes().to_vec(),
                multiaddrs: vec![format!("/ip4/10.0.0.{}/udp/8336/quic", index + 2)],
                max_frame: 16 - index as u64,
                timestamp: now,
                version: vec![1, 4, 21],
                ..Default::default()
            },
            cooperative,
        )?;
    }
    state.set_token_balances(TokenBalances {
        confirmed_supply: 3_000_000_000_000,
        unconfirmed_supply: 3_000_000_500_000,
        owned: 1_250_000,
        unconfirmed_owned: vec![2_500, 7_500],
    })?;
    Ok(state)
}
