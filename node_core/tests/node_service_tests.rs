pub mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{FILTER, setup_logging, state_with_frames};
use node_core::config::{ClientConfig, NodeConfig, ServerConfig};
use node_core::node::LocalNode;
use node_core::protobuf_gen::node::*;
use node_rpc::{CallContext, CallOptions, Code, Compression, LocalChannel, ServiceRegistry, Status};
use node_rpc::{Dispatcher, Server};

fn start(config: NodeConfig) -> LocalNode {
    LocalNode::start(config, Arc::new(state_with_frames(10))).unwrap()
}

#[tokio::test]
async fn test_round_trip_through_typed_client() {
    setup_logging();
    let node = start(NodeConfig::default());
    let client = node.node_service();
    let ctx = CallContext::new();

    let frames = client
        .get_frames(
            &ctx,
            GetFramesRequest {
                filter: FILTER.to_vec(),
                from_frame_number: 3,
                to_frame_number: 6,
                include_candidates: false,
            },
            CallOptions::new(),
        )
        .await
        .unwrap();
    let numbers: Vec<u64> = frames
        .truncated_clock_frames
        .iter()
        .map(|frame| frame.frame_number)
        .collect();
    assert_eq!(numbers, vec![3, 4, 5]);
    assert!(frames
        .truncated_clock_frames
        .iter()
        .all(|frame| frame.input.is_empty() && frame.output.is_empty()));

    let info = client
        .get_node_info(&ctx, GetNodeInfoRequest {}, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(info.peer_id, "0a0b");
    assert_eq!(info.max_frame, 10);
    assert_eq!(info.peer_score, 42);
}

#[tokio::test]
async fn test_frame_info_miss_is_not_found() {
    let node = start(NodeConfig::default());
    let status = node
        .node_service()
        .get_frame_info(
            &CallContext::new(),
            GetFrameInfoRequest {
                filter: FILTER.to_vec(),
                frame_number: 11,
                ..Default::default()
            },
            CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn test_frame_info_hit_keeps_payloads() {
    let node = start(NodeConfig::default());
    let response = node
        .node_service()
        .get_frame_info(
            &CallContext::new(),
            GetFrameInfoRequest {
                filter: FILTER.to_vec(),
                frame_number: 4,
                selector: vec![3],
            },
            CallOptions::new(),
        )
        .await
        .unwrap();
    let frame = response.clock_frame.unwrap();
    assert_eq!(frame.frame_number, 4);
    assert_eq!(frame.input, vec![4; 4]);
}

#[tokio::test]
async fn test_gzip_calls_round_trip() {
    let node = start(NodeConfig {
        client: ClientConfig {
            compression: Compression::Gzip,
            ..Default::default()
        },
        ..Default::default()
    });
    let frames = node
        .node_service()
        .get_frames(
            &CallContext::new(),
            GetFramesRequest {
                filter: FILTER.to_vec(),
                include_candidates: true,
                ..Default::default()
            },
            CallOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(frames.truncated_clock_frames.len(), 10);
    assert_eq!(frames.truncated_clock_frames[9].output, vec![0xee; 4]);
}

#[tokio::test]
async fn test_bearer_token_is_required_when_configured() {
    let node = start(NodeConfig {
        server: ServerConfig {
            auth_token: Some("s3cret".to_string()),
            ..Default::default()
        },
        ..Default::default()
    });
    let client = node.node_service();
    let ctx = CallContext::new();

    let status = client
        .get_peer_info(&ctx, GetPeerInfoRequest {}, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    let status = client
        .get_peer_info(&ctx, GetPeerInfoRequest {}, CallOptions::new().credentials("guess"))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    client
        .get_peer_info(&ctx, GetPeerInfoRequest {}, CallOptions::new().credentials("s3cret"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_client_defaults_carry_credentials() {
    let node = start(NodeConfig {
        server: ServerConfig {
            auth_token: Some("s3cret".to_string()),
            ..Default::default()
        },
        client: ClientConfig {
            auth_token: Some("s3cret".to_string()),
            ..Default::default()
        },
    });
    let response = node
        .node_service()
        .get_token_info(&CallContext::new(), GetTokenInfoRequest {}, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(response.confirmed_token_supply.len(), 32);
}

/// Answers `GetNodeInfo` only after a long pause.
struct SlowNode;

#[async_trait]
impl NodeService for SlowNode {
    async fn get_frames(
        &self,
        ctx: CallContext,
        request: GetFramesRequest,
    ) -> Result<FramesResponse, Status> {
        UnimplementedNodeService.get_frames(ctx, request).await
    }

    async fn get_frame_info(
        &self,
        ctx: CallContext,
        request: GetFrameInfoRequest,
    ) -> Result<FrameInfoResponse, Status> {
        UnimplementedNodeService.get_frame_info(ctx, request).await
    }

    async fn get_peer_info(
        &self,
        ctx: CallContext,
        request: GetPeerInfoRequest,
    ) -> Result<PeerInfoResponse, Status> {
        UnimplementedNodeService.get_peer_info(ctx, request).await
    }

    async fn get_node_info(
        &self,
        _ctx: CallContext,
        _request: GetNodeInfoRequest,
    ) -> Result<NodeInfoResponse, Status> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(NodeInfoResponse::default())
    }

    async fn get_network_info(
        &self,
        ctx: CallContext,
        request: GetNetworkInfoRequest,
    ) -> Result<NetworkInfoResponse, Status> {
        UnimplementedNodeService.get_network_info(ctx, request).await
    }

    async fn get_token_info(
        &self,
        ctx: CallContext,
        request: GetTokenInfoRequest,
    ) -> Result<TokenInfoResponse, Status> {
        UnimplementedNodeService.get_token_info(ctx, request).await
    }
}

fn slow_client() -> NodeServiceClient<LocalChannel> {
    let mut registry = ServiceRegistry::new();
    registry.register(&NODE_SERVICE, Arc::new(SlowNode)).unwrap();
    let server = Server::new(Arc::new(Dispatcher::new(registry)));
    NodeServiceClient::new(LocalChannel::new(Arc::new(server)))
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_is_deadline_exceeded() {
    let status = slow_client()
        .get_node_info(
            &CallContext::new(),
            GetNodeInfoRequest {},
            CallOptions::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

#[tokio::test(start_paused = true)]
async fn test_context_deadline_bounds_the_call() {
    let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
    let status = slow_client()
        .get_node_info(&ctx, GetNodeInfoRequest {}, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn test_fallback_methods_answer_unimplemented_over_the_wire() {
    let status = slow_client()
        .get_network_info(&CallContext::new(), GetNetworkInfoRequest {}, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
    assert_eq!(status.message(), "method GetNetworkInfo not implemented");
}
