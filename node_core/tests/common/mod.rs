#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use node_core::apis::node::{NodeIdentity, NodeState};
use node_core::protobuf_gen::node::*;
use async_trait::async_trait;
use node_rpc::{CallContext, Status};

pub const FILTER: &[u8] = b"master-filter";

/// Test-writer subscriber filtered by `RUST_LOG`, INFO by default.
pub fn setup_logging() {
    use tracing::Level;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

/// Node state holding frames 1..=`frames` of [`FILTER`].
pub fn state_with_frames(frames: u64) -> NodeState {
    let state = NodeState::new(NodeIdentity {
        peer_id: vec![0x0a, 0x0b],
        multiaddrs: vec!["/ip4/127.0.0.1/udp/8336/quic".to_string()],
        version: vec![1, 4, 21],
        peer_score: 42,
    });
    for frame_number in 1..=frames {
        state
            .insert_frame(ClockFrame {
                filter: FILTER.to_vec(),
                frame_number,
                timestamp: 1_700_000_000_000 + frame_number as i64,
                difficulty: 50_000,
                input: vec![frame_number as u8; 4],
                output: vec![0xee; 4],
                parent_selector: vec![frame_number as u8 - 1],
            })
            .unwrap();
    }
    state
}

/// `NodeStats` handler that only implements `PutNodeInfo` and counts calls.
#[derive(Default)]
pub struct PartialStats {
    pub put_node_info_calls: AtomicUsize,
    fallback: UnimplementedNodeStats,
}

impl PartialStats {
    pub fn calls(&self) -> usize {
        self.put_node_info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeStats for PartialStats {
    async fn put_node_info(
        &self,
        _ctx: CallContext,
        _request: PutNodeInfoRequest,
    ) -> Result<PutResponse, Status> {
        self.put_node_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PutResponse {})
    }

    async fn put_peer_info(
        &self,
        ctx: CallContext,
        request: PutPeerInfoRequest,
    ) -> Result<PutResponse, Status> {
        self.fallback.put_peer_info(ctx, request).await
    }
}
