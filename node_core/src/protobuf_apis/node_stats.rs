use std::sync::Arc;

use async_trait::async_trait;
use node_rpc::client::IDEMPOTENCY_KEY_HEADER;
use node_rpc::{CallContext, Status};
use snafu::ensure;
use tracing::instrument;

use super::ToStatus;
use crate::apis::node::error::InvalidArgumentSnafu;
use crate::apis::node::{ApiError, IdempotencyCache, NodeState};
use crate::protobuf_gen::node::*;

/// `NodeStats` handler: records what peers report about themselves and
/// about the peers they know.
pub struct StatsCollector {
    state: Arc<NodeState>,
    idempotency: IdempotencyCache,
}

impl StatsCollector {
    pub fn new(state: Arc<NodeState>, idempotency_cache_size: usize) -> Self {
        StatsCollector {
            state,
            idempotency: IdempotencyCache::new(idempotency_cache_size),
        }
    }

    fn apply_peer_info(&self, request: PutPeerInfoRequest) -> Result<(), ApiError> {
        let all_identified = request
            .peer_info
            .iter()
            .chain(&request.uncooperative_peer_info)
            .all(|peer| !peer.peer_id.is_empty());
        ensure!(
            all_identified,
            InvalidArgumentSnafu {
                argument: "every peer needs a peer id".to_string(),
            }
        );

        for peer in request.peer_info {
            self.state.upsert_peer(peer, true)?;
        }
        for peer in request.uncooperative_peer_info {
            self.state.upsert_peer(peer, false)?;
        }
        Ok(())
    }
}

#[async_trait]
impl NodeStats for StatsCollector {
    #[instrument(name = "NodeStats::put_node_info", skip(self, ctx, request))]
    async fn put_node_info(
        &self,
        ctx: CallContext,
        request: PutNodeInfoRequest,
    ) -> Result<PutResponse, Status> {
        let key = ctx.metadata().get(IDEMPOTENCY_KEY_HEADER);
        self.idempotency
            .run_once("PutNodeInfo", key, || self.state.record_report(request))
            .to_status()?;
        Ok(PutResponse {})
    }

    #[instrument(name = "NodeStats::put_peer_info", skip(self, ctx, request))]
    async fn put_peer_info(
        &self,
        ctx: CallContext,
        request: PutPeerInfoRequest,
    ) -> Result<PutResponse, Status> {
        let key = ctx.metadata().get(IDEMPOTENCY_KEY_HEADER);
        self.idempotency
            .run_once("PutPeerInfo", key, || self.apply_peer_info(request))
            .to_status()?;
        Ok(PutResponse {})
    }
}
