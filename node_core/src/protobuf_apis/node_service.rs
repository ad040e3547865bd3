use std::sync::Arc;

use async_trait::async_trait;
use node_rpc::{CallContext, Status};
use tracing::instrument;

use super::ToStatus;
use crate::apis::node::{NodeState, amount_bytes};
use crate::protobuf_gen::node::*;

/// Read-only `NodeService` backed by a [`NodeState`].
pub struct NodeServiceImpl {
    state: Arc<NodeState>,
    max_frames_per_request: usize,
}

impl NodeServiceImpl {
    pub fn new(state: Arc<NodeState>, max_frames_per_request: usize) -> Self {
        NodeServiceImpl {
            state,
            max_frames_per_request,
        }
    }
}

fn truncate(mut frame: ClockFrame) -> ClockFrame {
    frame.input.clear();
    frame.output.clear();
    frame
}

#[async_trait]
impl NodeService for NodeServiceImpl {
    #[instrument(name = "NodeService::get_frames", skip(self, _ctx, request))]
    async fn get_frames(
        &self,
        _ctx: CallContext,
        request: GetFramesRequest,
    ) -> Result<FramesResponse, Status> {
        let frames = self
            .state
            .frames(
                &request.filter,
                request.from_frame_number,
                request.to_frame_number,
                self.max_frames_per_request,
            )
            .to_status()?;

        let truncated_clock_frames = if request.include_candidates {
            frames
        } else {
            frames.into_iter().map(truncate).collect()
        };
        Ok(FramesResponse {
            truncated_clock_frames,
        })
    }

    #[instrument(name = "NodeService::get_frame_info", skip(self, _ctx, request))]
    async fn get_frame_info(
        &self,
        _ctx: CallContext,
        request: GetFrameInfoRequest,
    ) -> Result<FrameInfoResponse, Status> {
        let frame = self
            .state
            .frame(&request.filter, request.frame_number, &request.selector)
            .to_status()?;
        Ok(FrameInfoResponse {
            clock_frame: Some(frame),
        })
    }

    #[instrument(name = "NodeService::get_peer_info", skip(self, _ctx, _request))]
    async fn get_peer_info(
        &self,
        _ctx: CallContext,
        _request: GetPeerInfoRequest,
    ) -> Result<PeerInfoResponse, Status> {
        let (peer_info, uncooperative_peer_info) = self.state.peers().to_status()?;
        Ok(PeerInfoResponse {
            peer_info,
            uncooperative_peer_info,
        })
    }

    #[instrument(name = "NodeService::get_node_info", skip(self, _ctx, _request))]
    async fn get_node_info(
        &self,
        _ctx: CallContext,
        _request: GetNodeInfoRequest,
    ) -> Result<NodeInfoResponse, Status> {
        let identity = self.state.identity();
        Ok(NodeInfoResponse {
            peer_id: hex::encode(&identity.peer_id),
            max_frame: self.state.max_frame().to_status()?,
            peer_score: identity.peer_score,
            version: identity.version.clone(),
        })
    }

    #[instrument(name = "NodeService::get_network_info", skip(self, _ctx, _request))]
    async fn get_network_info(
        &self,
        _ctx: CallContext,
        _request: GetNetworkInfoRequest,
    ) -> Result<NetworkInfoResponse, Status> {
        Ok(NetworkInfoResponse {
            network_info: self.state.network_info().to_status()?,
        })
    }

    #[instrument(name = "NodeService::get_token_info", skip(self, _ctx, _request))]
    async fn get_token_info(
        &self,
        _ctx: CallContext,
        _request: GetTokenInfoRequest,
    ) -> Result<TokenInfoResponse, Status> {
        let balances = self.state.token_balances().to_status()?;
        Ok(TokenInfoResponse {
            confirmed_token_supply: amount_bytes(balances.confirmed_supply),
            unconfirmed_token_supply: amount_bytes(balances.unconfirmed_supply),
            owned_tokens: amount_bytes(balances.owned),
            unconfirmed_owned_tokens: balances
                .unconfirmed_owned
                .into_iter()
                .map(amount_bytes)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::node::{NodeIdentity, TokenBalances};
    use node_rpc::Code;

    fn service() -> NodeServiceImpl {
        let state = NodeState::new(NodeIdentity {
            peer_id: vec![0xab, 0xcd],
            version: vec![2, 0, 1],
            peer_score: 17,
            ..Default::default()
        });
        for frame_number in 1..=4 {
            state
                .insert_frame(ClockFrame {
                    filter: b"master".to_vec(),
                    frame_number,
                    input: vec![1; 8],
                    output: vec![2; 8],
                    ..Default::default()
                })
                .unwrap();
        }
        NodeServiceImpl::new(Arc::new(state), 3)
    }

    #[tokio::test]
    async fn test_get_frames_truncates_and_caps() {
        let response = service()
            .get_frames(
                CallContext::new(),
                GetFramesRequest {
                    filter: b"master".to_vec(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let frames = response.truncated_clock_frames;
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.input.is_empty() && f.output.is_empty()));
    }

    #[tokio::test]
    async fn test_get_frames_with_candidates_keeps_payloads() {
        let response = service()
            .get_frames(
                CallContext::new(),
                GetFramesRequest {
                    filter: b"master".to_vec(),
                    from_frame_number: 3,
                    include_candidates: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let frames = response.truncated_clock_frames;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].input, vec![1; 8]);
    }

    #[tokio::test]
    async fn test_get_frames_inverted_range_is_invalid() {
        let status = service()
            .get_frames(
                CallContext::new(),
                GetFramesRequest {
                    filter: b"master".to_vec(),
                    from_frame_number: 4,
                    to_frame_number: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_frame_info_miss_is_not_found() {
        let status = service()
            .get_frame_info(
                CallContext::new(),
                GetFrameInfoRequest {
                    filter: b"master".to_vec(),
                    frame_number: 99,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_get_node_info() {
        let response = service()
            .get_node_info(CallContext::new(), GetNodeInfoRequest {})
            .await
            .unwrap();
        assert_eq!(response.peer_id, "abcd");
        assert_eq!(response.max_frame, 4);
        assert_eq!(response.peer_score, 17);
        assert_eq!(response.version, vec![2, 0, 1]);
    }

    #[tokio::test]
    async fn test_get_token_info() {
        let service = service();
        service
            .state
            .set_token_balances(TokenBalances {
                confirmed_supply: 1_000,
                unconfirmed_supply: 1_010,
                owned: 5,
                unconfirmed_owned: vec![1, 2],
            })
            .unwrap();
        let response = service
            .get_token_info(CallContext::new(), GetTokenInfoRequest {})
            .await
            .unwrap();
        assert_eq!(response.owned_tokens, amount_bytes(5));
        assert_eq!(response.unconfirmed_owned_tokens.len(), 2);
        assert_eq!(response.confirmed_token_supply, amount_bytes(1_000));
    }
}
