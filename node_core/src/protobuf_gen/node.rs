//! Messages and services of the `quilibrium.node.node.pb` package.

use serde::{Deserialize, Serialize};

use super::serde_helpers::{base64_bytes, base64_bytes_list};

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFramesRequest {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub filter: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub from_frame_number: u64,
    /// Exclusive upper bound. Zero leaves the range open.
    #[prost(uint64, tag = "3")]
    pub to_frame_number: u64,
    #[prost(bool, tag = "4")]
    pub include_candidates: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct GetFrameInfoRequest {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub filter: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub frame_number: u64,
    /// When set, the frame must also carry this parent selector.
    #[prost(bytes = "vec", tag = "3")]
    #[serde(with = "base64_bytes")]
    pub selector: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct GetPeerInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct GetNodeInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct GetNetworkInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct GetTokenInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockFrame {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub filter: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub frame_number: u64,
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    #[prost(uint32, tag = "4")]
    pub difficulty: u32,
    #[prost(bytes = "vec", tag = "5")]
    #[serde(with = "base64_bytes")]
    pub input: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    #[serde(with = "base64_bytes")]
    pub output: Vec<u8>,
    #[prost(bytes = "vec", tag = "7")]
    #[serde(with = "base64_bytes")]
    pub parent_selector: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesResponse {
    #[prost(message, repeated, tag = "1")]
    pub truncated_clock_frames: Vec<ClockFrame>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameInfoResponse {
    #[prost(message, optional, tag = "1")]
    pub clock_frame: Option<ClockFrame>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerInfo {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub peer_id: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub multiaddrs: Vec<String>,
    #[prost(uint64, tag = "3")]
    pub max_frame: u64,
    #[prost(int64, tag = "4")]
    pub timestamp: i64,
    #[prost(bytes = "vec", tag = "5")]
    #[serde(with = "base64_bytes")]
    pub version: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    #[prost(bytes = "vec", tag = "7")]
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerInfoResponse {
    #[prost(message, repeated, tag = "1")]
    pub peer_info: Vec<PeerInfo>,
    #[prost(message, repeated, tag = "2")]
    pub uncooperative_peer_info: Vec<PeerInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfoResponse {
    #[prost(string, tag = "1")]
    pub peer_id: String,
    #[prost(uint64, tag = "2")]
    pub max_frame: u64,
    #[prost(uint64, tag = "3")]
    pub peer_score: u64,
    #[prost(bytes = "vec", tag = "4")]
    #[serde(with = "base64_bytes")]
    pub version: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub peer_id: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub multiaddrs: Vec<String>,
    #[prost(double, tag = "3")]
    pub peer_score: f64,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInfoResponse {
    #[prost(message, repeated, tag = "1")]
    pub network_info: Vec<NetworkInfo>,
}

/// Token amounts are big-endian unsigned integers.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenInfoResponse {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub confirmed_token_supply: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "base64_bytes")]
    pub unconfirmed_token_supply: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    #[serde(with = "base64_bytes")]
    pub owned_tokens: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    #[serde(with = "base64_bytes_list")]
    pub unconfirmed_owned_tokens: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PutNodeInfoRequest {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "base64_bytes")]
    pub peer_id: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub multiaddrs: Vec<String>,
    #[prost(uint64, tag = "3")]
    pub max_frame: u64,
    #[prost(int64, tag = "4")]
    pub timestamp: i64,
    #[prost(bytes = "vec", tag = "5")]
    #[serde(with = "base64_bytes")]
    pub version: Vec<u8>,
    #[prost(double, tag = "6")]
    pub peer_score: f64,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PutPeerInfoRequest {
    #[prost(message, repeated, tag = "1")]
    pub peer_info: Vec<PeerInfo>,
    #[prost(message, repeated, tag = "2")]
    pub uncooperative_peer_info: Vec<PeerInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct PutResponse {}

node_rpc::unary_service! {
    /// Read-only queries against a node.
    pub service NodeService = "quilibrium.node.node.pb.NodeService" {
        descriptor: NODE_SERVICE;
        fallback: UnimplementedNodeService;
        client: NodeServiceClient;
        methods: node_service_methods;

        rpc GetFrames(GetFramesRequest) -> FramesResponse as get_frames, const GET_FRAMES;
        rpc GetFrameInfo(GetFrameInfoRequest) -> FrameInfoResponse as get_frame_info, const GET_FRAME_INFO;
        rpc GetPeerInfo(GetPeerInfoRequest) -> PeerInfoResponse as get_peer_info, const GET_PEER_INFO;
        rpc GetNodeInfo(GetNodeInfoRequest) -> NodeInfoResponse as get_node_info, const GET_NODE_INFO;
        rpc GetNetworkInfo(GetNetworkInfoRequest) -> NetworkInfoResponse as get_network_info, const GET_NETWORK_INFO;
        rpc GetTokenInfo(GetTokenInfoRequest) -> TokenInfoResponse as get_token_info, const GET_TOKEN_INFO;
    }
}

node_rpc::unary_service! {
    /// Statistics reported by peers.
    pub service NodeStats = "quilibrium.node.node.pb.NodeStats" {
        descriptor: NODE_STATS;
        fallback: UnimplementedNodeStats;
        client: NodeStatsClient;
        methods: node_stats_methods;

        rpc PutNodeInfo(PutNodeInfoRequest) -> PutResponse as put_node_info, const PUT_NODE_INFO;
        rpc PutPeerInfo(PutPeerInfoRequest) -> PutResponse as put_peer_info, const PUT_PEER_INFO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_method_names() {
        assert_eq!(
            node_service_methods::GET_FRAMES,
            "/quilibrium.node.node.pb.NodeService/GetFrames"
        );
        assert_eq!(
            node_service_methods::GET_TOKEN_INFO,
            "/quilibrium.node.node.pb.NodeService/GetTokenInfo"
        );
        assert_eq!(
            node_stats_methods::PUT_PEER_INFO,
            "/quilibrium.node.node.pb.NodeStats/PutPeerInfo"
        );
    }

    #[test]
    fn test_service_method_lists() {
        let names: Vec<_> = NODE_SERVICE.methods().iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec![
                "GetFrames",
                "GetFrameInfo",
                "GetPeerInfo",
                "GetNodeInfo",
                "GetNetworkInfo",
                "GetTokenInfo"
            ]
        );
        let names: Vec<_> = NODE_STATS.methods().iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["PutNodeInfo", "PutPeerInfo"]);
    }

    #[test]
    fn test_request_from_partial_json() {
        let request: GetFramesRequest =
            serde_json::from_str(r#"{"filter":"AQI=","from_frame_number":3}"#).unwrap();
        assert_eq!(request.filter, vec![1, 2]);
        assert_eq!(request.from_frame_number, 3);
        assert_eq!(request.to_frame_number, 0);
        assert!(!request.include_candidates);
    }
}
