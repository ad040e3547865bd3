use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use snafu::ensure;

use super::error::*;
use crate::protobuf_gen::node::{ClockFrame, NetworkInfo, PeerInfo, PutNodeInfoRequest};

/// Identity the node reports about itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeIdentity {
    pub peer_id: Vec<u8>,
    pub multiaddrs: Vec<String>,
    pub version: Vec<u8>,
    pub peer_score: u64,
}

/// Token amounts in the smallest unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenBalances {
    pub confirmed_supply: u128,
    pub unconfirmed_supply: u128,
    pub owned: u128,
    pub unconfirmed_owned: Vec<u128>,
}

/// Last statistics a peer reported through `PutNodeInfo`.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeReport {
    pub multiaddrs: Vec<String>,
    pub max_frame: u64,
    pub timestamp: i64,
    pub version: Vec<u8>,
    pub peer_score: f64,
}

#[derive(Default)]
struct PeerTable {
    cooperative: BTreeMap<Vec<u8>, PeerInfo>,
    uncooperative: BTreeMap<Vec<u8>, PeerInfo>,
}

/// In-memory view of the node: clock frames, known peers, peer reports and
/// token balances.
///
/// Every accessor takes the lock it needs and releases it before returning, so
/// a `NodeState` can be shared between handlers behind an `Arc`.
pub struct NodeState {
    identity: NodeIdentity,
    frames: RwLock<BTreeMap<Vec<u8>, BTreeMap<u64, ClockFrame>>>,
    peers: RwLock<PeerTable>,
    reports: RwLock<HashMap<Vec<u8>, NodeReport>>,
    tokens: RwLock<TokenBalances>,
}

impl NodeState {
    pub fn new(identity: NodeIdentity) -> Self {
        NodeState {
            identity,
            frames: RwLock::new(BTreeMap::new()),
            peers: RwLock::new(PeerTable::default()),
            reports: RwLock::new(HashMap::new()),
            tokens: RwLock::new(TokenBalances::default()),
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Stores `frame`, replacing a frame with the same filter and number.
    pub fn insert_frame(&self, frame: ClockFrame) -> Result<(), ApiError> {
        let mut frames = self.frames.write().map_err(|_| StateLockingSnafu {}.build())?;
        frames
            .entry(frame.filter.clone())
            .or_default()
            .insert(frame.frame_number, frame);
        Ok(())
    }

    /// Frames of `filter` with `from <= frame_number < to`, ascending. `to == 0`
    /// leaves the range open. At most `limit` frames are returned.
    pub fn frames(
        &self,
        filter: &[u8],
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<ClockFrame>, ApiError> {
        ensure!(to == 0 || from <= to, InvalidFrameRangeSnafu { from, to });
        let frames = self.frames.read().map_err(|_| StateLockingSnafu {}.build())?;
        let Some(by_number) = frames.get(filter) else {
            return Ok(Vec::new());
        };
        let selected = if to == 0 {
            by_number.range(from..)
        } else {
            by_number.range(from..to)
        };
        Ok(selected.take(limit).map(|(_, frame)| frame.clone()).collect())
    }

    /// Exact lookup. A non-empty `selector` must equal the frame's parent
    /// selector.
    pub fn frame(
        &self,
        filter: &[u8],
        frame_number: u64,
        selector: &[u8],
    ) -> Result<ClockFrame, ApiError> {
        let frames = self.frames.read().map_err(|_| StateLockingSnafu {}.build())?;
        let frame = frames
            .get(filter)
            .and_then(|by_number| by_number.get(&frame_number))
            .ok_or_else(|| {
                FrameNotFoundSnafu {
                    filter: hex::encode(filter),
                    frame_number,
                }
                .build()
            })?;
        ensure!(
            selector.is_empty() || frame.parent_selector == selector,
            SelectorMismatchSnafu {
                filter: hex::encode(filter),
                frame_number,
            }
        );
        Ok(frame.clone())
    }

    /// Highest frame number held for any filter.
    pub fn max_frame(&self) -> Result<u64, ApiError> {
        let frames = self.frames.read().map_err(|_| StateLockingSnafu {}.build())?;
        Ok(frames
            .values()
            .filter_map(|by_number| by_number.keys().next_back().copied())
            .max()
            .unwrap_or(0))
    }

    /// Adds or replaces a peer. A peer lives in exactly one of the two lists.
    pub fn upsert_peer(&self, peer: PeerInfo, cooperative: bool) -> Result<(), ApiError> {
        ensure!(
            !peer.peer_id.is_empty(),
            InvalidArgumentSnafu {
                argument: "peer id is required".to_string(),
            }
        );
        let mut guard = self.peers.write().map_err(|_| StateLockingSnafu {}.build())?;
        let peers = &mut *guard;
        let (target, other) = if cooperative {
            (&mut peers.cooperative, &mut peers.uncooperative)
        } else {
            (&mut peers.uncooperative, &mut peers.cooperative)
        };
        other.remove(&peer.peer_id);
        target.insert(peer.peer_id.clone(), peer);
        Ok(())
    }

    /// Cooperative and uncooperative peers, ordered by peer id.
    pub fn peers(&self) -> Result<(Vec<PeerInfo>, Vec<PeerInfo>), ApiError> {
        let peers = self.peers.read().map_err(|_| StateLockingSnafu {}.build())?;
        Ok((
            peers.cooperative.values().cloned().collect(),
            peers.uncooperative.values().cloned().collect(),
        ))
    }

    pub fn record_report(&self, report: PutNodeInfoRequest) -> Result<(), ApiError> {
        ensure!(
            !report.peer_id.is_empty(),
            InvalidArgumentSnafu {
                argument: "peer id is required".to_string(),
            }
        );
        let mut reports = self.reports.write().map_err(|_| StateLockingSnafu {}.build())?;
        reports.insert(
            report.peer_id,
            NodeReport {
                multiaddrs: report.multiaddrs,
                max_frame: report.max_frame,
                timestamp: report.timestamp,
                version: report.version,
                peer_score: report.peer_score,
            },
        );
        Ok(())
    }

    pub fn report(&self, peer_id: &[u8]) -> Result<Option<NodeReport>, ApiError> {
        let reports = self.reports.read().map_err(|_| StateLockingSnafu {}.build())?;
        Ok(reports.get(peer_id).cloned())
    }

    /// Cooperative peers with the score from their latest report, or zero.
    pub fn network_info(&self) -> Result<Vec<NetworkInfo>, ApiError> {
        let (cooperative, _) = self.peers()?;
        let reports = self.reports.read().map_err(|_| StateLockingSnafu {}.build())?;
        Ok(cooperative
            .into_iter()
            .map(|peer| {
                let report = reports.get(&peer.peer_id);
                let multiaddrs = match report {
                    Some(report) if peer.multiaddrs.is_empty() => report.multiaddrs.clone(),
                    _ => peer.multiaddrs,
                };
                NetworkInfo {
                    peer_score: report.map(|r| r.peer_score).unwrap_or_default(),
                    peer_id: peer.peer_id,
                    multiaddrs,
                }
            })
            .collect())
    }

    pub fn set_token_balances(&self, balances: TokenBalances) -> Result<(), ApiError> {
        let mut tokens = self.tokens.write().map_err(|_| StateLockingSnafu {}.build())?;
        *tokens = balances;
        Ok(())
    }

    pub fn token_balances(&self) -> Result<TokenBalances, ApiError> {
        let tokens = self.tokens.read().map_err(|_| StateLockingSnafu {}.build())?;
        Ok(tokens.clone())
    }
}

/// Big-endian encoding of a token amount, left-padded to 32 bytes.
pub fn amount_bytes(amount: u128) -> Vec<u8> {
    let mut bytes = vec![0u8; 16];
    bytes.extend_from_slice(&amount.to_be_bytes());
    bytes
}
