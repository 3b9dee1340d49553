//! Topology snapshot file — a point-in-time picture of the mesh.
//!
//! Written as JSON:
//!
//! ```json
//! { "peers": [ { "name": "00:00:00:00:00:01", "nickname": "a", "version": 3,
//!                "connections": [ { "peer": "00:00:00:00:00:02", "established": true } ] } ] }
//! ```
//!
//! Each peer lists only the connections it reports itself. Symmetry is a
//! property derived later by the topology provider, never stored here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::peer_name::PeerName;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub peers: Vec<PeerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub name: PeerName,
    #[serde(default)]
    pub nickname: String,
    /// Gossip version of this peer's connection list.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub connections: Vec<ConnectionSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub peer: PeerName,
    /// Handshake complete on this side.
    #[serde(default)]
    pub established: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, serde_json::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(serde_json::Error),
    #[error("peer {0} listed more than once")]
    DuplicatePeer(PeerName),
}

impl TopologySnapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SnapshotError::ReadFailed(path.to_path_buf(), e))?;
        let snapshot: Self = serde_json::from_str(&text)
            .map_err(|e| SnapshotError::ParseFailed(path.to_path_buf(), e))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self).map_err(SnapshotError::SerializeFailed)?;
        std::fs::write(path, json).map_err(|e| SnapshotError::WriteFailed(path.to_path_buf(), e))
    }

    /// Reject snapshots naming the same peer twice. Connections to peers that
    /// are not listed are allowed; routing simply cannot traverse them.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = std::collections::HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.name) {
                return Err(SnapshotError::DuplicatePeer(peer.name));
            }
        }
        Ok(())
    }

    pub fn peer(&self, name: PeerName) -> Option<&PeerSnapshot> {
        self.peers.iter().find(|p| p.name == name)
    }
}
