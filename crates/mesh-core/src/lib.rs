//! mesh-core — shared types for the mesh routing core.
//! Peer identifiers, configuration and the topology snapshot format.
//! No async runtime lives here; mesh-routes depends on this crate.

pub mod config;
pub mod peer_name;
pub mod snapshot;

pub use config::{ConfigError, MeshConfig};
pub use peer_name::{PeerName, PeerNameError};
pub use snapshot::{ConnectionSnapshot, PeerSnapshot, SnapshotError, TopologySnapshot};
