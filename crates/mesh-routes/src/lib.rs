//! mesh-routes — the routing core of the mesh overlay.
//!
//! Answers two questions for the local peer, continuously, as the topology
//! changes underneath it:
//!   - unicast:   to reach peer X, which neighbour is the next hop?
//!   - broadcast: for a frame that originated at X, which neighbours do we
//!                forward it to?
//!
//! All table writes go through one serializer task; reads are lock-protected
//! and never wait on it, except for the first broadcast lookup per origin.

mod engine;
mod lock;
mod sampler;
mod serializer;

pub mod router;
pub mod routes;
pub mod status;
pub mod topology;

pub use engine::RouteStats;
pub use router::{MeshRouter, RouterError};
pub use routes::Routes;
pub use status::{BroadcastRouteStatus, RouteStatus, UnicastRouteStatus};
pub use topology::{
    seed_from_snapshot, ConnectionFilter, Connections, LocalPeer, Link, NextHops, PeerRecord,
    Peers, TopologyView,
};
