//! MeshRouter — local peer, topology and routes wired up from config.

use std::sync::Arc;

use mesh_core::{MeshConfig, PeerName, SnapshotError, TopologySnapshot};

use crate::routes::Routes;
use crate::topology::{seed_from_snapshot, LocalPeer, Peers};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("identity {0:?} resolves to the reserved peer name 00:00:00:00:00:00")]
    ReservedPeerName(String),
}

pub struct MeshRouter {
    pub ourself: Arc<LocalPeer>,
    pub peers: Arc<Peers>,
    pub routes: Routes,
}

impl MeshRouter {
    /// Build the local peer from `identity`, seed the topology from the
    /// configured snapshot (if any), start the routes and queue a first
    /// recalculation. Must be called from within a Tokio runtime.
    pub fn from_config(config: &MeshConfig) -> Result<Self, RouterError> {
        let name = PeerName::from_user_input(&config.identity.peer_name);
        if name.is_unknown() {
            return Err(RouterError::ReservedPeerName(config.identity.peer_name.clone()));
        }
        let ourself = Arc::new(LocalPeer::new(name, config.nickname()));
        let peers = Arc::new(Peers::new(name));

        if let Some(path) = &config.topology.snapshot_path {
            let snapshot = TopologySnapshot::load(path)?;
            seed_from_snapshot(&snapshot, &ourself, &peers);
            tracing::info!(
                path = %path.display(),
                peers = peers.len(),
                neighbours = ourself.connections().len(),
                "topology snapshot loaded"
            );
        }

        let routes = Routes::with_config(ourself.clone(), peers.clone(), &config.router);
        routes.recalculate();

        tracing::info!(
            peer = %name,
            nickname = ourself.nickname(),
            action_queue_depth = config.router.action_queue_depth,
            barrier_queue_depth = config.router.barrier_queue_depth,
            "mesh router started"
        );

        Ok(Self {
            ourself,
            peers,
            routes,
        })
    }

    pub fn name(&self) -> PeerName {
        self.ourself.name()
    }

    /// Recalculate and wait for the new tables.
    pub async fn refresh(&self) {
        self.routes.recalculate();
        self.routes.ensure_recalculated().await;
    }
}
