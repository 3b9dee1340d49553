//! Routes — unicast and broadcast next hops for the local peer.
//!
//! Reads go straight to the tables under a shared lock. The only exception
//! is a broadcast lookup for an origin not yet cached, which makes one round
//! trip through the route serializer to compute and cache the answer.

use std::collections::BTreeSet;
use std::sync::Arc;

use mesh_core::config::RouterConfig;
use mesh_core::PeerName;
use tokio::sync::oneshot;

use crate::engine::{Engine, RouteStats};
use crate::lock::{read, write};
use crate::sampler;
use crate::serializer::{self, Requests};
use crate::status::RouteStatus;
use crate::topology::{ConnectionFilter, LocalPeer, Peers};

/// Handle to the local peer's routes. Cheap to clone; all clones share the
/// same tables and serializer.
#[derive(Clone)]
pub struct Routes {
    engine: Arc<Engine>,
    requests: Requests,
}

impl Routes {
    /// Build routes for `ourself` over `peers` and start the serializer.
    /// Must be called from within a Tokio runtime.
    ///
    /// Tables start with only the local peer's own entries; call
    /// `recalculate` once the topology is populated.
    pub fn new(ourself: Arc<LocalPeer>, peers: Arc<Peers>) -> Self {
        Self::with_config(ourself, peers, &RouterConfig::default())
    }

    pub fn with_config(ourself: Arc<LocalPeer>, peers: Arc<Peers>, config: &RouterConfig) -> Self {
        let engine = Arc::new(Engine::new(ourself, peers));
        let requests = serializer::spawn(engine.clone(), config);
        Self { engine, requests }
    }

    pub fn local_name(&self) -> PeerName {
        self.engine.ourself.name()
    }

    /// Register a callback run after every full recalculation, in
    /// registration order. Not run for lazy broadcast fills.
    ///
    /// Callbacks run on the serializer task with no locks held. They may read
    /// routes and call `recalculate`, but must not block on the serializer.
    pub fn on_change(&self, callback: impl Fn() + Send + Sync + 'static) {
        write(&self.engine.tables).on_change.push(Arc::new(callback));
    }

    /// Peers known to the topology, the local peer included.
    pub fn peer_names(&self) -> BTreeSet<PeerName> {
        self.engine.peers.names()
    }

    /// Next hop towards `name` over established, symmetric connections.
    /// `Some(PeerName::UNKNOWN)` for ourselves, None if unreachable.
    pub fn unicast(&self, name: PeerName) -> Option<PeerName> {
        self.lookup_unicast(name, ConnectionFilter::EstablishedAndSymmetric)
    }

    /// Next hop towards `name` over all connections.
    pub fn unicast_all(&self, name: PeerName) -> Option<PeerName> {
        self.lookup_unicast(name, ConnectionFilter::All)
    }

    fn lookup_unicast(&self, name: PeerName, filter: ConnectionFilter) -> Option<PeerName> {
        read(&self.engine.tables).unicast(filter).get(&name).copied()
    }

    /// Neighbours to forward a broadcast from `origin` to, over established,
    /// symmetric connections. Empty for unknown origins.
    pub async fn broadcast(&self, origin: PeerName) -> Vec<PeerName> {
        self.lookup_or_calculate(origin, ConnectionFilter::EstablishedAndSymmetric)
            .await
    }

    /// Neighbours to forward a broadcast from `origin` to, over all
    /// connections.
    pub async fn broadcast_all(&self, origin: PeerName) -> Vec<PeerName> {
        self.lookup_or_calculate(origin, ConnectionFilter::All).await
    }

    fn cached_broadcast(&self, origin: PeerName, filter: ConnectionFilter) -> Option<Vec<PeerName>> {
        read(&self.engine.tables)
            .broadcast(filter)
            .get(&origin)
            .cloned()
    }

    async fn lookup_or_calculate(&self, origin: PeerName, filter: ConnectionFilter) -> Vec<PeerName> {
        if let Some(hops) = self.cached_broadcast(origin, filter) {
            return hops;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let fill = Box::new(move |engine: &Engine| {
            let _ = reply_tx.send(engine.fill_broadcast(origin, filter));
        });
        if !self.requests.submit(fill).await {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Pick neighbours for gossip fan-out, weighted towards neighbours that
    /// reach more of the network. See the sampler module for the rules.
    /// The result is random; identical calls may differ.
    pub fn random_neighbours(&self, except: PeerName) -> Vec<PeerName> {
        let tables = read(&self.engine.tables);
        let picked = sampler::random_neighbours(&tables.unicast_all, except, &mut rand::thread_rng());
        tracing::trace!(except = %except, picked = picked.len(), "random neighbours");
        picked
    }

    /// Request a full recalculation. Asynchronous and coalesced; follow with
    /// `ensure_recalculated` to wait for it.
    pub fn recalculate(&self) {
        self.requests.recalculate();
    }

    /// Wait for every preceding `recalculate` request to be applied and its
    /// change callbacks to have run.
    pub async fn ensure_recalculated(&self) {
        self.requests.barrier().await;
    }

    pub fn stats(&self) -> RouteStats {
        self.engine.stats()
    }

    /// Snapshot of the established-and-symmetric tables.
    pub fn status(&self) -> RouteStatus {
        let tables = read(&self.engine.tables);
        RouteStatus::from_tables(&tables.unicast, &tables.broadcast)
    }
}
