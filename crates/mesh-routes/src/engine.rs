//! Route tables and the calculations that fill them.
//!
//! Everything here that writes the tables runs on the route serializer task.
//! Readers only ever take the tables' read lock.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use mesh_core::PeerName;

use crate::lock::{read, write};
use crate::topology::{ConnectionFilter, LocalPeer, NextHops, Peers, TopologyView};

/// Origin peer → neighbours a broadcast from that origin is forwarded to.
pub(crate) type BroadcastRoutes = HashMap<PeerName, Vec<PeerName>>;

pub(crate) type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// The four route tables plus the change callbacks, all under one lock.
pub(crate) struct Tables {
    pub(crate) unicast: NextHops,
    /// Same as `unicast`, over all connections rather than only established
    /// and symmetric ones.
    pub(crate) unicast_all: NextHops,
    pub(crate) broadcast: BroadcastRoutes,
    pub(crate) broadcast_all: BroadcastRoutes,
    pub(crate) on_change: Vec<ChangeCallback>,
}

impl Tables {
    /// Tables holding only the local peer's own entries.
    fn seeded(local: PeerName) -> Self {
        let unicast = NextHops::from([(local, PeerName::UNKNOWN)]);
        let broadcast = BroadcastRoutes::from([(local, Vec::new())]);
        Self {
            unicast: unicast.clone(),
            unicast_all: unicast,
            broadcast: broadcast.clone(),
            broadcast_all: broadcast,
            on_change: Vec::new(),
        }
    }

    pub(crate) fn unicast(&self, filter: ConnectionFilter) -> &NextHops {
        match filter {
            ConnectionFilter::EstablishedAndSymmetric => &self.unicast,
            ConnectionFilter::All => &self.unicast_all,
        }
    }

    pub(crate) fn broadcast(&self, filter: ConnectionFilter) -> &BroadcastRoutes {
        match filter {
            ConnectionFilter::EstablishedAndSymmetric => &self.broadcast,
            ConnectionFilter::All => &self.broadcast_all,
        }
    }

    fn broadcast_mut(&mut self, filter: ConnectionFilter) -> &mut BroadcastRoutes {
        match filter {
            ConnectionFilter::EstablishedAndSymmetric => &mut self.broadcast,
            ConnectionFilter::All => &mut self.broadcast_all,
        }
    }
}

/// Counters for observing the engine from outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Full recalculations completed.
    pub recalculations: u64,
    /// Broadcast entries computed on demand after a cache miss.
    pub broadcast_fills: u64,
}

pub(crate) struct Engine {
    pub(crate) ourself: Arc<LocalPeer>,
    pub(crate) peers: Arc<Peers>,
    pub(crate) tables: RwLock<Tables>,
    recalculations: AtomicU64,
    broadcast_fills: AtomicU64,
}

impl Engine {
    pub(crate) fn new(ourself: Arc<LocalPeer>, peers: Arc<Peers>) -> Self {
        let tables = Tables::seeded(ourself.name());
        Self {
            ourself,
            peers,
            tables: RwLock::new(tables),
            recalculations: AtomicU64::new(0),
            broadcast_fills: AtomicU64::new(0),
        }
    }

    pub(crate) fn stats(&self) -> RouteStats {
        RouteStats {
            recalculations: self.recalculations.load(Ordering::Relaxed),
            broadcast_fills: self.broadcast_fills.load(Ordering::Relaxed),
        }
    }

    /// Rebuild every table from the current topology, then run the change
    /// callbacks.
    ///
    /// Broadcast tables come back holding only the local peer's entries;
    /// other origins are refilled lazily.
    pub(crate) fn calculate(&self) {
        let started = Instant::now();

        let (unicast, unicast_all, broadcast, broadcast_all) = {
            let view = TopologyView::lock(&self.peers, &self.ourself);
            let local = view.local();
            (
                calculate_unicast(&view, ConnectionFilter::EstablishedAndSymmetric),
                calculate_unicast(&view, ConnectionFilter::All),
                BroadcastRoutes::from([(
                    local,
                    calculate_broadcast(&view, local, ConnectionFilter::EstablishedAndSymmetric),
                )]),
                BroadcastRoutes::from([(
                    local,
                    calculate_broadcast(&view, local, ConnectionFilter::All),
                )]),
            )
        };

        let (reachable, reachable_all) = (unicast.len(), unicast_all.len());
        let callbacks = {
            let mut tables = write(&self.tables);
            tables.unicast = unicast;
            tables.unicast_all = unicast_all;
            tables.broadcast = broadcast;
            tables.broadcast_all = broadcast_all;
            tables.on_change.clone()
        };
        let generation = self.recalculations.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::debug!(
            generation,
            reachable,
            reachable_all,
            callbacks = callbacks.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "routes recalculated"
        );

        // Outside the lock: callbacks may read routes or ask for another
        // recalculation. A panicking callback must not take the serializer
        // down with it.
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
                tracing::error!(
                    generation,
                    callback = index,
                    panic = panic_message(payload.as_ref()),
                    "route change callback panicked"
                );
            }
        }
    }

    /// Return the cached broadcast entry for `origin`, computing and caching
    /// it first if absent. Must run on the serializer so a fill can never
    /// interleave with a full recalculation.
    pub(crate) fn fill_broadcast(&self, origin: PeerName, filter: ConnectionFilter) -> Vec<PeerName> {
        if let Some(hops) = read(&self.tables).broadcast(filter).get(&origin) {
            // Filled by an earlier request queued behind the same miss.
            return hops.clone();
        }

        let hops = {
            let view = TopologyView::lock(&self.peers, &self.ourself);
            calculate_broadcast(&view, origin, filter)
        };

        write(&self.tables)
            .broadcast_mut(filter)
            .insert(origin, hops.clone());
        self.broadcast_fills.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(origin = %origin, ?filter, hops = hops.len(), "broadcast route cached");
        hops
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// If we want to send to peer X, which neighbour is the next hop?
///
/// The packet's destination peer is determined here, at the sender, so
/// intermediate peers need no knowledge beyond their own tables and there
/// are no constraints on the routes we pick.
fn calculate_unicast(view: &TopologyView<'_>, filter: ConnectionFilter) -> NextHops {
    let (_, routes) = view.routes(view.local(), None, filter);
    routes
}

/// If we receive a broadcast that originated at `origin`, which neighbours
/// do we pass it on to?
///
/// We widen from the origin until we reach ourselves; whatever had been
/// reached by then is covered by someone else. Our forward set is the
/// neighbours not yet reached. Because every peer runs the same
/// deterministic widening over the same topology, each peer is reached by
/// exactly one forwarder once the topology is stable. During churn peers
/// may disagree, and a frame may be duplicated or missed.
fn calculate_broadcast(
    view: &TopologyView<'_>,
    origin: PeerName,
    filter: ConnectionFilter,
) -> Vec<PeerName> {
    if !view.contains(origin) {
        return Vec::new();
    }
    let mut hops = Vec::new();
    let (found, reached) = view.routes(origin, Some(view.local()), filter);
    if found {
        view.for_each_connected_peer(view.local(), filter, &reached, |neighbour| {
            hops.push(neighbour)
        });
    }
    hops
}
