//! Topology provider — who is connected to whom.
//!
//! Two pieces of shared state, each behind its own lock:
//!   - `Peers`:     the gossiped view of every remote peer's connections
//!   - `LocalPeer`: our own connections, as reported by the connection layer
//!
//! Route calculation reads both through a `TopologyView`, which always takes
//! the `Peers` lock first and the `LocalPeer` lock second. Anything else that
//! needs both must use the same order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard};

use mesh_core::{PeerName, TopologySnapshot};

use crate::lock::{read, write};

/// Which connections count when computing reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionFilter {
    /// Only links whose handshake completed on both ends and that both ends
    /// report.
    EstablishedAndSymmetric,
    /// Every reported link, whatever its state.
    All,
}

impl ConnectionFilter {
    fn symmetric(self) -> bool {
        matches!(self, ConnectionFilter::EstablishedAndSymmetric)
    }
}

/// One side's record of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub established: bool,
}

/// Connections reported by one peer, keyed on the remote end.
pub type Connections = BTreeMap<PeerName, Link>;

/// Next-hop table: destination → neighbour to send through.
pub type NextHops = HashMap<PeerName, PeerName>;

// ── Local peer ────────────────────────────────────────────────────────────────

/// This node, and its own view of its connections.
#[derive(Debug)]
pub struct LocalPeer {
    name: PeerName,
    nickname: String,
    connections: RwLock<Connections>,
}

impl LocalPeer {
    pub fn new(name: PeerName, nickname: impl Into<String>) -> Self {
        Self {
            name,
            nickname: nickname.into(),
            connections: RwLock::new(Connections::new()),
        }
    }

    pub fn name(&self) -> PeerName {
        self.name
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Record a connection to `remote`. Returns true if anything changed.
    pub fn add_connection(&self, remote: PeerName, established: bool) -> bool {
        if remote == self.name {
            return false;
        }
        let link = Link { established };
        write(&self.connections).insert(remote, link) != Some(link)
    }

    /// Mark an existing connection as established. Returns false if there is
    /// no such connection or it was already established.
    pub fn mark_established(&self, remote: PeerName) -> bool {
        match write(&self.connections).get_mut(&remote) {
            Some(link) if !link.established => {
                link.established = true;
                true
            }
            _ => false,
        }
    }

    pub fn remove_connection(&self, remote: PeerName) -> bool {
        write(&self.connections).remove(&remote).is_some()
    }

    pub fn connections(&self) -> Connections {
        read(&self.connections).clone()
    }
}

// ── Remote peers ──────────────────────────────────────────────────────────────

/// A remote peer as last heard through gossip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub name: PeerName,
    pub nickname: String,
    /// Bumped by the peer whenever its connection list changes.
    pub version: u64,
    pub connections: Connections,
}

impl PeerRecord {
    pub fn new(name: PeerName, version: u64) -> Self {
        Self {
            name,
            nickname: String::new(),
            version,
            connections: Connections::new(),
        }
    }

    pub fn with_connection(mut self, remote: PeerName, established: bool) -> Self {
        self.connections.insert(remote, Link { established });
        self
    }
}

/// Every remote peer we know about.
#[derive(Debug)]
pub struct Peers {
    local: PeerName,
    by_name: RwLock<HashMap<PeerName, PeerRecord>>,
}

impl Peers {
    pub fn new(local: PeerName) -> Self {
        Self {
            local,
            by_name: RwLock::new(HashMap::new()),
        }
    }

    /// Store a gossiped record if it is newer than what we hold.
    /// Returns true if the topology changed and routes need recalculating.
    ///
    /// Records claiming to be the local peer are ignored; our own
    /// connections only come from `LocalPeer`.
    pub fn apply_update(&self, record: PeerRecord) -> bool {
        if record.name == self.local {
            tracing::debug!(peer = %record.name, "ignoring gossip about ourself");
            return false;
        }
        let mut by_name = write(&self.by_name);
        if let Some(existing) = by_name.get(&record.name) {
            if existing.version >= record.version {
                return false;
            }
        }
        tracing::trace!(
            peer = %record.name,
            version = record.version,
            connections = record.connections.len(),
            "peer record updated"
        );
        by_name.insert(record.name, record);
        true
    }

    pub fn remove(&self, name: PeerName) -> bool {
        write(&self.by_name).remove(&name).is_some()
    }

    pub fn get(&self, name: PeerName) -> Option<PeerRecord> {
        read(&self.by_name).get(&name).cloned()
    }

    /// Names of all known peers, the local peer included.
    pub fn names(&self) -> BTreeSet<PeerName> {
        let mut names: BTreeSet<PeerName> = read(&self.by_name).keys().copied().collect();
        names.insert(self.local);
        names
    }

    /// Number of known peers, the local peer included.
    pub fn len(&self) -> usize {
        read(&self.by_name).len() + 1
    }

    /// Never true: the local peer is always counted.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Load a snapshot into an (expected empty) topology. The entry matching the
/// local peer seeds `ourself`; every other entry becomes a peer record.
pub fn seed_from_snapshot(snapshot: &TopologySnapshot, ourself: &LocalPeer, peers: &Peers) {
    for entry in &snapshot.peers {
        if entry.name == ourself.name() {
            for conn in &entry.connections {
                ourself.add_connection(conn.peer, conn.established);
            }
            continue;
        }
        let record = PeerRecord {
            name: entry.name,
            nickname: entry.nickname.clone(),
            version: entry.version,
            connections: entry
                .connections
                .iter()
                .map(|c| (c.peer, Link { established: c.established }))
                .collect(),
        };
        peers.apply_update(record);
    }
}

// ── Locked view ───────────────────────────────────────────────────────────────

/// Read access to the whole topology, held for the duration of one route
/// computation.
pub struct TopologyView<'a> {
    local: PeerName,
    peers: RwLockReadGuard<'a, HashMap<PeerName, PeerRecord>>,
    ourself: RwLockReadGuard<'a, Connections>,
}

impl<'a> TopologyView<'a> {
    /// Acquire both read locks: peers first, then the local peer.
    pub fn lock(peers: &'a Peers, ourself: &'a LocalPeer) -> Self {
        let peers_guard = read(&peers.by_name);
        let ourself_guard = read(&ourself.connections);
        Self {
            local: ourself.name(),
            peers: peers_guard,
            ourself: ourself_guard,
        }
    }

    pub fn local(&self) -> PeerName {
        self.local
    }

    pub fn contains(&self, name: PeerName) -> bool {
        name == self.local || self.peers.contains_key(&name)
    }

    fn connections_of(&self, name: PeerName) -> Option<&Connections> {
        if name == self.local {
            Some(&*self.ourself)
        } else {
            self.peers.get(&name).map(|record| &record.connections)
        }
    }

    /// Neighbours of `of` that pass `filter` and are not keys of `exclude`,
    /// in name order. Links to peers missing from the topology are skipped.
    pub fn connected_peers(
        &self,
        of: PeerName,
        filter: ConnectionFilter,
        exclude: &NextHops,
    ) -> Vec<PeerName> {
        let Some(connections) = self.connections_of(of) else {
            return Vec::new();
        };
        connections
            .iter()
            .filter_map(|(&remote, link)| {
                if filter.symmetric() && !link.established {
                    return None;
                }
                if exclude.contains_key(&remote) {
                    return None;
                }
                let remote_connections = self.connections_of(remote)?;
                if !filter.symmetric() {
                    return Some(remote);
                }
                remote_connections
                    .get(&of)
                    .filter(|back| back.established)
                    .map(|_| remote)
            })
            .collect()
    }

    pub fn for_each_connected_peer(
        &self,
        of: PeerName,
        filter: ConnectionFilter,
        exclude: &NextHops,
        visit: impl FnMut(PeerName),
    ) {
        self.connected_peers(of, filter, exclude)
            .into_iter()
            .for_each(visit);
    }

    /// Breadth-first widening from `from`, returning a next-hop table for
    /// every peer reached: "to get to X, first go to neighbour Y".
    ///
    /// Each level of the worklist is processed in name order, so every peer
    /// computing this over the same topology gets the same answer. Without
    /// that, broadcasts could loop or be dropped.
    ///
    /// With `stop_at`, widening halts as soon as that peer is taken off the
    /// worklist; the boolean reports whether that happened, and the table
    /// then holds everything discovered before it.
    pub fn routes(
        &self,
        from: PeerName,
        stop_at: Option<PeerName>,
        filter: ConnectionFilter,
    ) -> (bool, NextHops) {
        let mut routes = NextHops::new();
        routes.insert(from, PeerName::UNKNOWN);

        let mut next = vec![from];
        while !next.is_empty() {
            let mut worklist = std::mem::take(&mut next);
            worklist.sort_unstable();
            for current in worklist {
                if stop_at == Some(current) {
                    return (true, routes);
                }
                for remote in self.connected_peers(current, filter, &routes) {
                    next.push(remote);
                    // Neighbours of the start are reached directly; anything
                    // further goes the same way as the peer that found it.
                    let hop = if current == from {
                        remote
                    } else {
                        routes.get(&current).copied().unwrap_or(PeerName::UNKNOWN)
                    };
                    routes.insert(remote, hop);
                }
            }
        }
        (false, routes)
    }
}
