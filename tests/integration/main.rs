//! mesh-routes integration test harness.
//!
//! Every test builds its topology in-process from a list of links, so
//! nothing here needs the network or root.
//!
//!   cargo test --test integration
//!
//! Set RUST_LOG=mesh_routes=debug to see recalculations as they happen.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mesh_core::PeerName;
use mesh_routes::{LocalPeer, PeerRecord, Peers, Routes};

mod scenarios;

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn p(n: u64) -> PeerName {
    PeerName::from_u64(n)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A topology described as directed link reports: `(a, b) → established`
/// means peer a reports a connection to b in that state.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    links: BTreeMap<(u64, u64), bool>,
    isolated: BTreeSet<u64>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Established link reported by both ends.
    pub fn link(mut self, a: u64, b: u64) -> Self {
        self.links.insert((a, b), true);
        self.links.insert((b, a), true);
        self
    }

    /// Link reported only by `from`.
    pub fn one_way(mut self, from: u64, to: u64, established: bool) -> Self {
        self.links.insert((from, to), established);
        self
    }

    /// Peer known to the topology but with no links.
    pub fn peer(mut self, n: u64) -> Self {
        self.isolated.insert(n);
        self
    }

    pub fn chain(peers: &[u64]) -> Self {
        peers
            .windows(2)
            .fold(Self::new(), |t, pair| t.link(pair[0], pair[1]))
    }

    pub fn star(hub: u64, spokes: &[u64]) -> Self {
        spokes.iter().fold(Self::new(), |t, &s| t.link(hub, s))
    }

    pub fn ring(n: u64) -> Self {
        (1..=n).fold(Self::new(), |t, i| t.link(i, i % n + 1))
    }

    /// `width × height` grid, peers numbered row-major from 1.
    pub fn grid(width: u64, height: u64) -> Self {
        let id = |x: u64, y: u64| y * width + x + 1;
        let mut t = Self::new();
        for y in 0..height {
            for x in 0..width {
                if x + 1 < width {
                    t = t.link(id(x, y), id(x + 1, y));
                }
                if y + 1 < height {
                    t = t.link(id(x, y), id(x, y + 1));
                }
            }
        }
        t
    }

    pub fn complete(n: u64) -> Self {
        let mut t = Self::new();
        for a in 1..=n {
            for b in (a + 1)..=n {
                t = t.link(a, b);
            }
        }
        t
    }

    pub fn nodes(&self) -> BTreeSet<u64> {
        self.links
            .keys()
            .flat_map(|&(a, b)| [a, b])
            .chain(self.isolated.iter().copied())
            .collect()
    }

    /// The topology as seen from `local`: its own links go to the
    /// LocalPeer, everyone else's to Peers.
    pub fn view_from(&self, local: u64) -> (Arc<LocalPeer>, Arc<Peers>) {
        let ourself = Arc::new(LocalPeer::new(p(local), format!("peer-{local}")));
        let peers = Arc::new(Peers::new(p(local)));
        for node in self.nodes() {
            if node == local {
                continue;
            }
            let mut record = PeerRecord::new(p(node), 1);
            record.nickname = format!("peer-{node}");
            peers.apply_update(record);
        }
        self.publish(&ourself, &peers, 2);
        (ourself, peers)
    }

    /// Push this topology into an existing view as a new gossip version.
    /// Local links not present any more are removed.
    pub fn publish(&self, ourself: &LocalPeer, peers: &Peers, version: u64) {
        let local = ourself.name().as_u64();
        for remote in ourself.connections().keys() {
            if !self.links.contains_key(&(local, remote.as_u64())) {
                ourself.remove_connection(*remote);
            }
        }
        for node in self.nodes() {
            if node == local {
                for (&(_, to), &established) in self.links.range((node, 0)..=(node, u64::MAX)) {
                    ourself.add_connection(p(to), established);
                }
                continue;
            }
            let mut record = PeerRecord::new(p(node), version);
            record.nickname = format!("peer-{node}");
            for (&(_, to), &established) in self.links.range((node, 0)..=(node, u64::MAX)) {
                record = record.with_connection(p(to), established);
            }
            peers.apply_update(record);
        }
    }

    /// Routes for `local`, recalculated and ready.
    pub async fn routes_for(&self, local: u64) -> Routes {
        let (ourself, peers) = self.view_from(local);
        let routes = Routes::new(ourself, peers);
        routes.recalculate();
        routes.ensure_recalculated().await;
        routes
    }
}

pub fn set(names: impl IntoIterator<Item = PeerName>) -> BTreeSet<PeerName> {
    names.into_iter().collect()
}

// ── Harness self-checks ───────────────────────────────────────────────────────

#[test]
fn builders_produce_expected_nodes() {
    assert_eq!(Topology::chain(&[1, 2, 3]).nodes().len(), 3);
    assert_eq!(Topology::ring(6).nodes().len(), 6);
    assert_eq!(Topology::grid(3, 3).nodes().len(), 9);
    assert_eq!(Topology::complete(5).nodes().len(), 5);
    assert_eq!(Topology::chain(&[1, 2]).peer(9).nodes().len(), 3);
}

#[test]
fn view_splits_local_and_remote_links() {
    let (ourself, peers) = Topology::star(1, &[2, 3, 4]).view_from(1);
    assert_eq!(ourself.connections().len(), 3);
    assert_eq!(peers.len(), 4);
    let two = peers.get(p(2)).expect("peer 2 known");
    assert_eq!(two.connections.keys().copied().collect::<Vec<_>>(), vec![p(1)]);
    assert_eq!(two.version, 2);
}
