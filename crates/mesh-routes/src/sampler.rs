//! Topology-weighted neighbour sampling for gossip fan-out.
//!
//! We pick min(log2(n_peers), n_neighbours) distinct neighbours. Sampling is
//! over entries of the all-connections unicast table, not over distinct
//! neighbours: a neighbour that is the next hop towards many destinations
//! appears many times, so neighbours at the end of bottleneck links are
//! favoured. That bias is what we want.
//!
//! Because we choose log2(n_peers) *neighbours*, sparsely connected peers
//! return a larger share of their neighbours than well-connected ones. With
//! fewer neighbours than log2(n_peers), all of them are returned.

use mesh_core::PeerName;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::topology::NextHops;

/// floor(log2(peer_count)), 0 for an empty table.
pub(crate) fn sample_size(peer_count: usize) -> usize {
    peer_count.checked_ilog2().map_or(0, |n| n as usize)
}

/// Draw up to `sample_size(table.len())` distinct next hops from
/// `unicast_all`, never returning `except` or the unknown sentinel.
pub(crate) fn random_neighbours<R: Rng + ?Sized>(
    unicast_all: &NextHops,
    except: PeerName,
    rng: &mut R,
) -> Vec<PeerName> {
    let count = sample_size(unicast_all.len());

    let mut entries: Vec<PeerName> = unicast_all
        .values()
        .copied()
        .filter(|hop| !hop.is_unknown() && *hop != except)
        .collect();
    // Explicit shuffle: selection must not depend on map iteration order.
    entries.shuffle(rng);

    let mut chosen = Vec::with_capacity(count);
    for hop in entries {
        if chosen.len() >= count {
            break;
        }
        if !chosen.contains(&hop) {
            chosen.push(hop);
        }
    }
    chosen
}
