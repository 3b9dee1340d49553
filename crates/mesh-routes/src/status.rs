//! Route status report — a sorted, serializable copy of the current
//! established-and-symmetric tables for diagnostics.

use serde::{Deserialize, Serialize};

use mesh_core::PeerName;

use crate::engine::BroadcastRoutes;
use crate::topology::NextHops;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStatus {
    pub unicast: Vec<UnicastRouteStatus>,
    pub broadcast: Vec<BroadcastRouteStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnicastRouteStatus {
    pub dest: PeerName,
    pub via: PeerName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRouteStatus {
    pub source: PeerName,
    pub via: Vec<PeerName>,
}

impl RouteStatus {
    pub(crate) fn from_tables(unicast: &NextHops, broadcast: &BroadcastRoutes) -> Self {
        let mut unicast: Vec<UnicastRouteStatus> = unicast
            .iter()
            .map(|(&dest, &via)| UnicastRouteStatus { dest, via })
            .collect();
        unicast.sort_by_key(|route| route.dest);

        let mut broadcast: Vec<BroadcastRouteStatus> = broadcast
            .iter()
            .map(|(&source, via)| {
                let mut via = via.clone();
                via.sort();
                BroadcastRouteStatus { source, via }
            })
            .collect();
        broadcast.sort_by_key(|route| route.source);

        Self { unicast, broadcast }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
