use crate::*;

use anyhow::{Context, Result};
use mesh_core::{ConnectionSnapshot, MeshConfig, PeerSnapshot, TopologySnapshot};
use mesh_routes::MeshRouter;

#[tokio::test]
async fn chain_unicast_and_self_broadcast() {
    init_tracing();
    let routes = Topology::chain(&[1, 2, 3]).routes_for(1).await;

    assert_eq!(routes.unicast(p(3)), Some(p(2)));
    assert_eq!(routes.unicast(p(2)), Some(p(2)));
    assert_eq!(routes.unicast(p(1)), Some(PeerName::UNKNOWN));
    assert_eq!(set(routes.broadcast(p(1)).await), set([p(2)]));
}

#[tokio::test]
async fn unknown_destination_is_not_found() {
    let routes = Topology::chain(&[1, 2, 3]).routes_for(1).await;

    assert_eq!(routes.unicast(p(4)), None);
    assert_eq!(routes.unicast_all(p(4)), None);
    assert!(routes.broadcast(p(4)).await.is_empty());
}

#[tokio::test]
async fn star_samples_two_spokes() {
    let routes = Topology::star(1, &[2, 3, 4, 5]).routes_for(1).await;
    let spokes = set([p(2), p(3), p(4), p(5)]);

    for _ in 0..50 {
        let picked = routes.random_neighbours(PeerName::UNKNOWN);
        assert_eq!(picked.len(), 2);
        let distinct = set(picked.iter().copied());
        assert_eq!(distinct.len(), 2);
        assert!(distinct.is_subset(&spokes));
    }
}

#[tokio::test]
async fn removed_link_drops_broadcast_hops() {
    init_tracing();
    let before = Topology::chain(&[1, 2, 3]);
    let (ourself, peers) = before.view_from(2);
    let routes = Routes::new(ourself.clone(), peers.clone());
    routes.recalculate();
    routes.ensure_recalculated().await;

    // Seen from 2, a broadcast from 3 continues on to 1.
    assert_eq!(routes.broadcast(p(3)).await, vec![p(1)]);
    assert_eq!(routes.unicast(p(3)), Some(p(3)));
    let fills = routes.stats().broadcast_fills;

    let after = Topology::chain(&[1, 2]).peer(3);
    after.publish(&ourself, &peers, 3);
    routes.recalculate();
    routes.ensure_recalculated().await;

    assert!(routes.broadcast(p(3)).await.is_empty());
    assert_eq!(routes.stats().broadcast_fills, fills + 1);
    assert_eq!(routes.unicast(p(3)), None);
    assert_eq!(routes.unicast(p(1)), Some(p(1)));
}

#[tokio::test]
async fn new_link_reroutes_unicast() {
    let (ourself, peers) = Topology::chain(&[1, 2, 3, 4]).view_from(1);
    let routes = Routes::new(ourself.clone(), peers.clone());
    routes.recalculate();
    routes.ensure_recalculated().await;
    assert_eq!(routes.unicast(p(4)), Some(p(2)));

    Topology::chain(&[1, 2, 3, 4])
        .link(1, 4)
        .publish(&ourself, &peers, 3);
    routes.recalculate();
    routes.ensure_recalculated().await;
    assert_eq!(routes.unicast(p(4)), Some(p(4)));
    assert_eq!(routes.unicast(p(3)), Some(p(2)));
}

#[tokio::test]
async fn half_open_link_only_in_all_tables() {
    // 1 → 2 established on our side, 2 has not confirmed; 2 ↔ 3 fine.
    let topology = Topology::new()
        .one_way(1, 2, true)
        .one_way(2, 1, false)
        .link(2, 3);
    let routes = topology.routes_for(1).await;

    assert_eq!(routes.unicast(p(2)), None);
    assert_eq!(routes.unicast(p(3)), None);
    assert_eq!(routes.unicast_all(p(2)), Some(p(2)));
    assert_eq!(routes.unicast_all(p(3)), Some(p(2)));

    assert!(routes.broadcast(p(1)).await.is_empty());
    assert_eq!(routes.broadcast_all(p(1)).await, vec![p(2)]);
}

#[tokio::test]
async fn router_from_snapshot_file() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("mesh-integration-{}", std::process::id()));
    std::fs::create_dir_all(&dir).context("create temp dir")?;
    let path = dir.join("topology.json");

    let link = |n: u64| ConnectionSnapshot { peer: p(n), established: true };
    let peer = |n: u64, links: &[u64]| PeerSnapshot {
        name: p(n),
        nickname: format!("peer-{n}"),
        version: 1,
        connections: links.iter().copied().map(link).collect(),
    };
    TopologySnapshot {
        peers: vec![peer(1, &[2, 3]), peer(2, &[1, 4]), peer(3, &[1]), peer(4, &[2])],
    }
    .save(&path)
    .context("write snapshot")?;

    let mut config = MeshConfig::default();
    config.identity.peer_name = "00:00:00:00:00:01".into();
    config.topology.snapshot_path = Some(path);
    let router = MeshRouter::from_config(&config).context("build router")?;
    router.refresh().await;

    assert_eq!(router.routes.unicast(p(4)), Some(p(2)));
    assert_eq!(set(router.routes.broadcast(p(1)).await), set([p(2), p(3)]));
    let status = router.routes.status();
    assert_eq!(status.unicast.len(), 4);
    assert!(status.to_json()?.contains("00:00:00:00:00:04"));

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
