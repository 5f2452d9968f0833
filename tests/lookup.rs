//! Lookup tests over a real localhost ring.
//!
//! The concrete scenario throughout is the m = 3 ring from the Chord
//! paper: eight ids, nodes present at {0, 1, 3}.

use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chord_ring::resolver::Resolver;
use chord_ring::{Bytes, Chord, Config, Error, Testnet};

fn paper_ring() -> Testnet {
    Testnet::new(3, &[0, 1, 3]).expect("testnet")
}

#[test]
fn find_successor_on_the_paper_ring() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    assert_eq!(node_0.find_successor(2).unwrap(), 3);
    // Boundary: an id equal to a present node resolves to that node.
    assert_eq!(node_0.find_successor(1).unwrap(), 1);
    assert_eq!(node_0.find_successor(3).unwrap(), 3);
    // Wrap-around past 2^m - 1.
    assert_eq!(node_0.find_successor(7).unwrap(), 0);
    assert_eq!(node_0.find_successor(0).unwrap(), 0);
}

#[test]
fn every_node_agrees_on_every_owner() {
    let testnet = paper_ring();
    let owners = [0, 1, 3, 3, 0, 0, 0, 0];

    for node in &testnet.nodes {
        for (id, owner) in owners.iter().enumerate() {
            assert_eq!(
                node.find_successor(id as u64).unwrap(),
                *owner,
                "find_successor({id}) issued at node {}",
                node.id()
            );
        }
    }
}

#[test]
fn lookups_are_idempotent() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    assert_eq!(
        node_0.find_successor(6).unwrap(),
        node_0.find_successor(6).unwrap()
    );
}

#[test]
fn concurrent_lookups_agree() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let node = node_0.clone();
            thread::spawn(move || node.find_successor(2).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 3);
    }
}

#[test]
fn predecessor_over_the_wire() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    assert_eq!(node_0.predecessor_of(1).unwrap(), Some(0));
    assert_eq!(node_0.predecessor_of(3).unwrap(), Some(1));
    assert_eq!(node_0.predecessor_of(0).unwrap(), Some(3));
}

#[test]
fn fresh_node_reports_no_predecessor() {
    let testnet = paper_ring();

    // A standalone node that joined the directory but not the ring.
    let config = Config {
        m: 3,
        resolver: testnet.resolver.clone() as Arc<dyn Resolver>,
        ..Default::default()
    };
    let lonely = Chord::start(5, "127.0.0.1:0".parse().unwrap(), &config).unwrap();
    testnet.resolver.register(5, lonely.local_addr());

    assert_eq!(testnet.node(0).unwrap().predecessor_of(5).unwrap(), None);
}

#[test]
fn values_route_to_their_owner() {
    let testnet = paper_ring();

    // Key 2 is owned by node 3; store through node 1, read through node 0.
    testnet
        .node(1)
        .unwrap()
        .put(2, Bytes::from_static(b"value"))
        .unwrap();

    assert_eq!(
        testnet.node(0).unwrap().get(2).unwrap(),
        Some(Bytes::from_static(b"value"))
    );
    assert_eq!(testnet.node(0).unwrap().get(6).unwrap(), None);
}

#[test]
fn unreachable_peer_is_remote_unavailable() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    // Point id 5 at a port with nothing behind it and route a lookup
    // through it.
    let dead = TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);
    testnet.resolver.register(5, dead_addr);
    node_0.set_finger(3, 5).unwrap();
    node_0.set_successor(5).unwrap();

    let started = Instant::now();
    let result = node_0.find_successor(7);

    assert!(
        matches!(result, Err(Error::RemoteUnavailable { target: 5, .. })),
        "got {result:?}"
    );
    assert!(
        started.elapsed() < Duration::from_secs(30),
        "must fail within the timeout, not hang"
    );
}

#[test]
fn unresolvable_peer_is_remote_unavailable() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    // Id 6 is in nobody's directory.
    node_0.set_finger(3, 6).unwrap();
    node_0.set_successor(6).unwrap();

    assert!(matches!(
        node_0.find_successor(7),
        Err(Error::RemoteUnavailable { target: 6, .. })
    ));
}

#[test]
fn misbehaving_peer_is_protocol_error() {
    let testnet = paper_ring();
    let node_0 = testnet.node(0).unwrap();

    // A fake node that answers every call with garbage.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let fake_addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        while let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(&7u32.to_be_bytes());
            let _ = stream.write_all(b"garbage");
        }
    });

    testnet.resolver.register(5, fake_addr);
    node_0.set_finger(3, 5).unwrap();
    node_0.set_successor(5).unwrap();

    assert!(matches!(node_0.find_successor(7), Err(Error::Protocol(_))));
}

#[test]
fn broken_successor_pointers_surface_ring_inconsistency() {
    // All eight ids present, but every finger beyond row 1 points at its
    // own node: lookups can only crawl one successor at a time, which
    // cannot bracket a far id within m + 1 hops.
    let testnet = Testnet::new(3, &[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
    for node in &testnet.nodes {
        node.set_finger(2, node.id()).unwrap();
        node.set_finger(3, node.id()).unwrap();
    }

    let result = testnet.node(0).unwrap().find_successor(7);

    assert!(
        matches!(result, Err(Error::RingInconsistency { target: 7, .. })),
        "got {result:?}"
    );
}

#[test]
fn single_node_ring_over_the_wire() {
    let testnet = Testnet::new(3, &[4]).unwrap();
    let node = testnet.node(4).unwrap();

    for id in 0..8 {
        assert_eq!(node.find_successor(id).unwrap(), 4);
    }

    node.put(1, Bytes::from_static(b"only")).unwrap();
    assert_eq!(node.get(1).unwrap(), Some(Bytes::from_static(b"only")));
}
