//! Chord node handle: spawns the listener thread and exposes lookups.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tracing::info;

use crate::common::Id;
use crate::resolver::{Resolver, StaticResolver};
use crate::routing_table::FingerEntry;
use crate::rpc::{Config, Rpc};
use crate::{server, Error, Result};

/// A running Chord node: routing state, lookup engine and listener thread.
#[derive(Debug)]
pub struct Chord {
    rpc: Arc<Rpc>,
    local_addr: SocketAddr,
    shutdown: flume::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Clone for Chord {
    fn clone(&self) -> Self {
        Chord {
            rpc: self.rpc.clone(),
            local_addr: self.local_addr,
            shutdown: self.shutdown.clone(),
            handle: None,
        }
    }
}

impl Chord {
    /// Starts a node: binds `bind_address`, spawns the listener thread and
    /// returns a cloneable handle.
    ///
    /// Routing state starts out pointing at the node itself until the
    /// maintenance machinery (external to this crate) converges it.
    pub fn start(id: Id, bind_address: SocketAddr, config: &Config) -> Result<Chord> {
        let rpc = Arc::new(Rpc::new(id, config)?);

        let listener = TcpListener::bind(bind_address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (shutdown, shutdown_receiver) = flume::bounded(1);
        let server_rpc = rpc.clone();
        let handle = thread::spawn(move || server::run(server_rpc, listener, shutdown_receiver));

        info!(id, %local_addr, "Chord node listening");

        Ok(Chord {
            rpc,
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    // === Getters ===

    #[inline]
    pub fn id(&self) -> Id {
        self.rpc.id()
    }

    /// Returns the address the listener is bound to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn successor(&self) -> Id {
        self.rpc.successor()
    }

    pub fn predecessor(&self) -> Option<Id> {
        self.rpc.predecessor()
    }

    // === Public Methods ===

    /// Finds the node that owns `id`.
    pub fn find_successor(&self, id: Id) -> Result<Id> {
        self.rpc.find_successor(id)
    }

    /// Asks another node for its predecessor pointer.
    pub fn predecessor_of(&self, node: Id) -> Result<Option<Id>> {
        self.rpc.predecessor_of(node)
    }

    /// Gets `key` from wherever it lives on the ring.
    pub fn get(&self, key: Id) -> Result<Option<Bytes>> {
        self.rpc.get_value(key)
    }

    /// Stores `value` under `key` on its owner.
    pub fn put(&self, key: Id, value: Bytes) -> Result<()> {
        self.rpc.put_value(key, value)
    }

    // === Maintenance seams ===

    pub fn set_successor(&self, node: Id) -> Result<()> {
        self.rpc.set_successor(node)
    }

    pub fn set_predecessor(&self, node: Option<Id>) -> Result<()> {
        self.rpc.set_predecessor(node)
    }

    pub fn set_finger(&self, k: u32, node: Id) -> Result<()> {
        self.rpc.set_finger(k, node)
    }

    /// Signals the listener thread to stop. Idempotent across clones.
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }
}

impl Drop for Chord {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown();
            let _ = handle.join();
        }
    }
}

/// A local ring for tests and demos.
///
/// Every node binds an ephemeral port on localhost and registers it in a
/// shared [StaticResolver]. Finger tables and predecessors are wired to
/// their globally-correct values, standing in for the out-of-scope
/// maintenance protocol so lookups can be exercised over real sockets.
#[derive(Debug)]
pub struct Testnet {
    pub nodes: Vec<Chord>,
    pub resolver: Arc<StaticResolver>,
}

impl Testnet {
    pub fn new(m: u32, ids: &[Id]) -> Result<Testnet> {
        let mut members: Vec<Id> = ids.to_vec();
        members.sort_unstable();
        members.dedup();
        if members.is_empty() {
            return Err(Error::InvalidArgument(
                "a testnet needs at least one node".to_string(),
            ));
        }

        let resolver = Arc::new(StaticResolver::new());
        let config = Config {
            m,
            resolver: resolver.clone() as Arc<dyn Resolver>,
            ..Default::default()
        };

        let bind_address = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let mut nodes = Vec::with_capacity(members.len());
        for &id in &members {
            let node = Chord::start(id, bind_address, &config)?;
            resolver.register(id, node.local_addr());
            nodes.push(node);
        }

        for node in &nodes {
            for k in 1..=m {
                let start = FingerEntry::new(node.id(), k, m)?.start();
                node.set_finger(k, successor_on_ring(&members, start))?;
            }
            // Predecessor stays null until the ring has a second member.
            let predecessor = (members.len() > 1).then(|| predecessor_on_ring(&members, node.id()));
            node.set_predecessor(predecessor)?;
        }

        Ok(Testnet { nodes, resolver })
    }

    /// The node with the given id, if present.
    pub fn node(&self, id: Id) -> Option<&Chord> {
        self.nodes.iter().find(|node| node.id() == id)
    }
}

/// Smallest member at or after `start`, wrapping to the smallest overall.
fn successor_on_ring(members: &[Id], start: Id) -> Id {
    members
        .iter()
        .copied()
        .find(|&id| id >= start)
        .unwrap_or(members[0])
}

/// Largest member before `id`, wrapping to the largest overall.
fn predecessor_on_ring(members: &[Id], id: Id) -> Id {
    members
        .iter()
        .rev()
        .copied()
        .find(|&member| member < id)
        .unwrap_or(members[members.len() - 1])
}
