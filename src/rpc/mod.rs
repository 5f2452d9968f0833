//! Node routing state and the lookup engine over it.

mod config;
pub(crate) mod socket;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{error, trace};

use crate::common::{
    ring_size, Id, Message, RequestSpecific, RequestTypeSpecific, ResponseSpecific,
    ResponseTypeSpecific,
};
use crate::resolver::Resolver;
use crate::ring::ModRange;
use crate::routing_table::FingerTable;
use crate::{Error, Result};

pub use config::Config;
pub use socket::DEFAULT_REQUEST_TIMEOUT;

/// A Chord node's routing state plus the lookup engine over it.
///
/// Lookups may run concurrently on separate threads; finger-table reads
/// take a consistent snapshot under a read lock while maintenance writes
/// take the write lock. The key partition has its own lock, one per node.
#[derive(Debug)]
pub struct Rpc {
    id: Id,
    m: u32,
    finger_table: RwLock<FingerTable>,
    predecessor: RwLock<Option<Id>>,
    keys: Mutex<BTreeMap<Id, Bytes>>,
    resolver: Arc<dyn Resolver>,
    request_timeout: Duration,
}

impl Rpc {
    pub fn new(id: Id, config: &Config) -> Result<Rpc> {
        Ok(Rpc {
            id,
            m: config.m,
            finger_table: RwLock::new(FingerTable::new(id, config.m)?),
            predecessor: RwLock::new(None),
            keys: Mutex::new(BTreeMap::new()),
            resolver: config.resolver.clone(),
            request_timeout: config.request_timeout,
        })
    }

    // === Getters ===

    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    #[inline]
    pub fn m(&self) -> u32 {
        self.m
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The node's immediate successor: row 1 of the finger table.
    pub fn successor(&self) -> Id {
        self.finger_table.read().successor()
    }

    pub fn predecessor(&self) -> Option<Id> {
        *self.predecessor.read()
    }

    // === Maintenance seams ===
    //
    // Stabilization, join and finger repair live outside the lookup core;
    // whatever drives them mutates the routing state through these.

    /// Sets the successor, writing through row 1 of the finger table.
    pub fn set_successor(&self, node: Id) -> Result<()> {
        crate::common::validate_id(node, self.m)?;
        self.finger_table.write().set_successor(node);
        Ok(())
    }

    pub fn set_predecessor(&self, node: Option<Id>) -> Result<()> {
        if let Some(node) = node {
            crate::common::validate_id(node, self.m)?;
        }
        *self.predecessor.write() = node;
        Ok(())
    }

    /// Points finger row `k` (1-based) at `node`.
    pub fn set_finger(&self, k: u32, node: Id) -> Result<()> {
        crate::common::validate_id(node, self.m)?;
        if k == 0 || k > self.m {
            return Err(Error::InvalidArgument(format!(
                "finger row {k} out of range 1..={}",
                self.m
            )));
        }
        self.finger_table.write().entry_mut(k).node = node;
        Ok(())
    }

    // === Public Methods ===

    /// Finds the node that owns `id`: the successor of `id`'s predecessor.
    pub fn find_successor(&self, id: Id) -> Result<Id> {
        let predecessor = self.find_predecessor(id)?;
        self.successor_of(predecessor)
    }

    /// Walks the ring until `id` is bracketed between a candidate node and
    /// its immediate successor, and returns that candidate.
    ///
    /// Each hop asks the CURRENT candidate for its closest preceding
    /// finger, so most iterations query a remote node's table. Correct
    /// successor pointers bracket any id within `m` hops; exceeding `m + 1`
    /// means the ring is broken and surfaces [Error::RingInconsistency].
    pub fn find_predecessor(&self, id: Id) -> Result<Id> {
        crate::common::validate_id(id, self.m)?;

        let nodes = ring_size(self.m);
        let mut candidate = self.id;

        for _ in 0..=self.m {
            let successor = self.successor_of(candidate)?;
            // Bracketed in (candidate, successor]?
            if ModRange::new(candidate + 1, successor + 1, nodes).contains(id) {
                return Ok(candidate);
            }

            candidate = self.closest_preceding_finger_of(candidate, id)?;
            trace!(context = "lookup", lookup_target = id, candidate, "Hopping towards predecessor");
        }

        error!(
            lookup_target = id,
            candidate, "Lookup exceeded the hop bound; successor pointers are inconsistent"
        );
        Err(Error::RingInconsistency {
            target: id,
            hops: self.m + 1,
        })
    }

    /// The furthest finger of THIS node that still strictly precedes `id`,
    /// or the node's own id when no finger qualifies.
    pub fn closest_preceding_finger(&self, id: Id) -> Id {
        // Open interval (self.id, id), both ends excluded.
        let range = ModRange::new(self.id + 1, id, ring_size(self.m));

        // Highest-reach finger first, so each hop covers the longest arc.
        let table = self.finger_table.read();
        for k in (1..=self.m).rev() {
            let node = table.entry(k).node;
            if range.contains(node) {
                return node;
            }
        }

        self.id
    }

    /// `predecessor` of another node, answered locally when it is self.
    pub fn predecessor_of(&self, node: Id) -> Result<Option<Id>> {
        if node == self.id {
            return Ok(self.predecessor());
        }
        match self.call(node, RequestTypeSpecific::Predecessor)? {
            ResponseTypeSpecific::Predecessor { node } => Ok(node),
            other => Err(unexpected_response("predecessor", &other)),
        }
    }

    // === Key partition ===

    /// Gets `key` from wherever it lives on the ring.
    pub fn get_value(&self, key: Id) -> Result<Option<Bytes>> {
        crate::common::validate_id(key, self.m)?;

        let owner = self.find_successor(key)?;
        if owner == self.id {
            return Ok(self.keys.lock().get(&key).cloned());
        }

        match self.call(owner, RequestTypeSpecific::GetValue { key })? {
            ResponseTypeSpecific::Value { value } => Ok(value),
            other => Err(unexpected_response("get_value", &other)),
        }
    }

    /// Stores `value` under `key` on its owner.
    pub fn put_value(&self, key: Id, value: Bytes) -> Result<()> {
        crate::common::validate_id(key, self.m)?;

        let owner = self.find_successor(key)?;
        if owner == self.id {
            self.keys.lock().insert(key, value);
            return Ok(());
        }

        match self.call(owner, RequestTypeSpecific::PutValue { key, value })? {
            ResponseTypeSpecific::Stored => Ok(()),
            other => Err(unexpected_response("put_value", &other)),
        }
    }

    // === Remote call channel ===

    /// One remote procedure call: resolve the target, exchange exactly one
    /// request/response pair over a fresh connection.
    pub fn call(&self, target: Id, request: RequestTypeSpecific) -> Result<ResponseTypeSpecific> {
        let address = self
            .resolver
            .resolve(target)
            .ok_or_else(|| Error::RemoteUnavailable {
                target,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no address known for node",
                ),
            })?;

        let message = Message::Request(RequestSpecific {
            requester_id: self.id,
            request_type: request,
        });

        match socket::call(target, address, &message, self.request_timeout)? {
            Message::Response(ResponseSpecific { response_type, .. }) => Ok(response_type),
            Message::Error(e) => Err(Error::RemoteProcedure {
                code: e.code,
                description: e.description,
            }),
            Message::Request(_) => Err(Error::Protocol(format!(
                "node {target} answered a call with a request"
            ))),
        }
    }

    // === Server dispatch ===

    /// Answers one incoming request. Called by the listener's
    /// per-connection handlers.
    pub(crate) fn handle_request(&self, request: &RequestSpecific) -> Result<ResponseTypeSpecific> {
        trace!(
            context = "request_handling",
            requester = request.requester_id,
            request = ?request.request_type
        );

        match &request.request_type {
            RequestTypeSpecific::Successor => Ok(ResponseTypeSpecific::Node {
                node: self.successor(),
            }),
            RequestTypeSpecific::Predecessor => Ok(ResponseTypeSpecific::Predecessor {
                node: self.predecessor(),
            }),
            RequestTypeSpecific::ClosestPrecedingFinger { target } => {
                Ok(ResponseTypeSpecific::Node {
                    node: self.closest_preceding_finger(*target),
                })
            }
            RequestTypeSpecific::GetValue { key } => Ok(ResponseTypeSpecific::Value {
                value: self.get_value(*key)?,
            }),
            RequestTypeSpecific::PutValue { key, value } => {
                self.put_value(*key, value.clone())?;
                Ok(ResponseTypeSpecific::Stored)
            }
        }
    }

    // === Private Methods ===

    /// `successor` of a node, answered locally when the node is self.
    fn successor_of(&self, node: Id) -> Result<Id> {
        if node == self.id {
            return Ok(self.successor());
        }
        match self.call(node, RequestTypeSpecific::Successor)? {
            ResponseTypeSpecific::Node { node } => Ok(node),
            other => Err(unexpected_response("successor", &other)),
        }
    }

    /// `closest_preceding_finger` of a node, answered locally when the
    /// node is self.
    fn closest_preceding_finger_of(&self, node: Id, target: Id) -> Result<Id> {
        if node == self.id {
            return Ok(self.closest_preceding_finger(target));
        }
        match self.call(node, RequestTypeSpecific::ClosestPrecedingFinger { target })? {
            ResponseTypeSpecific::Node { node } => Ok(node),
            other => Err(unexpected_response("closest_preceding_finger", &other)),
        }
    }
}

fn unexpected_response(procedure: &str, response: &ResponseTypeSpecific) -> Error {
    Error::Protocol(format!("unexpected response to {procedure}: {response:?}"))
}
