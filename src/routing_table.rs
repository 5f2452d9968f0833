//! Chord finger table: a node's O(m)-sized routing state.

use std::fmt::{self, Debug, Formatter};

use crate::common::{ring_size, validate_id, Id};
use crate::ring::ModRange;
use crate::{Error, Result};

/// Row in a finger table.
///
/// Covers the arc of ids starting at `(n + 2^(k-1)) mod 2^m` and records
/// the ring node currently believed to own that start.
#[derive(Clone, PartialEq, Eq)]
pub struct FingerEntry {
    start: Id,
    interval: ModRange,
    /// The node currently believed to be the successor of `start`.
    /// Mutated by maintenance machinery outside the lookup core.
    pub node: Id,
}

impl FingerEntry {
    /// Builds row `k` (1-based) of node `n`'s table on a `m`-bit ring.
    ///
    /// Row `m`'s interval wraps back around to `n` itself, closing the
    /// ring so the last arc covers everything from its start back to `n`.
    /// The `node` field starts out pointing at `n` until routing converges.
    pub fn new(n: Id, k: u32, m: u32) -> Result<FingerEntry> {
        validate_id(n, m)?;
        if k == 0 || k > m {
            return Err(Error::InvalidArgument(format!(
                "finger row {k} out of range 1..={m}"
            )));
        }

        let nodes = ring_size(m);
        let start = (n + (1u64 << (k - 1))) % nodes;
        let next_start = if k < m { (n + (1u64 << k)) % nodes } else { n };

        Ok(FingerEntry {
            start,
            interval: ModRange::new(start, next_start, nodes),
            node: n,
        })
    }

    // === Getters ===

    #[inline]
    pub fn start(&self) -> Id {
        self.start
    }

    #[inline]
    pub fn interval(&self) -> &ModRange {
        &self.interval
    }

    // === Public Methods ===

    /// Is the given id within this finger's interval?
    pub fn contains(&self, id: Id) -> bool {
        self.interval.contains(id)
    }
}

impl Debug for FingerEntry {
    /// Something like the interval|node charts in the Chord paper.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}|{}", self.interval, self.node)
    }
}

/// A node's full finger table: `m` live rows addressed 1-based as in the
/// Chord paper. Row 1 always covers `[n+1, n+2)`, so its `node` IS the
/// node's immediate successor.
#[derive(Debug, Clone)]
pub struct FingerTable {
    n: Id,
    m: u32,
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    /// Builds the table for node `n`, every row pointing back at `n` until
    /// maintenance machinery fills in real successors.
    pub fn new(n: Id, m: u32) -> Result<FingerTable> {
        validate_id(n, m)?;

        let entries = (1..=m)
            .map(|k| FingerEntry::new(n, k, m))
            .collect::<Result<Vec<_>>>()?;

        Ok(FingerTable { n, m, entries })
    }

    // === Getters ===

    #[inline]
    pub fn node_id(&self) -> Id {
        self.n
    }

    #[inline]
    pub fn m(&self) -> u32 {
        self.m
    }

    /// Row `k`, 1-based.
    ///
    /// # Panics
    ///
    /// If `k` is outside `1..=m`.
    pub fn entry(&self, k: u32) -> &FingerEntry {
        &self.entries[(k - 1) as usize]
    }

    /// Mutable row `k`, 1-based.
    ///
    /// # Panics
    ///
    /// If `k` is outside `1..=m`.
    pub fn entry_mut(&mut self, k: u32) -> &mut FingerEntry {
        &mut self.entries[(k - 1) as usize]
    }

    /// The node's immediate successor, read from row 1.
    pub fn successor(&self) -> Id {
        self.entries[0].node
    }

    /// Writes the successor through to row 1, so the successor pointer and
    /// the finger table can never diverge.
    pub fn set_successor(&mut self, id: Id) {
        self.entries[0].node = id;
    }

    /// Rows in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, FingerEntry> {
        self.entries.iter()
    }
}
