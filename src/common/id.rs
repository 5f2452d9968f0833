//! Ring identifiers: integers in `[0, 2^m)` under modular arithmetic.

use rand::Rng;

use crate::{Error, Result};

/// A node identifier or lookup target on the ring.
pub type Id = u64;

/// Ring width used when [Config](crate::rpc::Config) does not specify one.
///
/// Every node of one deployment must agree on `m`; changing it rebuilds the
/// whole ring. The default is sized for a single-machine deployment with the
/// default port-offset resolver.
pub const DEFAULT_M: u32 = 10;

/// Largest supported ring width, so `2^m` fits in the [Id] space.
pub const MAX_M: u32 = 63;

/// Number of identifiers in a ring of width `m`.
#[inline]
pub fn ring_size(m: u32) -> u64 {
    1u64 << m
}

pub(crate) fn validate_m(m: u32) -> Result<()> {
    if m == 0 || m > MAX_M {
        return Err(Error::InvalidArgument(format!(
            "ring width m must be in 1..={MAX_M}, got {m}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_id(id: Id, m: u32) -> Result<()> {
    validate_m(m)?;
    if id >= ring_size(m) {
        return Err(Error::InvalidArgument(format!(
            "id {id} out of range for a {m}-bit ring"
        )));
    }
    Ok(())
}

/// Hashes an arbitrary byte key into the id space of a `m`-bit ring.
///
/// Uses the first 8 bytes of the SHA-1 digest, masked down to `m` bits.
pub fn hash_to_id(key: &[u8], m: u32) -> Id {
    let digest = sha1_smol::Sha1::from(key).digest().bytes();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    u64::from_be_bytes(prefix) & (ring_size(m) - 1)
}

/// A uniformly random id on a `m`-bit ring.
pub fn random_id(m: u32) -> Id {
    rand::thread_rng().gen_range(0..ring_size(m))
}
