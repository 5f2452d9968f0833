//! Main Crate Error

use crate::common::Id;

#[derive(thiserror::Error, Debug)]
/// Chord crate error enum.
pub enum Error {
    /// Bad node id, ring width, or finger row index at construction time.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The target node could not be reached, or the connection failed
    /// before a response arrived.
    #[error("Node {target} is unreachable")]
    RemoteUnavailable {
        target: Id,
        #[source]
        source: std::io::Error,
    },

    /// Malformed wire data: undecodable, truncated, or oversized frames.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote node answered the call with an error message.
    #[error("Remote error {code}: {description}")]
    RemoteProcedure { code: i32, description: String },

    /// A lookup did not converge within `m + 1` hops. Successor pointers
    /// are inconsistent; surfaced as a bug signal, never retried.
    #[error("Lookup for {target} did not converge within {hops} hops")]
    RingInconsistency { target: Id, hops: u32 },

    #[error(transparent)]
    /// Transparent [std::io::Error] from local setup (bind, listener).
    IO(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
