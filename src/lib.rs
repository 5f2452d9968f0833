#![doc = include_str!("../README.md")]

// Public modules
mod chord;
mod common;
mod error;
pub mod resolver;
pub mod ring;
pub mod routing_table;
pub mod rpc;
mod server;

pub use crate::chord::{Chord, Testnet};
pub use crate::common::{
    hash_to_id, random_id, ring_size, ErrorSpecific, Id, Message, RequestSpecific,
    RequestTypeSpecific, ResponseSpecific, ResponseTypeSpecific, DEFAULT_M, MAX_M,
};
pub use crate::error::{Error, Result};
pub use crate::rpc::{Config, Rpc, DEFAULT_REQUEST_TIMEOUT};
pub use bytes::Bytes;
