//! Address resolution: mapping ring ids to network addresses.

use std::collections::HashMap;
use std::fmt::Debug;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use parking_lot::RwLock;

use crate::common::Id;

/// Port the default harness starts numbering peers from.
pub const DEFAULT_BASE_PORT: u16 = 43544;

/// Resolves a ring id to the network address of the node owning it.
///
/// Stands in for a membership directory, which is an external collaborator
/// of the lookup core; deployments inject an implementation through
/// [Config](crate::rpc::Config).
pub trait Resolver: Send + Sync + Debug {
    fn resolve(&self, id: Id) -> Option<SocketAddr>;
}

/// Derives a peer's address as `base_port + id` on a fixed host.
///
/// Workable only for a single-machine harness where every node binds at
/// its own offset; real deployments replace it with a directory such as
/// [StaticResolver]. Ids past the end of the port range do not resolve.
#[derive(Debug, Clone)]
pub struct PortOffsetResolver {
    pub host: Ipv4Addr,
    pub base_port: u16,
}

impl Default for PortOffsetResolver {
    fn default() -> Self {
        PortOffsetResolver {
            host: Ipv4Addr::LOCALHOST,
            base_port: DEFAULT_BASE_PORT,
        }
    }
}

impl Resolver for PortOffsetResolver {
    fn resolve(&self, id: Id) -> Option<SocketAddr> {
        let offset = u16::try_from(id).ok()?;
        let port = self.base_port.checked_add(offset)?;

        Some(SocketAddr::V4(SocketAddrV4::new(self.host, port)))
    }
}

/// A directory of known peer addresses, registered out of band.
#[derive(Debug, Default)]
pub struct StaticResolver {
    addresses: RwLock<HashMap<Id, SocketAddr>>,
}

impl StaticResolver {
    pub fn new() -> StaticResolver {
        StaticResolver::default()
    }

    pub fn register(&self, id: Id, address: SocketAddr) {
        self.addresses.write().insert(id, address);
    }

    pub fn unregister(&self, id: Id) -> Option<SocketAddr> {
        self.addresses.write().remove(&id)
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, id: Id) -> Option<SocketAddr> {
        self.addresses.read().get(&id).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_offset() {
        let resolver = PortOffsetResolver::default();

        assert_eq!(
            resolver.resolve(2),
            Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                DEFAULT_BASE_PORT + 2
            )))
        );
    }

    #[test]
    fn port_offset_overflow_does_not_resolve() {
        let resolver = PortOffsetResolver::default();

        assert_eq!(resolver.resolve(u64::from(u16::MAX) + 1), None);
        assert_eq!(resolver.resolve(u64::from(u16::MAX - DEFAULT_BASE_PORT) + 1), None);
    }

    #[test]
    fn static_directory() {
        let resolver = StaticResolver::new();
        let address: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000));

        assert_eq!(resolver.resolve(7), None);

        resolver.register(7, address);
        assert_eq!(resolver.resolve(7), Some(address));

        assert_eq!(resolver.unregister(7), Some(address));
        assert_eq!(resolver.resolve(7), None);
    }
}
