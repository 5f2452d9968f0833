use std::{sync::Arc, time::Duration};

use crate::common::DEFAULT_M;
use crate::resolver::{PortOffsetResolver, Resolver};

use super::socket::DEFAULT_REQUEST_TIMEOUT;

#[derive(Debug, Clone)]
/// Chord node configuration.
pub struct Config {
    /// Ring width in bits; the identifier space holds `2^m` ids.
    ///
    /// Deployment-wide, not per-node: every node of one ring must agree,
    /// and changing it means rebuilding the whole ring.
    ///
    /// Defaults to [DEFAULT_M].
    pub m: u32,
    /// Timeout applied to connect, send and receive of every remote call.
    ///
    /// The longer this duration is, the longer lookups block on an
    /// unresponsive peer before surfacing `RemoteUnavailable`.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT].
    pub request_timeout: Duration,
    /// Address resolution, injected from outside the lookup core.
    ///
    /// Defaults to [PortOffsetResolver], the single-machine harness.
    pub resolver: Arc<dyn Resolver>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            resolver: Arc::new(PortOffsetResolver::default()),
        }
    }
}
