//! Runs a single Chord node until interrupted.
//!
//! Peers are resolved at `base_port + id` on localhost, so a small ring
//! can be assembled by running several of these in separate terminals.

use std::net::Ipv4Addr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};

use chord_ring::resolver::{PortOffsetResolver, Resolver};
use chord_ring::{Chord, Config, Id, DEFAULT_M};

#[derive(Parser)]
#[command(about = "Run a Chord node on a localhost ring")]
struct Cli {
    /// Ring id of this node.
    id: Id,

    /// Ring width in bits (must match every other node).
    #[arg(long, default_value_t = DEFAULT_M)]
    m: u32,

    /// Port the ring starts numbering from; this node listens at base + id.
    #[arg(long, default_value_t = chord_ring::resolver::DEFAULT_BASE_PORT)]
    base_port: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let cli = Cli::parse();

    let resolver = PortOffsetResolver {
        host: Ipv4Addr::LOCALHOST,
        base_port: cli.base_port,
    };
    let bind_address = resolver
        .resolve(cli.id)
        .ok_or("node id does not fit the port range")?;

    let config = Config {
        m: cli.m,
        resolver: Arc::new(resolver),
        ..Default::default()
    };
    let node = Chord::start(cli.id, bind_address, &config)?;

    info!(
        id = node.id(),
        address = %node.local_addr(),
        "Node is running! Press Ctrl+C to stop."
    );

    let (shutdown, wait) = flume::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown.try_send(());
    })?;
    let _ = wait.recv();

    node.shutdown();

    Ok(())
}
