//! Art-Net node binary entry point.
//!
//! Wires configuration, the node engine, and the configured senders onto the
//! Tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML from the platform config dir
//!  └─ ArtNetNode::new()      -- interface discovery, inbound + broadcast sockets
//!       ├─ receive task      -- decodes datagrams, feeds the dispatcher
//!       └─ new_sender() × N  -- one transmit task per configured universe
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use artnet_node::config;
use artnet_node::node::ArtNetNode;

/// Controllers silent for this long are marked offline.
const CONTROLLER_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(app_config.node.log_level.clone())),
        )
        .init();

    info!("Art-Net node starting");

    let retry = app_config.retry.to_policy();
    let node = ArtNetNode::new(app_config.node.to_node_config(), retry).await?;

    // ── Configured universes ──────────────────────────────────────────────────
    let mut senders = Vec::with_capacity(app_config.senders.len());
    for entry in &app_config.senders {
        match node.new_sender(entry.to_options()).await {
            Ok(sender) => {
                info!("universe {} up", sender.address());
                senders.push(sender);
            }
            Err(e) => {
                error!(
                    "invalid sender entry net={} subnet={} universe={}: {e}",
                    entry.net, entry.subnet, entry.universe
                );
            }
        }
    }
    if senders.is_empty() {
        warn!("no universes configured; node will answer polls only");
    }

    // Announce ourselves even when nothing is bound yet.
    node.broadcast_poll_replies().await;

    // Shutdown flag shared with the signal handler.
    let running = Arc::new(AtomicBool::new(true));

    // ── Ctrl-C / SIGTERM handler ──────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("Art-Net node ready.  Press Ctrl-C to exit.");

    // Periodic controller-liveness sweep doubles as the shutdown poll.
    let mut sweep = tokio::time::interval(Duration::from_secs(5));
    loop {
        sweep.tick().await;
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let flipped = node.sweep_controllers(CONTROLLER_TIMEOUT);
        if flipped > 0 {
            info!("{flipped} controller(s) went offline");
        }
    }

    for sender in &senders {
        sender.stop().await;
    }

    info!("Art-Net node stopped");
    Ok(())
}
