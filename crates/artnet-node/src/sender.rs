//! The DMX sender: one universe, one outbound socket, one transmit task.
//!
//! # Design
//!
//! Every sender owns a single Tokio task that is the **only** code path
//! writing to the wire.  Both transmit triggers — the periodic refresh timer
//! and the manual operations (`set_channel`, `fill_channels`, `reset`,
//! `transmit`) — funnel through one command channel into that task, so
//! frames are serialized and the concurrency story stays simple: mutate the
//! buffer, then ask the task to send a snapshot of it.
//!
//! The periodic refresh retransmits the current frame even when nothing
//! changed.  This is intentional: Art-Net receivers use the steady stream as
//! a heartbeat and blackout their output when it stops.
//!
//! A multi-channel update made with repeated `set_channel` calls is not
//! atomic with respect to the timer — a tick can snapshot a half-applied
//! update.  Callers that need a batch applied as one frame should use
//! `fill_channels` or accept the race; each individual byte is always
//! consistent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artnet_core::{
    encode_dmx, AddressError, ChannelBuffer, ChannelError, DmxPacket, DmxSequence,
    UniverseAddress, ARTNET_PORT,
};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::net::retry::{bind_ephemeral_with_retry, RetryPolicy};
use crate::registry::{BindingId, BindingRegistry, PortBinding};

/// Construction parameters for one sender.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderOptions {
    pub net: u8,
    pub subnet: u8,
    pub universe: u8,
    /// Explicit sub-universe override; derived from subnet/universe when
    /// `None`.
    pub sub_universe: Option<u8>,
    /// Destination address for DMX frames.
    pub destination: IpAddr,
    /// Destination UDP port.
    pub port: u16,
    /// Period of the heartbeat retransmission.
    pub refresh_interval: Duration,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            net: 0,
            subnet: 0,
            universe: 0,
            sub_universe: None,
            destination: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: ARTNET_PORT,
            refresh_interval: Duration::from_millis(1000),
        }
    }
}

/// Commands accepted by the transmit task.
enum SenderCommand {
    /// Send one frame from the current buffer state.
    Transmit,
    /// Tear the task down.  The ack fires after the task has committed to
    /// never transmitting again; `None` skips the handshake (drop path).
    Stop(Option<oneshot::Sender<()>>),
}

/// State shared between the handle and the transmit task.
struct SenderShared {
    address: UniverseAddress,
    destination: SocketAddr,
    buffer: Mutex<ChannelBuffer>,
    sequence: DmxSequence,
    stopped: AtomicBool,
}

/// Handle to one running DMX sender.
///
/// Cloning is deliberately not offered: a sender is owned by whoever created
/// it, mirroring the one-owner registry contract.
pub struct DmxSender {
    shared: Arc<SenderShared>,
    commands: mpsc::UnboundedSender<SenderCommand>,
    registry: Arc<Mutex<BindingRegistry>>,
    binding: BindingId,
}

impl DmxSender {
    /// Validates the universe address, registers an output binding, and
    /// spawns the transmit task.
    ///
    /// Prefer [`crate::node::ArtNetNode::new_sender`], which also triggers
    /// the poll-reply broadcast advertising the new universe.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when net/subnet/universe are out of range.
    /// Validation happens before any socket or registry side effect.
    pub fn spawn(
        options: SenderOptions,
        registry: Arc<Mutex<BindingRegistry>>,
        retry: RetryPolicy,
    ) -> Result<Self, AddressError> {
        let address = UniverseAddress::new(
            options.net,
            options.subnet,
            options.universe,
            options.sub_universe,
        )?;

        let binding = registry
            .lock()
            .expect("binding registry poisoned")
            .register(PortBinding::Output(address));

        let shared = Arc::new(SenderShared {
            address,
            destination: SocketAddr::new(options.destination, options.port),
            buffer: Mutex::new(ChannelBuffer::new()),
            sequence: DmxSequence::new(),
            stopped: AtomicBool::new(false),
        });

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(transmit_task(
            Arc::clone(&shared),
            rx,
            options.refresh_interval,
            retry,
        ));

        info!(
            "sender for universe {} started, destination {}",
            address, shared.destination
        );

        Ok(Self {
            shared,
            commands,
            registry,
            binding,
        })
    }

    /// The validated universe address this sender transmits.
    pub fn address(&self) -> UniverseAddress {
        self.shared.address
    }

    /// Sets one channel and transmits the updated frame immediately.
    ///
    /// `value` is clamped to 0..=255.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ChannelOutOfRange`] when `index > 511`; the
    /// buffer is untouched and nothing is sent.
    pub fn set_channel(&self, index: usize, value: i32) -> Result<(), ChannelError> {
        self.shared
            .buffer
            .lock()
            .expect("channel buffer poisoned")
            .set(index, value)?;
        self.transmit();
        Ok(())
    }

    /// Sets every channel in `start..=end` to the clamped `value` as one
    /// batch, then transmits once.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] for out-of-range bounds or `start > end`;
    /// the buffer is untouched and nothing is sent.
    pub fn fill_channels(&self, start: usize, end: usize, value: i32) -> Result<(), ChannelError> {
        self.shared
            .buffer
            .lock()
            .expect("channel buffer poisoned")
            .fill(start, end, value)?;
        self.transmit();
        Ok(())
    }

    /// Zeroes all 512 channels and transmits the blackout frame.
    pub fn reset(&self) {
        self.shared
            .buffer
            .lock()
            .expect("channel buffer poisoned")
            .reset();
        self.transmit();
    }

    /// Requests one transmission of the current frame.
    ///
    /// Fire-and-forget: a no-op while the outbound socket has not been
    /// opened yet or after [`stop`](Self::stop).
    pub fn transmit(&self) {
        if self.shared.stopped.load(Ordering::Relaxed) {
            return;
        }
        self.registry
            .lock()
            .expect("binding registry poisoned")
            .touch(self.binding);
        // The task having gone away means stop() already won the race.
        let _ = self.commands.send(SenderCommand::Transmit);
    }

    /// Stops the sender: no frame is transmitted after this returns, the
    /// output binding is deregistered, and the socket is released.
    /// Idempotent.
    ///
    /// The `stopped` flag alone cannot give that guarantee — the task may
    /// have passed its flag check and be about to send — so this rendezvous
    /// with the task: the Stop command is ordered behind any in-flight
    /// transmit, and the task acks it only once its loop has committed to
    /// exiting.
    pub async fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(SenderCommand::Stop(Some(ack_tx))).is_ok() {
            // A dropped ack means the task already exited, which is fine.
            let _ = ack_rx.await;
        }
        self.registry
            .lock()
            .expect("binding registry poisoned")
            .deregister(self.binding);
        info!("sender for universe {} stopped", self.shared.address);
    }
}

impl Drop for DmxSender {
    /// Best-effort teardown for handles dropped without an explicit
    /// [`stop`](Self::stop): the task is told to exit and the binding is
    /// deregistered, but without the ack rendezvous (`drop` cannot await).
    fn drop(&mut self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(SenderCommand::Stop(None));
        self.registry
            .lock()
            .expect("binding registry poisoned")
            .deregister(self.binding);
    }
}

// ── Transmit task ─────────────────────────────────────────────────────────────

/// The single serialization point for everything this sender puts on the
/// wire.
async fn transmit_task(
    shared: Arc<SenderShared>,
    mut commands: mpsc::UnboundedReceiver<SenderCommand>,
    refresh_interval: Duration,
    retry: RetryPolicy,
) {
    let mut socket = bind_ephemeral_with_retry(&retry).await;
    if socket.is_some() {
        // First frame right after the socket opens, so receivers see the
        // universe without waiting for a mutation or the first tick.
        send_frame(socket.as_ref(), &shared).await;
    }

    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.reset(); // the initial frame above covers the first period

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if shared.stopped.load(Ordering::SeqCst) {
                    break;
                }
                send_frame(socket.as_ref(), &shared).await;
            }
            cmd = commands.recv() => match cmd {
                Some(SenderCommand::Transmit) => {
                    if shared.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    if socket.is_none() {
                        // Manual path retries the bind; the timer path never does.
                        socket = bind_ephemeral_with_retry(&retry).await;
                    }
                    send_frame(socket.as_ref(), &shared).await;
                }
                Some(SenderCommand::Stop(ack)) => {
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    break;
                }
                None => break,
            }
        }
    }
    debug!("transmit task for universe {} exited", shared.address);
}

/// Encodes and sends one frame.  No-op without a socket.
async fn send_frame(socket: Option<&UdpSocket>, shared: &SenderShared) {
    let Some(socket) = socket else {
        debug!(
            "universe {}: outbound socket not open, skipping frame",
            shared.address
        );
        return;
    };

    let packet = {
        let buffer = shared.buffer.lock().expect("channel buffer poisoned");
        DmxPacket {
            sequence: shared.sequence.next(),
            physical: 0,
            sub_universe: shared.address.sub_universe(),
            net: shared.address.net(),
            channels: *buffer.as_array(),
        }
    };

    let bytes = encode_dmx(&packet);
    if let Err(e) = socket.send_to(&bytes, shared.destination).await {
        // Best-effort by protocol design: log and move on, no retry.
        warn!(
            "universe {}: send to {} failed: {e}",
            shared.address, shared.destination
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
