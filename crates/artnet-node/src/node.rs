//! The node engine: interface-aware aggregator tying the pieces together.
//!
//! An [`ArtNetNode`] owns the interface snapshot, the binding registry, the
//! inbound socket with its receive task, and the outbound broadcast socket
//! used for poll replies.  Senders and receivers are created through it so
//! every registration immediately advertises itself to listening
//! controllers.
//!
//! # Poll-reply broadcasting
//!
//! The reply round is split in two: a pure planner
//! ([`plan_poll_replies`]) that turns configuration + interfaces + bindings
//! into `(broadcast address, packet)` pairs, and a thin send loop that puts
//! them on the wire.  The planner carries all of the per-port flag rules and
//! is tested without any socket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artnet_core::{
    encode_poll_reply, AddressError, BindIndex, PollReplyCounter, PollReplyPacket,
    UniverseAddress, ARTNET_PORT, FIRMWARE_VERSION, GOOD_PORT_DATA, PORT_TYPE_CAN_INPUT,
    PORT_TYPE_CAN_OUTPUT, STYLE_NODE,
};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, DmxConsumer};
use crate::net::interfaces::{self, InterfaceSet, Ipv4Interface};
use crate::net::retry::RetryPolicy;
use crate::registry::{BindingId, BindingRegistry, PortBinding};
use crate::sender::{DmxSender, SenderOptions};

/// Status bitfield #1: indicators in normal mode, port addresses set by
/// front panel.
const STATUS1: u8 = 0b1101_0000;
/// Status bitfield #2: supports web config, DHCP capable, DHCP configured.
const STATUS2: u8 = 0b0000_1110;
/// Net/sub switch advertised when no port is bound at all.
const IDLE_SWITCH: u8 = 0x01;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid universe address: {0}")]
    Address(#[from] AddressError),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity and listening parameters of the node, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// OEM code reported in poll replies.
    pub oem: u16,
    /// ESTA manufacturer code.
    pub esta: u16,
    /// UDP port the inbound socket listens on.
    pub port: u16,
    /// Short node name, at most 16 bytes end up on the wire.
    pub short_name: String,
    /// Long node name, at most 63 bytes end up on the wire.
    pub long_name: String,
    /// Source-address allow-list for inbound datagrams; empty allows all.
    pub hosts: Vec<IpAddr>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            oem: 0x2908,
            esta: 0x0000,
            port: ARTNET_PORT,
            short_name: "AD ArtNet".to_string(),
            long_name: "Audience Display Artnet Node".to_string(),
            hosts: Vec::new(),
        }
    }
}

/// Handle to one inbound universe subscription.
///
/// Dropping the handle (or calling [`stop`](Self::stop)) removes the
/// consumer and deregisters the input binding.
pub struct DmxReceiver {
    address: UniverseAddress,
    registry: Arc<Mutex<BindingRegistry>>,
    dispatcher: Arc<Dispatcher>,
    binding: BindingId,
    stopped: std::sync::atomic::AtomicBool,
}

impl DmxReceiver {
    pub fn address(&self) -> UniverseAddress {
        self.address
    }

    /// Removes the consumer and the input binding.  Idempotent.
    pub fn stop(&self) {
        if self
            .stopped
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return;
        }
        self.dispatcher.remove_consumer(self.address.port_address());
        self.registry
            .lock()
            .expect("binding registry poisoned")
            .deregister(self.binding);
        info!("receiver for universe {} stopped", self.address);
    }
}

impl Drop for DmxReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The process-wide Art-Net engine.
pub struct ArtNetNode {
    config: NodeConfig,
    interfaces: InterfaceSet,
    registry: Arc<Mutex<BindingRegistry>>,
    dispatcher: Arc<Dispatcher>,
    reply_counter: PollReplyCounter,
    broadcast_socket: UdpSocket,
    retry: RetryPolicy,
    listen_addr: SocketAddr,
}

impl ArtNetNode {
    /// Discovers interfaces, binds the inbound socket on `config.port` and
    /// spawns the receive task, then binds the ephemeral broadcast socket.
    ///
    /// Interfaces are enumerated once here; addresses added to the host
    /// later are not picked up.
    pub async fn new(config: NodeConfig, retry: RetryPolicy) -> Result<Self, NodeError> {
        let interfaces = interfaces::discover()?;
        info!(
            "discovered {} IPv4 / {} IPv6 interface addresses",
            interfaces.ipv4.len(),
            interfaces.ipv6.len()
        );

        let inbound = UdpSocket::bind(("0.0.0.0", config.port)).await?;
        let listen_addr = inbound.local_addr()?;
        info!("listening for Art-Net on {listen_addr}");

        let dispatcher = Arc::new(Dispatcher::new(config.hosts.clone()));
        tokio::spawn(receive_task(inbound, Arc::clone(&dispatcher)));

        let broadcast_socket = UdpSocket::bind("0.0.0.0:0").await?;
        broadcast_socket.set_broadcast(true)?;

        Ok(Self {
            config,
            interfaces,
            registry: Arc::new(Mutex::new(BindingRegistry::new())),
            dispatcher,
            reply_counter: PollReplyCounter::new(),
            broadcast_socket,
            retry,
            listen_addr,
        })
    }

    /// The local address the inbound socket actually bound, useful when the
    /// configured port was 0.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Creates a DMX sender for one universe and advertises it right away,
    /// so controllers learn about the universe without polling first.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Address`] for an invalid universe address; in
    /// that case nothing was registered and nothing was broadcast.
    pub async fn new_sender(&self, options: SenderOptions) -> Result<DmxSender, NodeError> {
        let sender = DmxSender::spawn(options, Arc::clone(&self.registry), self.retry.clone())?;
        self.broadcast_poll_replies().await;
        Ok(sender)
    }

    /// Subscribes `consumer` to one inbound universe and advertises the
    /// input binding, mirroring [`new_sender`](Self::new_sender).
    pub async fn new_receiver(
        &self,
        net: u8,
        subnet: u8,
        universe: u8,
        sub_universe: Option<u8>,
        consumer: Arc<dyn DmxConsumer>,
    ) -> Result<DmxReceiver, NodeError> {
        let address = UniverseAddress::new(net, subnet, universe, sub_universe)?;

        let binding = self
            .registry
            .lock()
            .expect("binding registry poisoned")
            .register(PortBinding::Input(address));
        self.dispatcher.set_consumer(address.port_address(), consumer);
        info!("receiver for universe {} registered", address);

        self.broadcast_poll_replies().await;

        Ok(DmxReceiver {
            address,
            registry: Arc::clone(&self.registry),
            dispatcher: Arc::clone(&self.dispatcher),
            binding,
            stopped: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Runs one poll-reply broadcast round: every binding on every IPv4
    /// interface, or one idle reply per interface when nothing is bound.
    pub async fn broadcast_poll_replies(&self) {
        let bindings = self
            .registry
            .lock()
            .expect("binding registry poisoned")
            .snapshot();

        let planned = plan_poll_replies(
            &self.config,
            &self.interfaces.ipv4,
            &bindings,
            self.reply_counter.current(),
        );

        for (dest, packet) in &planned {
            let bytes = encode_poll_reply(packet);
            let target = SocketAddr::new(IpAddr::V4(*dest), ARTNET_PORT);
            if let Err(e) = self.broadcast_socket.send_to(&bytes, target).await {
                warn!("poll reply to {target} failed: {e}");
            }
        }
        debug!(
            "poll-reply round {} sent {} packets",
            self.reply_counter.current(),
            planned.len()
        );
        self.reply_counter.advance();
    }

    /// Marks controllers silent for longer than `timeout` as offline and
    /// returns how many flipped this call.
    pub fn sweep_controllers(&self, timeout: Duration) -> usize {
        self.dispatcher.sweep_controllers(timeout)
    }
}

// ── Receive task ──────────────────────────────────────────────────────────────

async fn receive_task(socket: UdpSocket, dispatcher: Arc<Dispatcher>) {
    // 530-byte DMX frames are the largest packet we handle; 1024 leaves room
    // for oversized-but-valid datagrams from lenient peers.
    let mut buf = [0u8; 1024];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => dispatcher.handle_datagram(&buf[..len], src),
            Err(e) => {
                error!("inbound receive failed: {e}");
                // Transient errors (e.g. ICMP port unreachable surfacing on
                // some platforms) should not kill the loop.
            }
        }
    }
}

// ── Poll-reply planning ───────────────────────────────────────────────────────

/// Computes one broadcast round without touching any socket.
///
/// For each interface the bind index restarts at 1 and post-increments per
/// packet, wrapping past 255 back to 1.  Output bindings precede input
/// bindings.  An empty registry yields exactly one idle reply per
/// interface.
pub(crate) fn plan_poll_replies(
    config: &NodeConfig,
    interfaces: &[Ipv4Interface],
    bindings: &[PortBinding],
    reply_count: u16,
) -> Vec<(Ipv4Addr, PollReplyPacket)> {
    let node_report = format!("#0001 [{reply_count:04}] dmxnet ArtNet-Transceiver running");
    let mut planned = Vec::with_capacity(interfaces.len() * bindings.len().max(1));

    for iface in interfaces {
        let broadcast = iface.broadcast();
        let mut bind_index = BindIndex::new();

        if bindings.is_empty() {
            let mut packet = base_reply(config, iface, &node_report, bind_index.take());
            packet.net_switch = IDLE_SWITCH;
            packet.sub_switch = IDLE_SWITCH;
            planned.push((broadcast, packet));
            continue;
        }

        for binding in bindings {
            let address = binding.address();
            let mut packet = base_reply(config, iface, &node_report, bind_index.take());
            packet.net_switch = address.net();
            packet.sub_switch = address.subnet();
            match binding {
                PortBinding::Output(_) => {
                    packet.port_types[0] = PORT_TYPE_CAN_OUTPUT;
                    packet.good_input[0] = GOOD_PORT_DATA;
                    packet.sw_in[0] = address.universe();
                }
                PortBinding::Input(_) => {
                    packet.port_types[0] = PORT_TYPE_CAN_INPUT;
                    packet.good_output[0] = GOOD_PORT_DATA;
                    packet.sw_out[0] = address.universe();
                }
            }
            planned.push((broadcast, packet));
        }
    }

    planned
}

/// Fields common to every reply in a round: identity, interface, report.
fn base_reply(
    config: &NodeConfig,
    iface: &Ipv4Interface,
    node_report: &str,
    bind_index: u8,
) -> PollReplyPacket {
    PollReplyPacket {
        ip: iface.addr,
        port: config.port,
        firmware: FIRMWARE_VERSION,
        net_switch: 0,
        sub_switch: 0,
        oem: config.oem,
        ubea: 0,
        status1: STATUS1,
        esta: config.esta,
        short_name: config.short_name.clone(),
        long_name: config.long_name.clone(),
        node_report: node_report.to_string(),
        port_count: 1,
        port_types: [0; 4],
        good_input: [0; 4],
        good_output: [0; 4],
        sw_in: [0; 4],
        sw_out: [0; 4],
        style: STYLE_NODE,
        mac: iface.mac,
        bind_ip: iface.addr,
        bind_index,
        status2: STATUS2,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
