//! Inbound datagram dispatch.
//!
//! Every datagram received on the node's listening socket goes through
//! [`Dispatcher::handle_datagram`]: the opcode is read from the fixed header
//! offset and routed.  ArtDmx data is handed to the per-universe
//! [`DmxConsumer`] the surrounding application registered; ArtPoll feeds the
//! controller liveness registry; everything else — including malformed
//! datagrams — is dropped silently.  Nothing in here can panic the receive
//! loop.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use artnet_core::{decode_packet, ArtPacket, DMX_CHANNELS};
use tracing::{debug, trace};

use crate::registry::ControllerRegistry;

/// Per-universe consumer of inbound DMX frames.
///
/// This is the seam to the lighting-effects layer: the engine does not know
/// what channels *mean*, it only delivers each decoded universe to whoever
/// subscribed to its port address.  Implementations must be cheap — they run
/// on the receive task.
pub trait DmxConsumer: Send + Sync {
    /// Called once per decoded ArtDmx frame addressed to a subscribed
    /// universe.
    fn receive(&self, port_address: u16, channels: &[u8; DMX_CHANNELS]);
}

/// Routes inbound datagrams by opcode.
pub struct Dispatcher {
    /// Universe consumers keyed by 16-bit port address.
    consumers: RwLock<HashMap<u16, Arc<dyn DmxConsumer>>>,
    /// Remote controllers observed via ArtPoll.
    controllers: Mutex<ControllerRegistry>,
    /// Source-address allow-list; empty means allow all.
    hosts: Vec<IpAddr>,
}

impl Dispatcher {
    pub fn new(hosts: Vec<IpAddr>) -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            controllers: Mutex::new(ControllerRegistry::new()),
            hosts,
        }
    }

    /// Subscribes `consumer` to one universe, replacing any previous
    /// subscription for the same port address.
    pub fn set_consumer(&self, port_address: u16, consumer: Arc<dyn DmxConsumer>) {
        self.consumers
            .write()
            .expect("consumer map poisoned")
            .insert(port_address, consumer);
    }

    /// Drops the subscription for one universe, if any.
    pub fn remove_consumer(&self, port_address: u16) {
        self.consumers
            .write()
            .expect("consumer map poisoned")
            .remove(&port_address);
    }

    /// Processes one inbound datagram.  Never returns an error: undeliverable
    /// data is logged at debug level and dropped.
    pub fn handle_datagram(&self, data: &[u8], src: SocketAddr) {
        if !self.host_allowed(src.ip()) {
            debug!("dropping datagram from disallowed host {src}");
            return;
        }

        match decode_packet(data) {
            Ok(ArtPacket::Dmx(pkt)) => {
                let port_address = pkt.port_address();
                let consumer = self
                    .consumers
                    .read()
                    .expect("consumer map poisoned")
                    .get(&port_address)
                    .cloned();
                match consumer {
                    Some(consumer) => consumer.receive(port_address, &pkt.channels),
                    None => trace!("no consumer for universe 0x{port_address:04X}, dropping"),
                }
            }
            Ok(ArtPacket::Poll) => {
                debug!("poll from controller {src}");
                self.controllers
                    .lock()
                    .expect("controller registry poisoned")
                    .record(src, Instant::now());
            }
            Ok(ArtPacket::PollReply(_)) => {
                // Another node advertising itself; nothing to do with it here.
                trace!("poll reply from {src} ignored");
            }
            Err(e) => {
                debug!("dropping malformed datagram from {src}: {e}");
            }
        }
    }

    /// Runs one controller-liveness sweep.  Externally driven so callers
    /// control the clock and cadence; returns the number of controllers
    /// newly marked offline.
    pub fn sweep_controllers(&self, timeout: Duration) -> usize {
        self.controllers
            .lock()
            .expect("controller registry poisoned")
            .sweep(timeout, Instant::now())
    }

    /// Number of controllers currently considered online.
    pub fn online_controllers(&self) -> usize {
        self.controllers
            .lock()
            .expect("controller registry poisoned")
            .online_count()
    }

    fn host_allowed(&self, ip: IpAddr) -> bool {
        self.hosts.is_empty() || self.hosts.contains(&ip)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use artnet_core::{encode_dmx, DmxPacket};

    /// Records every delivery for later assertions.
    struct Recording {
        frames: Mutex<Vec<(u16, Vec<u8>)>>,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
            })
        }

        fn frames(&self) -> Vec<(u16, Vec<u8>)> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl DmxConsumer for Recording {
        fn receive(&self, port_address: u16, channels: &[u8; DMX_CHANNELS]) {
            self.frames
                .lock()
                .unwrap()
                .push((port_address, channels.to_vec()));
        }
    }

    fn dmx_bytes(sub_universe: u8, net: u8, first_channel: u8) -> Vec<u8> {
        let mut channels = [0u8; DMX_CHANNELS];
        channels[0] = first_channel;
        encode_dmx(&DmxPacket {
            sequence: 1,
            physical: 0,
            sub_universe,
            net,
            channels,
        })
    }

    fn src() -> SocketAddr {
        "192.168.1.77:6454".parse().unwrap()
    }

    #[test]
    fn test_dmx_is_delivered_to_matching_consumer() {
        let dispatcher = Dispatcher::new(vec![]);
        let consumer = Recording::new();
        dispatcher.set_consumer(0x0015, Arc::clone(&consumer) as Arc<dyn DmxConsumer>);

        dispatcher.handle_datagram(&dmx_bytes(0x15, 0, 200), src());

        let frames = consumer.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 0x0015);
        assert_eq!(frames[0].1[0], 200);
        assert_eq!(frames[0].1.len(), 512);
    }

    #[test]
    fn test_dmx_for_unsubscribed_universe_is_dropped() {
        let dispatcher = Dispatcher::new(vec![]);
        let consumer = Recording::new();
        dispatcher.set_consumer(0x0001, Arc::clone(&consumer) as Arc<dyn DmxConsumer>);

        dispatcher.handle_datagram(&dmx_bytes(0x02, 0, 9), src());

        assert!(consumer.frames().is_empty());
    }

    #[test]
    fn test_removed_consumer_no_longer_receives() {
        let dispatcher = Dispatcher::new(vec![]);
        let consumer = Recording::new();
        dispatcher.set_consumer(0x0015, Arc::clone(&consumer) as Arc<dyn DmxConsumer>);
        dispatcher.remove_consumer(0x0015);

        dispatcher.handle_datagram(&dmx_bytes(0x15, 0, 1), src());

        assert!(consumer.frames().is_empty());
    }

    #[test]
    fn test_malformed_datagram_is_dropped_without_panic() {
        let dispatcher = Dispatcher::new(vec![]);
        dispatcher.handle_datagram(b"garbage", src());
        dispatcher.handle_datagram(&[], src());
        dispatcher.handle_datagram(b"Art-Net\0\xFF\xFF", src());
    }

    #[test]
    fn test_poll_records_controller_liveness() {
        let dispatcher = Dispatcher::new(vec![]);
        let mut poll = artnet_core::protocol::packets::SIGNATURE.to_vec();
        poll.extend_from_slice(&0x2000u16.to_le_bytes());

        dispatcher.handle_datagram(&poll, src());

        assert_eq!(dispatcher.online_controllers(), 1);
        assert_eq!(dispatcher.sweep_controllers(Duration::from_secs(60)), 0);
    }

    #[test]
    fn test_host_allow_list_filters_sources() {
        let allowed: IpAddr = "192.168.1.77".parse().unwrap();
        let dispatcher = Dispatcher::new(vec![allowed]);
        let consumer = Recording::new();
        dispatcher.set_consumer(0x0000, Arc::clone(&consumer) as Arc<dyn DmxConsumer>);

        dispatcher.handle_datagram(&dmx_bytes(0, 0, 50), src());
        dispatcher.handle_datagram(&dmx_bytes(0, 0, 99), "10.9.9.9:6454".parse().unwrap());

        let frames = consumer.frames();
        assert_eq!(frames.len(), 1, "only the allow-listed source delivers");
        assert_eq!(frames[0].1[0], 50);
    }
}
