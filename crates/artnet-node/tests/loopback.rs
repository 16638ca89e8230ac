//! Integration tests over loopback UDP.
//!
//! These exercise the sender's transmit task, the node's inbound receive
//! loop, and the dispatcher together through real sockets on 127.0.0.1,
//! decoding what actually lands on the wire.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use artnet_core::{decode_packet, ArtPacket, DMX_CHANNELS, SIGNATURE};
use artnet_node::net::retry::RetryPolicy;
use artnet_node::node::{ArtNetNode, NodeConfig};
use artnet_node::registry::BindingRegistry;
use artnet_node::sender::{DmxSender, SenderOptions};
use artnet_node::DmxConsumer;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer that records every handed-off frame.
#[derive(Default)]
struct Recording {
    frames: Mutex<Vec<(u16, Vec<u8>)>>,
}

impl DmxConsumer for Recording {
    fn receive(&self, port_address: u16, channels: &[u8; DMX_CHANNELS]) {
        self.frames
            .lock()
            .unwrap()
            .push((port_address, channels.to_vec()));
    }
}

fn loopback_options(port: u16) -> SenderOptions {
    SenderOptions {
        destination: IpAddr::from([127, 0, 0, 1]),
        port,
        refresh_interval: Duration::from_millis(50),
        ..SenderOptions::default()
    }
}

/// Receives frames until `pred` matches one, or the timeout expires.
async fn recv_matching<F>(socket: &UdpSocket, pred: F) -> ArtPacket
where
    F: Fn(&ArtPacket) -> bool,
{
    let mut buf = [0u8; 1024];
    timeout(RECV_TIMEOUT, async {
        loop {
            let (len, _) = socket.recv_from(&mut buf).await.expect("recv");
            if let Ok(packet) = decode_packet(&buf[..len]) {
                if pred(&packet) {
                    return packet;
                }
            }
        }
    })
    .await
    .expect("no matching packet before timeout")
}

#[tokio::test]
async fn test_sender_frames_decode_on_the_wire() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let registry = Arc::new(Mutex::new(BindingRegistry::new()));
    let options = SenderOptions {
        net: 0,
        subnet: 1,
        universe: 2,
        ..loopback_options(port)
    };
    let sender = DmxSender::spawn(options, registry, RetryPolicy::default()).unwrap();
    sender.set_channel(0, 255).unwrap();
    sender.set_channel(511, 300).unwrap(); // clamps to 255

    // Skip frames sent before both mutations were applied.
    let packet = recv_matching(&receiver, |p| {
        matches!(p, ArtPacket::Dmx(d) if d.channels[0] == 255 && d.channels[511] == 255)
    })
    .await;

    let ArtPacket::Dmx(dmx) = packet else {
        panic!("expected a DMX packet");
    };
    assert_eq!(dmx.port_address(), 0x0012);
    assert_eq!(dmx.channels[511], 255, "value must be clamped, not dropped");
    assert_ne!(dmx.sequence, 0);
}

#[tokio::test]
async fn test_sequence_is_never_zero_across_heartbeats() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let registry = Arc::new(Mutex::new(BindingRegistry::new()));
    let _sender =
        DmxSender::spawn(loopback_options(port), registry, RetryPolicy::default()).unwrap();

    // 10 frames arrive within ~500ms at the 50ms heartbeat.
    let mut buf = [0u8; 1024];
    let mut sequences = Vec::new();
    while sequences.len() < 10 {
        let (len, _) = timeout(RECV_TIMEOUT, receiver.recv_from(&mut buf))
            .await
            .expect("heartbeat stopped")
            .unwrap();
        if let Ok(ArtPacket::Dmx(dmx)) = decode_packet(&buf[..len]) {
            sequences.push(dmx.sequence);
        }
    }

    assert!(sequences.iter().all(|&s| s != 0));
    for pair in sequences.windows(2) {
        let expected = if pair[0] == 255 { 1 } else { pair[0] + 1 };
        assert_eq!(pair[1], expected, "sequence must be cyclic and gap-free");
    }
}

#[tokio::test]
async fn test_no_frames_arrive_after_stop_returns() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let registry = Arc::new(Mutex::new(BindingRegistry::new()));
    let options = SenderOptions {
        refresh_interval: Duration::from_millis(10),
        ..loopback_options(port)
    };
    let sender = DmxSender::spawn(options, registry, RetryPolicy::default()).unwrap();

    // The heartbeat must be running before we try to stop it.
    let mut buf = [0u8; 1024];
    timeout(RECV_TIMEOUT, receiver.recv_from(&mut buf))
        .await
        .expect("heartbeat never started")
        .unwrap();

    sender.stop().await;

    // Frames sent before stop() returned may still sit in the loopback
    // receive buffer; drain them first.
    while timeout(Duration::from_millis(100), receiver.recv_from(&mut buf))
        .await
        .is_ok()
    {}

    // 30 heartbeat periods of silence: the timer is provably dead.
    assert!(
        timeout(Duration::from_millis(300), receiver.recv_from(&mut buf))
            .await
            .is_err(),
        "a frame was transmitted after stop() returned"
    );
}

#[tokio::test]
async fn test_node_dispatches_inbound_dmx_to_consumer() {
    let config = NodeConfig {
        port: 0, // ephemeral, read back via listen_addr()
        ..NodeConfig::default()
    };
    let node = ArtNetNode::new(config, RetryPolicy::default()).await.unwrap();
    let inbound_port = node.listen_addr().port();

    let consumer = Arc::new(Recording::default());
    let receiver = node
        .new_receiver(0, 0, 7, None, Arc::clone(&consumer) as Arc<dyn DmxConsumer>)
        .await
        .unwrap();
    assert_eq!(receiver.address().port_address(), 0x0007);

    // Drive a real sender at the node's inbound socket.
    let registry = Arc::new(Mutex::new(BindingRegistry::new()));
    let options = SenderOptions {
        universe: 7,
        ..loopback_options(inbound_port)
    };
    let sender = DmxSender::spawn(options, registry, RetryPolicy::default()).unwrap();
    sender.fill_channels(0, 9, 128).unwrap();

    let frame = timeout(RECV_TIMEOUT, async {
        loop {
            {
                let frames = consumer.frames.lock().unwrap();
                if let Some(frame) = frames.iter().find(|(_, ch)| ch[0] == 128) {
                    return frame.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("consumer never saw the frame");

    assert_eq!(frame.0, 0x0007);
    assert_eq!(&frame.1[..10], &[128u8; 10]);
    assert_eq!(frame.1[10], 0);
}

#[tokio::test]
async fn test_node_records_controller_on_poll() {
    let node = ArtNetNode::new(
        NodeConfig {
            port: 0,
            ..NodeConfig::default()
        },
        RetryPolicy::default(),
    )
    .await
    .unwrap();
    let target = SocketAddr::from(([127, 0, 0, 1], node.listen_addr().port()));

    // Minimal ArtPoll: signature, opcode 0x2000 little-endian, protocol
    // version, TalkToMe, priority.
    let mut poll = Vec::new();
    poll.extend_from_slice(&SIGNATURE);
    poll.extend_from_slice(&[0x00, 0x20, 0x00, 0x0E, 0x00, 0x00]);

    let controller = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    controller.send_to(&poll, target).await.unwrap();

    timeout(RECV_TIMEOUT, async {
        while node.dispatcher().online_controllers() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("poll was never recorded");

    assert_eq!(node.dispatcher().online_controllers(), 1);
}

#[tokio::test]
async fn test_invalid_sender_entry_is_side_effect_free() {
    let node = ArtNetNode::new(
        NodeConfig {
            port: 0,
            ..NodeConfig::default()
        },
        RetryPolicy::default(),
    )
    .await
    .unwrap();

    let options = SenderOptions {
        net: 128, // one past the 7-bit maximum
        ..loopback_options(6454)
    };
    assert!(node.new_sender(options).await.is_err());

    // A valid sender afterwards still gets bind index 1 in replies, which
    // would not hold if the failed construction had leaked a registration.
    let sender = node.new_sender(loopback_options(6454)).await.unwrap();
    assert_eq!(sender.address().port_address(), 0);
}
