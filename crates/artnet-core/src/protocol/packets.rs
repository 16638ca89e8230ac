//! Art-Net packet types and wire-level constants.
//!
//! Only the three opcodes this node actually speaks are modelled:
//! ArtPoll (inbound discovery probe), ArtPollReply (our presence broadcast),
//! and ArtDmx (one universe's worth of channel data).  Everything else in the
//! Art-Net opcode space is out of scope and is dropped on decode.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Well-known Art-Net UDP port.
pub const ARTNET_PORT: u16 = 6454;

/// Eight-byte packet signature: `"Art-Net"` followed by a null terminator.
pub const SIGNATURE: [u8; 8] = *b"Art-Net\0";

/// Protocol revision carried in ArtDmx packets (big-endian on the wire).
pub const PROTOCOL_VERSION: u16 = 14;

/// Channels per DMX512 universe.  Every ArtDmx frame we emit carries exactly
/// this many data bytes.
pub const DMX_CHANNELS: usize = 512;

/// Fixed ArtDmx header size; channel data starts at this offset.
pub const DMX_HEADER_SIZE: usize = 18;

/// Total encoded size of an ArtDmx packet.
pub const DMX_PACKET_SIZE: usize = DMX_HEADER_SIZE + DMX_CHANNELS;

/// Total encoded size of an ArtPollReply packet.
pub const POLL_REPLY_SIZE: usize = 213;

/// Byte offset of the 16-bit opcode within every Art-Net packet.
pub const OPCODE_OFFSET: usize = 8;

/// Firmware revision advertised in poll replies.
pub const FIRMWARE_VERSION: u16 = 0x0001;

// ── Port flag bytes used in ArtPollReply ──────────────────────────────────────

/// Port-types flag: this port can output data from the network (a sender).
pub const PORT_TYPE_CAN_OUTPUT: u8 = 0b0100_0000;

/// Port-types flag: this port can input data onto the network (a receiver).
pub const PORT_TYPE_CAN_INPUT: u8 = 0b1000_0000;

/// Good-input / good-output flag: data is being transferred on this port.
pub const GOOD_PORT_DATA: u8 = 0b1000_0000;

/// Style code for a DMX-to-Ethernet node.
pub const STYLE_NODE: u8 = 0x01;

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// The Art-Net opcodes this engine recognizes.
///
/// The opcode is transmitted **little-endian** at byte offset 8, unlike the
/// remaining multi-byte fields which are big-endian.  `0x5000` on the wire is
/// therefore the byte pair `0x00 0x50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Opcode {
    /// ArtPoll: a controller asking nodes to identify themselves.
    Poll = 0x2000,
    /// ArtPollReply: a node advertising its identity and port bindings.
    PollReply = 0x2100,
    /// ArtDmx: one universe of channel data.
    Dmx = 0x5000,
}

impl TryFrom<u16> for Opcode {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x2000 => Ok(Opcode::Poll),
            0x2100 => Ok(Opcode::PollReply),
            0x5000 => Ok(Opcode::Dmx),
            _ => Err(()),
        }
    }
}

// ── ArtDmx ────────────────────────────────────────────────────────────────────

/// ArtDmx (0x5000): one 512-channel frame addressed to a single universe.
///
/// Wire layout (530 bytes total):
/// ```text
/// [signature:8][opcode:2 LE][proto_ver:2 BE][sequence:1][physical:1]
/// [sub_universe:1][net:1][length:2 BE][channels:512]
/// ```
/// The 15-bit port address reads little-endian across bytes 14–15:
/// `sub_universe | net << 8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmxPacket {
    /// Cyclic transmission counter, 1..=255.  Zero is never sent; receivers
    /// treat 0 as "sequence disabled".
    pub sequence: u8,
    /// Physical input port the data originated from.  Always 0 for us.
    pub physical: u8,
    /// Packed subnet/universe nibbles: `(subnet << 4) | universe`.
    pub sub_universe: u8,
    /// Net switch, 0..=127.
    pub net: u8,
    /// The full universe payload.  Always exactly 512 bytes on the wire.
    pub channels: [u8; DMX_CHANNELS],
}

impl DmxPacket {
    /// The 16-bit port address receivers key their universe lookup on.
    pub fn port_address(&self) -> u16 {
        u16::from(self.sub_universe) | (u16::from(self.net) << 8)
    }
}

// ── ArtPollReply ──────────────────────────────────────────────────────────────

/// ArtPollReply (0x2100): a node describing one port binding on one interface.
///
/// A node broadcasting N senders over M interfaces emits N×M of these per
/// broadcast round, each with its own bind index.  213 bytes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReplyPacket {
    /// IPv4 address of the interface this reply describes.
    pub ip: Ipv4Addr,
    /// UDP port the node listens on (normally [`ARTNET_PORT`]).
    pub port: u16,
    /// Firmware revision, [`FIRMWARE_VERSION`].
    pub firmware: u16,
    /// Net switch of the described binding.
    pub net_switch: u8,
    /// Subnet switch of the described binding.
    pub sub_switch: u8,
    /// OEM code identifying the product.
    pub oem: u16,
    /// UBEA firmware version; 0 when no UBEA is present.
    pub ubea: u8,
    /// Status bitfield #1 (indicator state, port-address programming authority).
    pub status1: u8,
    /// ESTA manufacturer code.  Transmitted byte-swapped relative to the
    /// other 16-bit fields.
    pub esta: u16,
    /// Short node name; occupies an 18-byte slot, at most 16 bytes used.
    pub short_name: String,
    /// Long node name; occupies a 64-byte slot, at most 63 bytes used.
    pub long_name: String,
    /// Free-form status report, e.g. `#0001 [0042] dmxnet ArtNet-Transceiver running`.
    pub node_report: String,
    /// Number of ports described by this reply (0 or 1 for this engine).
    pub port_count: u16,
    /// Per-port capability flags ([`PORT_TYPE_CAN_OUTPUT`] / [`PORT_TYPE_CAN_INPUT`]).
    pub port_types: [u8; 4],
    /// Per-port input status flags.
    pub good_input: [u8; 4],
    /// Per-port output status flags.
    pub good_output: [u8; 4],
    /// Per-port input universe nibbles.
    pub sw_in: [u8; 4],
    /// Per-port output universe nibbles.
    pub sw_out: [u8; 4],
    /// Style code, [`STYLE_NODE`] for us.
    pub style: u8,
    /// Hardware address of the interface.
    pub mac: [u8; 6],
    /// The IP this binding is rooted at (same as `ip` for single-homed ports).
    pub bind_ip: Ipv4Addr,
    /// 1-based index of this binding within the node; wraps to 1 past 255.
    pub bind_index: u8,
    /// Status bitfield #2 (DHCP capability, 15-bit addressing support).
    pub status2: u8,
}

// ── Decoded packet sum type ───────────────────────────────────────────────────

/// A decoded inbound Art-Net packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtPacket {
    /// An ArtPoll probe.  Recognized by opcode only; this engine records the
    /// controller's presence and nothing else.
    Poll,
    /// Another node's presence broadcast.
    PollReply(PollReplyPacket),
    /// A universe of channel data.
    Dmx(DmxPacket),
}

impl ArtPacket {
    /// Returns the [`Opcode`] discriminant for this packet.
    pub fn opcode(&self) -> Opcode {
        match self {
            ArtPacket::Poll => Opcode::Poll,
            ArtPacket::PollReply(_) => Opcode::PollReply,
            ArtPacket::Dmx(_) => Opcode::Dmx,
        }
    }
}
