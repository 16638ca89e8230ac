//! # artnet-core
//!
//! Shared library for the Art-Net node engine containing the binary packet
//! codec, wire-level counters, and the DMX domain model.
//!
//! This crate is pure: it has zero dependencies on sockets, timers, or OS
//! APIs.  Everything here can be exercised byte-for-byte in unit tests.
//!
//! # Architecture overview (for beginners)
//!
//! Art-Net is a UDP broadcast protocol that carries DMX512 lighting data over
//! ordinary IP networks.  A *universe* is one independently addressed block of
//! 512 one-byte channels; a fixture listens to some universe and maps a few of
//! its channels to intensity, colour, pan, and so on.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel over the network.  The three packet
//!   kinds in use (ArtPoll, ArtPollReply, ArtDmx) are encoded into their fixed
//!   binary layouts and decoded back into typed Rust structs.
//!
//! - **`domain`** – Pure lighting-domain logic: the net/subnet/universe
//!   addressing triple with its packed wire form, and the 512-channel buffer
//!   with its clamping rules.
//!
//! The socket-facing node engine lives in the `artnet-node` crate and builds
//! entirely on the types exported here.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `artnet_core::DmxPacket` instead of `artnet_core::protocol::packets::DmxPacket`.
pub use domain::channels::{ChannelBuffer, ChannelError};
pub use domain::universe::{AddressError, UniverseAddress};
pub use protocol::codec::{decode_packet, encode_dmx, encode_poll_reply, ProtocolError};
pub use protocol::packets::{
    ArtPacket, DmxPacket, Opcode, PollReplyPacket, ARTNET_PORT, DMX_CHANNELS, FIRMWARE_VERSION,
    GOOD_PORT_DATA, PORT_TYPE_CAN_INPUT, PORT_TYPE_CAN_OUTPUT, SIGNATURE, STYLE_NODE,
};
pub use protocol::sequence::{BindIndex, DmxSequence, PollReplyCounter};
