//! Protocol module containing packet types, the binary codec, and counters.

pub mod codec;
pub mod packets;
pub mod sequence;

pub use codec::{decode_packet, encode_dmx, encode_poll_reply, ProtocolError};
pub use packets::*;
pub use sequence::{BindIndex, DmxSequence, PollReplyCounter};
