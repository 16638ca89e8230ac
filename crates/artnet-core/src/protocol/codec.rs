//! Binary codec for encoding and decoding Art-Net packets.
//!
//! Wire format common to all packets:
//! ```text
//! [signature:8]["Art-Net\0"][opcode:2 little-endian][packet-specific fields]
//! ```
//! All remaining multi-byte integers are big-endian, with one exception: the
//! ESTA manufacturer code in ArtPollReply is transmitted byte-swapped.
//!
//! # Encoding rules
//!
//! String fields longer than their slot are silently **truncated**, never
//! rejected; shorter strings are null-padded to the slot size.  Numeric
//! fields wrap per their fixed-width semantics.  The codec performs no range
//! validation — net/subnet/universe bounds are the caller's responsibility
//! (see [`crate::domain::universe::UniverseAddress`]).

use thiserror::Error;

use crate::protocol::packets::{
    ArtPacket, DmxPacket, Opcode, PollReplyPacket, DMX_CHANNELS, DMX_HEADER_SIZE, DMX_PACKET_SIZE,
    OPCODE_OFFSET, POLL_REPLY_SIZE, PROTOCOL_VERSION, SIGNATURE,
};

/// Errors that can occur while decoding an inbound datagram.
///
/// The dispatch loop treats every variant as "drop this datagram"; decoding
/// never panics and never aborts the receive task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The datagram is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The first eight bytes are not the `"Art-Net\0"` signature.
    #[error("bad packet signature")]
    BadSignature,

    /// The opcode at byte offset 8 is not one this engine recognizes.
    #[error("unknown opcode: 0x{0:04X}")]
    UnknownOpcode(u16),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes an ArtDmx packet into its fixed 530-byte wire form.
///
/// The sequence number is **not** assigned here — pass a pre-advanced value
/// from a [`crate::protocol::sequence::DmxSequence`] so that 0 never reaches
/// the wire.
pub fn encode_dmx(pkt: &DmxPacket) -> Vec<u8> {
    let mut buf = Vec::with_capacity(DMX_PACKET_SIZE);
    buf.extend_from_slice(&SIGNATURE);
    buf.extend_from_slice(&(Opcode::Dmx as u16).to_le_bytes());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    buf.push(pkt.sequence);
    buf.push(pkt.physical);
    buf.push(pkt.sub_universe);
    buf.push(pkt.net);
    buf.extend_from_slice(&(DMX_CHANNELS as u16).to_be_bytes());
    buf.extend_from_slice(&pkt.channels);
    buf
}

/// Encodes an ArtPollReply packet into its fixed 213-byte wire form.
pub fn encode_poll_reply(pkt: &PollReplyPacket) -> Vec<u8> {
    let mut buf = Vec::with_capacity(POLL_REPLY_SIZE);
    buf.extend_from_slice(&SIGNATURE);
    buf.extend_from_slice(&(Opcode::PollReply as u16).to_le_bytes());
    buf.extend_from_slice(&pkt.ip.octets());
    buf.extend_from_slice(&pkt.port.to_be_bytes());
    buf.extend_from_slice(&pkt.firmware.to_be_bytes());
    buf.push(pkt.net_switch);
    buf.push(pkt.sub_switch);
    buf.extend_from_slice(&pkt.oem.to_be_bytes());
    buf.push(pkt.ubea);
    buf.push(pkt.status1);
    // ESTA goes out byte-swapped relative to every other 16-bit field.
    buf.extend_from_slice(&pkt.esta.to_le_bytes());
    write_padded_str(&mut buf, &pkt.short_name, 18, 16);
    write_padded_str(&mut buf, &pkt.long_name, 64, 63);
    write_padded_str(&mut buf, &pkt.node_report, 64, 63);
    buf.extend_from_slice(&pkt.port_count.to_be_bytes());
    buf.extend_from_slice(&pkt.port_types);
    buf.extend_from_slice(&pkt.good_input);
    buf.extend_from_slice(&pkt.good_output);
    buf.extend_from_slice(&pkt.sw_in);
    buf.extend_from_slice(&pkt.sw_out);
    // Three spare words (video/macro/remote switches, unused by this engine).
    buf.extend_from_slice(&[0u8; 6]);
    buf.push(pkt.style);
    buf.extend_from_slice(&pkt.mac);
    buf.extend_from_slice(&pkt.bind_ip.octets());
    buf.push(pkt.bind_index);
    buf.push(pkt.status2);
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one Art-Net packet from an inbound datagram.
///
/// # Errors
///
/// Returns [`ProtocolError`] when the datagram is too short, carries the
/// wrong signature, or an opcode outside the poll / poll-reply / DMX set.
pub fn decode_packet(bytes: &[u8]) -> Result<ArtPacket, ProtocolError> {
    require_len(bytes, OPCODE_OFFSET + 2)?;
    if bytes[..8] != SIGNATURE {
        return Err(ProtocolError::BadSignature);
    }

    let raw = u16::from_le_bytes([bytes[OPCODE_OFFSET], bytes[OPCODE_OFFSET + 1]]);
    let opcode = Opcode::try_from(raw).map_err(|_| ProtocolError::UnknownOpcode(raw))?;

    match opcode {
        Opcode::Poll => Ok(ArtPacket::Poll),
        Opcode::PollReply => decode_poll_reply(bytes).map(ArtPacket::PollReply),
        Opcode::Dmx => decode_dmx(bytes).map(ArtPacket::Dmx),
    }
}

fn decode_dmx(bytes: &[u8]) -> Result<DmxPacket, ProtocolError> {
    require_len(bytes, DMX_HEADER_SIZE)?;
    let sequence = bytes[12];
    let physical = bytes[13];
    let sub_universe = bytes[14];
    let net = bytes[15];
    let declared = u16::from_be_bytes([bytes[16], bytes[17]]) as usize;
    require_len(bytes, DMX_HEADER_SIZE + declared)?;

    // Tolerate short frames from other implementations: copy what is present,
    // leave the remainder of the universe at zero.
    let take = declared.min(DMX_CHANNELS);
    let mut channels = [0u8; DMX_CHANNELS];
    channels[..take].copy_from_slice(&bytes[DMX_HEADER_SIZE..DMX_HEADER_SIZE + take]);

    Ok(DmxPacket {
        sequence,
        physical,
        sub_universe,
        net,
        channels,
    })
}

fn decode_poll_reply(bytes: &[u8]) -> Result<PollReplyPacket, ProtocolError> {
    require_len(bytes, POLL_REPLY_SIZE)?;
    Ok(PollReplyPacket {
        ip: [bytes[10], bytes[11], bytes[12], bytes[13]].into(),
        port: u16::from_be_bytes([bytes[14], bytes[15]]),
        firmware: u16::from_be_bytes([bytes[16], bytes[17]]),
        net_switch: bytes[18],
        sub_switch: bytes[19],
        oem: u16::from_be_bytes([bytes[20], bytes[21]]),
        ubea: bytes[22],
        status1: bytes[23],
        esta: u16::from_le_bytes([bytes[24], bytes[25]]),
        short_name: read_padded_str(&bytes[26..44]),
        long_name: read_padded_str(&bytes[44..108]),
        node_report: read_padded_str(&bytes[108..172]),
        port_count: u16::from_be_bytes([bytes[172], bytes[173]]),
        port_types: bytes[174..178].try_into().expect("slice is 4 bytes"),
        good_input: bytes[178..182].try_into().expect("slice is 4 bytes"),
        good_output: bytes[182..186].try_into().expect("slice is 4 bytes"),
        sw_in: bytes[186..190].try_into().expect("slice is 4 bytes"),
        sw_out: bytes[190..194].try_into().expect("slice is 4 bytes"),
        // bytes[194..200] are the spare words – ignored on decode
        style: bytes[200],
        mac: bytes[201..207].try_into().expect("slice is 6 bytes"),
        bind_ip: [bytes[207], bytes[208], bytes[209], bytes[210]].into(),
        bind_index: bytes[211],
        status2: bytes[212],
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Writes `s` into a fixed `slot`-byte field, truncated to `max_used` bytes
/// and null-padded.  `max_used < slot` keeps the field null-terminated even
/// at maximum length, matching the 18/16 and 64/63 slot rules.
fn write_padded_str(buf: &mut Vec<u8>, s: &str, slot: usize, max_used: usize) {
    let bytes = s.as_bytes();
    let take = bytes.len().min(max_used);
    buf.extend_from_slice(&bytes[..take]);
    buf.extend(std::iter::repeat(0u8).take(slot - take));
}

/// Reads a null-padded fixed-width string field, dropping trailing nulls.
fn read_padded_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
