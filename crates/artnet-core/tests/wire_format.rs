//! Integration tests for the artnet-core wire format.
//!
//! These go through the public crate API only, pinning the byte layout a
//! real controller would see rather than re-testing each codec function.

use std::net::Ipv4Addr;

use artnet_core::{
    decode_packet, encode_dmx, encode_poll_reply, ArtPacket, DmxPacket, DmxSequence,
    PollReplyPacket, UniverseAddress, DMX_CHANNELS, FIRMWARE_VERSION, GOOD_PORT_DATA,
    PORT_TYPE_CAN_OUTPUT, SIGNATURE, STYLE_NODE,
};

fn sample_reply() -> PollReplyPacket {
    PollReplyPacket {
        ip: Ipv4Addr::new(192, 168, 1, 10),
        port: 6454,
        firmware: FIRMWARE_VERSION,
        net_switch: 0,
        sub_switch: 1,
        oem: 0x2908,
        ubea: 0,
        status1: 0b1101_0000,
        esta: 0x02AE,
        short_name: "AD ArtNet".to_string(),
        long_name: "Audience Display Artnet Node".to_string(),
        node_report: "#0001 [0003] dmxnet ArtNet-Transceiver running".to_string(),
        port_count: 1,
        port_types: [PORT_TYPE_CAN_OUTPUT, 0, 0, 0],
        good_input: [GOOD_PORT_DATA, 0, 0, 0],
        good_output: [0; 4],
        sw_in: [2, 0, 0, 0],
        sw_out: [0; 4],
        style: STYLE_NODE,
        mac: [0x02, 0x42, 0xac, 0x11, 0x00, 0x02],
        bind_ip: Ipv4Addr::new(192, 168, 1, 10),
        bind_index: 1,
        status2: 0b0000_1110,
    }
}

#[test]
fn test_dmx_frame_as_a_controller_sees_it() {
    let address = UniverseAddress::new(0, 1, 2, None).unwrap();
    let sequence = DmxSequence::new();
    let mut channels = [0u8; DMX_CHANNELS];
    channels[0] = 255;
    channels[256] = 64;

    let bytes = encode_dmx(&DmxPacket {
        sequence: sequence.next(),
        physical: 0,
        sub_universe: address.sub_universe(),
        net: address.net(),
        channels,
    });

    assert_eq!(&bytes[..8], &SIGNATURE);
    assert_eq!(&bytes[8..10], &[0x00, 0x50], "DMX opcode is little-endian");
    assert_eq!(bytes[14], 0x12, "sub-universe carries subnet|universe nibbles");

    let ArtPacket::Dmx(decoded) = decode_packet(&bytes).unwrap() else {
        panic!("expected a DMX packet");
    };
    assert_eq!(decoded.sequence, 1);
    assert_eq!(decoded.port_address(), address.port_address());
    assert_eq!(decoded.channels[0], 255);
    assert_eq!(decoded.channels[256], 64);
}

#[test]
fn test_poll_reply_survives_the_wire() {
    let original = sample_reply();
    let bytes = encode_poll_reply(&original);

    assert_eq!(&bytes[8..10], &[0x00, 0x21], "reply opcode is little-endian");

    let ArtPacket::PollReply(decoded) = decode_packet(&bytes).unwrap() else {
        panic!("expected a poll reply");
    };
    assert_eq!(decoded, original);
}

#[test]
fn test_esta_is_byte_swapped_relative_to_port() {
    let reply = sample_reply();
    let bytes = encode_poll_reply(&reply);

    // Port at offset 14 is big-endian, ESTA at offset 24 is swapped.
    assert_eq!(&bytes[14..16], &6454u16.to_be_bytes());
    assert_eq!(&bytes[24..26], &0x02AEu16.to_le_bytes());
}

#[test]
fn test_foreign_traffic_is_rejected_not_misread() {
    assert!(decode_packet(b"NotArtNe\x00\x50").is_err());
    assert!(decode_packet(&SIGNATURE[..5]).is_err());

    let mut unknown = Vec::from(SIGNATURE);
    unknown.extend_from_slice(&[0x00, 0x60]); // OpAddress, unhandled
    assert!(decode_packet(&unknown).is_err());
}
