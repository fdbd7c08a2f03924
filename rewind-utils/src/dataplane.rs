//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, Bytes, TryGetError};

use crate::fingerprint::DpFingerprint;
use crate::mac_addr::MacAddr;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_VLAN: u16 = 0x8100;

pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

// Dataplane frame decode errors.
#[derive(Debug, Eq, PartialEq)]
pub enum DecodeError {
    IncompleteFrame,
    ReadOutOfBounds,
}

// ===== global functions =====

/// Summarizes a raw Ethernet frame into its dataplane fingerprint.
///
/// Always captures the Ethernet addresses and ethertype (past any
/// single 802.1Q tag); IPv4 frames additionally contribute the 5-tuple
/// and ARP frames the operation and sender/target addresses. Unknown
/// payloads fingerprint at the frame level only.
pub fn dp_fingerprint(frame: &[u8]) -> Result<DpFingerprint, DecodeError> {
    let mut buf = Bytes::copy_from_slice(frame);
    if frame.len() < 14 {
        return Err(DecodeError::IncompleteFrame);
    }

    let mut fingerprint = DpFingerprint::default();

    let mut dl_dst = [0u8; 6];
    buf.copy_to_slice(&mut dl_dst);
    let mut dl_src = [0u8; 6];
    buf.copy_to_slice(&mut dl_src);
    let mut dl_type = buf.try_get_u16()?;
    if dl_type == ETHERTYPE_VLAN {
        let _tci = buf.try_get_u16()?;
        dl_type = buf.try_get_u16()?;
    }
    fingerprint.dl_dst = Some(MacAddr::from(dl_dst));
    fingerprint.dl_src = Some(MacAddr::from(dl_src));
    fingerprint.dl_type = Some(dl_type);

    match dl_type {
        ETHERTYPE_IPV4 => decode_ipv4(buf, &mut fingerprint)?,
        ETHERTYPE_ARP => decode_arp(buf, &mut fingerprint)?,
        _ => (),
    }

    Ok(fingerprint)
}

// ===== helper functions =====

fn decode_ipv4(
    mut buf: Bytes,
    fingerprint: &mut DpFingerprint,
) -> Result<(), DecodeError> {
    let ver_ihl = buf.try_get_u8()?;
    let ihl = (ver_ihl & 0x0f) as usize * 4;
    if ihl < 20 {
        return Err(DecodeError::IncompleteFrame);
    }
    let _tos = buf.try_get_u8()?;
    let _total_len = buf.try_get_u16()?;
    let _id = buf.try_get_u16()?;
    let _frag = buf.try_get_u16()?;
    let _ttl = buf.try_get_u8()?;
    let nw_proto = buf.try_get_u8()?;
    let _cksum = buf.try_get_u16()?;
    let nw_src = buf.try_get_u32()?;
    let nw_dst = buf.try_get_u32()?;
    fingerprint.nw_proto = Some(nw_proto);
    fingerprint.nw_src = Some(Ipv4Addr::from(nw_src));
    fingerprint.nw_dst = Some(Ipv4Addr::from(nw_dst));

    // Skip IP options, then the transport ports for TCP/UDP.
    if buf.remaining() < ihl - 20 {
        return Err(DecodeError::IncompleteFrame);
    }
    buf.advance(ihl - 20);
    if matches!(nw_proto, IP_PROTO_TCP | IP_PROTO_UDP) {
        fingerprint.tp_src = Some(buf.try_get_u16()?);
        fingerprint.tp_dst = Some(buf.try_get_u16()?);
    }

    Ok(())
}

fn decode_arp(
    mut buf: Bytes,
    fingerprint: &mut DpFingerprint,
) -> Result<(), DecodeError> {
    let _htype = buf.try_get_u16()?;
    let _ptype = buf.try_get_u16()?;
    let hlen = buf.try_get_u8()?;
    let plen = buf.try_get_u8()?;
    if hlen != 6 || plen != 4 {
        // Only Ethernet/IPv4 ARP contributes protocol fields.
        return Ok(());
    }
    let arp_op = buf.try_get_u16()?;
    if buf.remaining() < 20 {
        return Err(DecodeError::IncompleteFrame);
    }
    buf.advance(6); // sender hardware address
    let arp_spa = buf.try_get_u32()?;
    buf.advance(6); // target hardware address
    let arp_tpa = buf.try_get_u32()?;
    fingerprint.arp_op = Some(arp_op);
    fingerprint.arp_spa = Some(Ipv4Addr::from(arp_spa));
    fingerprint.arp_tpa = Some(Ipv4Addr::from(arp_tpa));

    Ok(())
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IncompleteFrame => {
                write!(f, "incomplete dataplane frame")
            }
            DecodeError::ReadOutOfBounds => {
                write!(f, "attempt to read out of bounds")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<TryGetError> for DecodeError {
    fn from(_error: TryGetError) -> DecodeError {
        DecodeError::ReadOutOfBounds
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn udp_frame() -> Vec<u8> {
        let mut frame = vec![];
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 2]); // dl_dst
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 1]); // dl_src
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.push(0x45); // version + ihl
        frame.push(0); // tos
        frame.extend_from_slice(&28u16.to_be_bytes()); // total length
        frame.extend_from_slice(&[0; 4]); // id + frag
        frame.push(64); // ttl
        frame.push(IP_PROTO_UDP);
        frame.extend_from_slice(&[0; 2]); // checksum
        frame.extend_from_slice(&[10, 0, 0, 1]); // nw_src
        frame.extend_from_slice(&[10, 0, 0, 2]); // nw_dst
        frame.extend_from_slice(&4000u16.to_be_bytes()); // tp_src
        frame.extend_from_slice(&53u16.to_be_bytes()); // tp_dst
        frame
    }

    #[test]
    fn test_udp_fingerprint() {
        let fp = dp_fingerprint(&udp_frame()).unwrap();
        assert_eq!(fp.dl_type, Some(ETHERTYPE_IPV4));
        assert_eq!(fp.nw_src, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(fp.nw_dst, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(fp.nw_proto, Some(IP_PROTO_UDP));
        assert_eq!(fp.tp_src, Some(4000));
        assert_eq!(fp.tp_dst, Some(53));
    }

    #[test]
    fn test_arp_fingerprint() {
        let mut frame = vec![];
        frame.extend_from_slice(&[0xff; 6]); // dl_dst (broadcast)
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 1]); // dl_src
        frame.extend_from_slice(&ETHERTYPE_ARP.to_be_bytes());
        frame.extend_from_slice(&1u16.to_be_bytes()); // htype
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes()); // ptype
        frame.push(6); // hlen
        frame.push(4); // plen
        frame.extend_from_slice(&1u16.to_be_bytes()); // oper (request)
        frame.extend_from_slice(&[0, 0, 0, 0, 0, 1]); // sha
        frame.extend_from_slice(&[10, 0, 0, 1]); // spa
        frame.extend_from_slice(&[0; 6]); // tha
        frame.extend_from_slice(&[10, 0, 0, 2]); // tpa

        let fp = dp_fingerprint(&frame).unwrap();
        assert_eq!(fp.dl_dst, Some(MacAddr::BROADCAST));
        assert_eq!(fp.arp_op, Some(1));
        assert_eq!(fp.arp_spa, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(fp.arp_tpa, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(fp.nw_src, None);
    }

    #[test]
    fn test_truncated_frame() {
        assert_eq!(
            dp_fingerprint(&[0; 10]),
            Err(DecodeError::IncompleteFrame)
        );
    }
}
