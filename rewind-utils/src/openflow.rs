//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::{Buf, Bytes, TryGetError};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{FingerprintValue, OfFingerprint};

pub const OFP_VERSION: u8 = 0x01;
pub const OFP_HEADER_LEN: usize = 8;
const OFP_MATCH_LEN: usize = 40;

// OpenFlow 1.0 message types.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Vendor = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    GetConfigRequest = 7,
    GetConfigReply = 8,
    SetConfig = 9,
    PacketIn = 10,
    FlowRemoved = 11,
    PortStatus = 12,
    PacketOut = 13,
    FlowMod = 14,
    PortMod = 15,
    StatsRequest = 16,
    StatsReply = 17,
    BarrierRequest = 18,
    BarrierReply = 19,
    QueueGetConfigRequest = 20,
    QueueGetConfigReply = 21,
}

// OpenFlow 1.0 flow_mod commands.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, PartialEq)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

// Common OpenFlow message header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OfHeader {
    pub version: u8,
    pub msg_type: OfType,
    pub length: u16,
    pub xid: u32,
}

// A captured OpenFlow message: the parsed header plus the raw body.
//
// The body is kept as opaque bytes; only the fields entering the
// fingerprint are ever interpreted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OfMessage {
    pub header: OfHeader,
    pub body: Bytes,
}

// OpenFlow decode errors.
#[derive(Debug, Eq, PartialEq)]
pub enum DecodeError {
    IncompleteMessage,
    InvalidVersion(u8),
    InvalidMessageType(u8),
    InvalidLength(u16),
    InvalidBase64,
    ReadOutOfBounds,
}

// Flow match wildcard bits.
const OFPFW_IN_PORT: u32 = 1 << 0;
const OFPFW_DL_VLAN: u32 = 1 << 1;
const OFPFW_DL_SRC: u32 = 1 << 2;
const OFPFW_DL_DST: u32 = 1 << 3;
const OFPFW_DL_TYPE: u32 = 1 << 4;
const OFPFW_NW_PROTO: u32 = 1 << 5;
const OFPFW_TP_SRC: u32 = 1 << 6;
const OFPFW_TP_DST: u32 = 1 << 7;
const OFPFW_NW_SRC_SHIFT: u32 = 8;
const OFPFW_NW_DST_SHIFT: u32 = 14;
const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
const OFPFW_NW_TOS: u32 = 1 << 21;

const OFPAT_OUTPUT: u16 = 0;

// ===== impl OfType =====

impl OfType {
    pub const fn name(&self) -> &'static str {
        match self {
            OfType::Hello => "hello",
            OfType::Error => "error",
            OfType::EchoRequest => "echo_request",
            OfType::EchoReply => "echo_reply",
            OfType::Vendor => "vendor",
            OfType::FeaturesRequest => "features_request",
            OfType::FeaturesReply => "features_reply",
            OfType::GetConfigRequest => "get_config_request",
            OfType::GetConfigReply => "get_config_reply",
            OfType::SetConfig => "set_config",
            OfType::PacketIn => "packet_in",
            OfType::FlowRemoved => "flow_removed",
            OfType::PortStatus => "port_status",
            OfType::PacketOut => "packet_out",
            OfType::FlowMod => "flow_mod",
            OfType::PortMod => "port_mod",
            OfType::StatsRequest => "stats_request",
            OfType::StatsReply => "stats_reply",
            OfType::BarrierRequest => "barrier_request",
            OfType::BarrierReply => "barrier_reply",
            OfType::QueueGetConfigRequest => "queue_get_config_request",
            OfType::QueueGetConfigReply => "queue_get_config_reply",
        }
    }
}

impl std::fmt::Display for OfType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OfType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        (0u8..=21)
            .filter_map(OfType::from_u8)
            .find(|msg_type| msg_type.name() == s)
            .ok_or(())
    }
}

// ===== impl FlowModCommand =====

impl std::fmt::Display for FlowModCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowModCommand::Add => write!(f, "add"),
            FlowModCommand::Modify => write!(f, "modify"),
            FlowModCommand::ModifyStrict => write!(f, "modify_strict"),
            FlowModCommand::Delete => write!(f, "delete"),
            FlowModCommand::DeleteStrict => write!(f, "delete_strict"),
        }
    }
}

// ===== impl OfMessage =====

impl OfMessage {
    // Decodes an OpenFlow message from a raw byte buffer.
    pub fn decode(data: &[u8]) -> Result<OfMessage, DecodeError> {
        let mut buf = Bytes::copy_from_slice(data);
        if data.len() < OFP_HEADER_LEN {
            return Err(DecodeError::IncompleteMessage);
        }

        let version = buf.try_get_u8()?;
        if version != OFP_VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }
        let msg_type = buf.try_get_u8()?;
        let msg_type = OfType::from_u8(msg_type)
            .ok_or(DecodeError::InvalidMessageType(msg_type))?;
        let length = buf.try_get_u16()?;
        if (length as usize) < OFP_HEADER_LEN || (length as usize) > data.len()
        {
            return Err(DecodeError::InvalidLength(length));
        }
        let xid = buf.try_get_u32()?;

        let header = OfHeader {
            version,
            msg_type,
            length,
            xid,
        };
        let body = buf.slice(..length as usize - OFP_HEADER_LEN);
        Ok(OfMessage { header, body })
    }

    pub fn from_base64(b64: &str) -> Result<OfMessage, DecodeError> {
        let data =
            BASE64.decode(b64).map_err(|_| DecodeError::InvalidBase64)?;
        OfMessage::decode(&data)
    }

    pub fn to_base64(&self) -> String {
        let mut data = Vec::with_capacity(self.header.length as usize);
        data.push(self.header.version);
        data.push(self.header.msg_type as u8);
        data.extend_from_slice(&self.header.length.to_be_bytes());
        data.extend_from_slice(&self.header.xid.to_be_bytes());
        data.extend_from_slice(&self.body);
        BASE64.encode(data)
    }

    // Computes the canonical fingerprint of the message.
    //
    // The xid never enters the fingerprint; flow_mods additionally mask
    // out the cookie and buffer_id.
    pub fn fingerprint(&self) -> Result<OfFingerprint, DecodeError> {
        match self.header.msg_type {
            OfType::FlowMod => flow_mod_fingerprint(self.body.clone()),
            msg_type => Ok(OfFingerprint::type_only(msg_type)),
        }
    }
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IncompleteMessage => {
                write!(f, "incomplete OpenFlow message")
            }
            DecodeError::InvalidVersion(version) => {
                write!(f, "invalid OpenFlow version: {version}")
            }
            DecodeError::InvalidMessageType(msg_type) => {
                write!(f, "invalid OpenFlow message type: {msg_type}")
            }
            DecodeError::InvalidLength(length) => {
                write!(f, "invalid OpenFlow message length: {length}")
            }
            DecodeError::InvalidBase64 => {
                write!(f, "invalid base64 packet data")
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

// ===== helper functions =====

// Canonicalizes a flow_mod body into its fingerprint fields.
fn flow_mod_fingerprint(
    mut buf: Bytes,
) -> Result<OfFingerprint, DecodeError> {
    if buf.len() < OFP_MATCH_LEN + 24 {
        return Err(DecodeError::IncompleteMessage);
    }

    let mut fingerprint = OfFingerprint::type_only(OfType::FlowMod);
    let fields = &mut fingerprint.fields;

    // ofp_match.
    let wildcards = buf.try_get_u32()?;
    let in_port = buf.try_get_u16()?;
    let mut dl_src = [0u8; 6];
    buf.copy_to_slice(&mut dl_src);
    let mut dl_dst = [0u8; 6];
    buf.copy_to_slice(&mut dl_dst);
    let dl_vlan = buf.try_get_u16()?;
    let dl_vlan_pcp = buf.try_get_u8()?;
    let _pad = buf.try_get_u8()?;
    let dl_type = buf.try_get_u16()?;
    let nw_tos = buf.try_get_u8()?;
    let nw_proto = buf.try_get_u8()?;
    let _pad = buf.try_get_u16()?;
    let nw_src = buf.try_get_u32()?;
    let nw_dst = buf.try_get_u32()?;
    let tp_src = buf.try_get_u16()?;
    let tp_dst = buf.try_get_u16()?;

    if wildcards & OFPFW_IN_PORT == 0 {
        fields.insert("in_port".to_owned(), in_port.into());
    }
    if wildcards & OFPFW_DL_SRC == 0 {
        fields.insert(
            "dl_src".to_owned(),
            crate::mac_addr::MacAddr::from(dl_src).to_string().into(),
        );
    }
    if wildcards & OFPFW_DL_DST == 0 {
        fields.insert(
            "dl_dst".to_owned(),
            crate::mac_addr::MacAddr::from(dl_dst).to_string().into(),
        );
    }
    if wildcards & OFPFW_DL_VLAN == 0 {
        fields.insert("dl_vlan".to_owned(), dl_vlan.into());
    }
    if wildcards & OFPFW_DL_VLAN_PCP == 0 {
        fields.insert("dl_vlan_pcp".to_owned(), (dl_vlan_pcp as u16).into());
    }
    if wildcards & OFPFW_DL_TYPE == 0 {
        fields.insert("dl_type".to_owned(), dl_type.into());
    }
    if wildcards & OFPFW_NW_TOS == 0 {
        fields.insert("nw_tos".to_owned(), (nw_tos as u16).into());
    }
    if wildcards & OFPFW_NW_PROTO == 0 {
        fields.insert("nw_proto".to_owned(), (nw_proto as u16).into());
    }
    if let Some(value) = masked_addr(nw_src, wildcards, OFPFW_NW_SRC_SHIFT) {
        fields.insert("nw_src".to_owned(), value.into());
    }
    if let Some(value) = masked_addr(nw_dst, wildcards, OFPFW_NW_DST_SHIFT) {
        fields.insert("nw_dst".to_owned(), value.into());
    }
    if wildcards & OFPFW_TP_SRC == 0 {
        fields.insert("tp_src".to_owned(), tp_src.into());
    }
    if wildcards & OFPFW_TP_DST == 0 {
        fields.insert("tp_dst".to_owned(), tp_dst.into());
    }

    // Cookie is excluded from the fingerprint.
    let _cookie = buf.try_get_u64()?;

    let command = buf.try_get_u16()?;
    let command = FlowModCommand::from_u16(command)
        .ok_or(DecodeError::InvalidMessageType(command as u8))?;
    fields.insert("command".to_owned(), command.to_string().into());
    let idle_timeout = buf.try_get_u16()?;
    fields.insert("idle_timeout".to_owned(), idle_timeout.into());
    let hard_timeout = buf.try_get_u16()?;
    fields.insert("hard_timeout".to_owned(), hard_timeout.into());
    let priority = buf.try_get_u16()?;
    fields.insert("priority".to_owned(), priority.into());
    // Buffer id is excluded from the fingerprint.
    let _buffer_id = buf.try_get_u32()?;
    let out_port = buf.try_get_u16()?;
    fields.insert("out_port".to_owned(), out_port.into());
    let _flags = buf.try_get_u16()?;

    // Action list.
    let mut actions = vec![];
    while buf.remaining() >= 4 {
        let action_type = buf.try_get_u16()?;
        let action_len = buf.try_get_u16()? as usize;
        if action_len < 4 || action_len - 4 > buf.remaining() {
            return Err(DecodeError::IncompleteMessage);
        }
        let mut action_body = buf.split_to(action_len - 4);
        let action = match action_type {
            OFPAT_OUTPUT => {
                let port = action_body.try_get_u16()?;
                format!("output:{port}")
            }
            action_type => format!("action:{action_type}"),
        };
        actions.push(FingerprintValue::Str(action));
    }
    fields.insert("actions".to_owned(), FingerprintValue::List(actions));

    Ok(fingerprint)
}

// Formats a masked nw_src/nw_dst match field; fully wildcarded
// addresses are omitted.
fn masked_addr(addr: u32, wildcards: u32, shift: u32) -> Option<String> {
    let bits = (wildcards >> shift) & 0x3f;
    if bits >= 32 {
        return None;
    }
    let addr = Ipv4Addr::from(addr);
    match bits {
        0 => Some(addr.to_string()),
        bits => Some(format!("{}/{}", addr, 32 - bits)),
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_mod_bytes(xid: u32, cookie: u64, priority: u16) -> Vec<u8> {
        let mut data = vec![];
        data.push(OFP_VERSION);
        data.push(OfType::FlowMod as u8);
        data.extend_from_slice(&80u16.to_be_bytes());
        data.extend_from_slice(&xid.to_be_bytes());
        // Match: everything wildcarded except dl_type and nw_dst.
        let wildcards = !(OFPFW_DL_TYPE | (0x3fu32 << OFPFW_NW_DST_SHIFT))
            | (8u32 << OFPFW_NW_DST_SHIFT);
        data.extend_from_slice(&wildcards.to_be_bytes());
        data.extend_from_slice(&[0; 2]); // in_port
        data.extend_from_slice(&[0; 12]); // dl_src + dl_dst
        data.extend_from_slice(&[0; 4]); // dl_vlan, pcp, pad
        data.extend_from_slice(&0x0800u16.to_be_bytes()); // dl_type
        data.extend_from_slice(&[0; 4]); // tos, proto, pad
        data.extend_from_slice(&[10, 0, 0, 0]); // nw_src
        data.extend_from_slice(&[10, 0, 1, 0]); // nw_dst
        data.extend_from_slice(&[0; 4]); // tp_src, tp_dst
        data.extend_from_slice(&cookie.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes()); // command: add
        data.extend_from_slice(&5u16.to_be_bytes()); // idle_timeout
        data.extend_from_slice(&0u16.to_be_bytes()); // hard_timeout
        data.extend_from_slice(&priority.to_be_bytes());
        data.extend_from_slice(&0xffffffffu32.to_be_bytes()); // buffer_id
        data.extend_from_slice(&0xffffu16.to_be_bytes()); // out_port
        data.extend_from_slice(&0u16.to_be_bytes()); // flags
        // One output action.
        data.extend_from_slice(&OFPAT_OUTPUT.to_be_bytes());
        data.extend_from_slice(&8u16.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&[0; 2]);
        data
    }

    #[test]
    fn test_flow_mod_fingerprint_excludes_scratch_fields() {
        let msg1 = OfMessage::decode(&flow_mod_bytes(1, 0xdead, 10)).unwrap();
        let msg2 = OfMessage::decode(&flow_mod_bytes(2, 0xbeef, 10)).unwrap();
        assert_eq!(msg1.fingerprint().unwrap(), msg2.fingerprint().unwrap());

        let fp = msg1.fingerprint().unwrap();
        assert_eq!(fp.msg_type, OfType::FlowMod);
        assert_eq!(
            fp.fields.get("nw_dst"),
            Some(&FingerprintValue::Str("10.0.1.0/24".to_owned()))
        );
        assert_eq!(
            fp.fields.get("actions"),
            Some(&FingerprintValue::List(vec![FingerprintValue::Str(
                "output:2".to_owned()
            )]))
        );
        assert!(!fp.fields.contains_key("nw_src"));
    }

    #[test]
    fn test_fingerprint_discriminates_on_match() {
        let msg1 = OfMessage::decode(&flow_mod_bytes(1, 0, 10)).unwrap();
        let msg2 = OfMessage::decode(&flow_mod_bytes(1, 0, 20)).unwrap();
        assert_ne!(msg1.fingerprint().unwrap(), msg2.fingerprint().unwrap());
    }

    #[test]
    fn test_base64_roundtrip() {
        let msg = OfMessage::decode(&flow_mod_bytes(7, 1, 1)).unwrap();
        let b64 = msg.to_base64();
        assert_eq!(OfMessage::from_base64(&b64).unwrap(), msg);
    }

    #[test]
    fn test_header_only_messages() {
        let data = [OFP_VERSION, OfType::Hello as u8, 0, 8, 0, 0, 0, 42];
        let msg = OfMessage::decode(&data).unwrap();
        assert_eq!(msg.header.xid, 42);
        assert_eq!(
            msg.fingerprint().unwrap(),
            OfFingerprint::type_only(OfType::Hello)
        );
        assert!(OfMessage::decode(&data[..6]).is_err());
    }
}
