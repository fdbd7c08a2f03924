//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::mac_addr::MacAddr;
use crate::openflow::OfType;

/// Canonical equality key for an event.
///
/// A fingerprint is a tuple `(class-tag, ...payload)` and defines
/// functional equivalence across runs: two events match if and only if
/// their fingerprints are structurally equal. Tuples serialize as JSON
/// arrays; the typed inner fingerprints serialize as objects carrying a
/// `class` discriminator.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Fingerprint(Vec<FingerprintValue>);

// A single element of a fingerprint tuple.
//
// Schema-less JSON objects (e.g. the dataplane event embedded in a
// traffic-injection fingerprint) are held by their canonical string so
// that equality and hashing stay structural.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum FingerprintValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<FingerprintValue>),
    Obj(String),
    Dp(DpFingerprint),
    Of(OfFingerprint),
}

/// Dataplane packet summary: frame-level fields plus the protocol
/// specific fields of the innermost recognized header (IPv4 5-tuple or
/// ARP sender/target).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DpFingerprint {
    pub dl_src: Option<MacAddr>,
    pub dl_dst: Option<MacAddr>,
    pub dl_type: Option<u16>,
    pub nw_src: Option<Ipv4Addr>,
    pub nw_dst: Option<Ipv4Addr>,
    pub nw_proto: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
    pub arp_op: Option<u16>,
    pub arp_spa: Option<Ipv4Addr>,
    pub arp_tpa: Option<Ipv4Addr>,
}

/// Control-plane message summary: the OpenFlow message type plus a
/// canonicalized body. Nondeterministic scratch fields (xid, cookie,
/// buffer_id) never enter the body.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct OfFingerprint {
    pub msg_type: OfType,
    pub fields: BTreeMap<String, FingerprintValue>,
}

// Errors converting between fingerprints and their JSON form.
#[derive(Debug, Eq, PartialEq)]
pub enum FingerprintError {
    NotAnArray,
    NonIntegerNumber(String),
    UnknownObjectClass(String),
    InvalidField(&'static str),
}

const DP_CLASS: &str = "DPFingerprint";
const OF_CLASS: &str = "OFFingerprint";

// ===== impl Fingerprint =====

impl Fingerprint {
    pub fn new(values: Vec<FingerprintValue>) -> Fingerprint {
        Fingerprint(values)
    }

    // Builds the common `(class-tag, ...payload)` shape.
    pub fn tagged(
        class_tag: &str,
        payload: impl IntoIterator<Item = FingerprintValue>,
    ) -> Fingerprint {
        let mut values = vec![FingerprintValue::Str(class_tag.to_owned())];
        values.extend(payload);
        Fingerprint(values)
    }

    pub fn values(&self) -> &[FingerprintValue] {
        &self.0
    }

    // Returns the leading class tag, if the tuple starts with a string.
    pub fn class_tag(&self) -> Option<&str> {
        match self.0.first() {
            Some(FingerprintValue::Str(tag)) => Some(tag),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(FingerprintValue::to_value).collect())
    }

    pub fn from_value(value: &Value) -> Result<Fingerprint, FingerprintError> {
        let Value::Array(items) = value else {
            return Err(FingerprintError::NotAnArray);
        };
        let values = items
            .iter()
            .map(FingerprintValue::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fingerprint(values))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Fingerprint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Fingerprint::from_value(&value).map_err(de::Error::custom)
    }
}

// ===== impl FingerprintValue =====

impl FingerprintValue {
    pub fn to_value(&self) -> Value {
        match self {
            FingerprintValue::Null => Value::Null,
            FingerprintValue::Bool(b) => Value::Bool(*b),
            FingerprintValue::Int(n) => json!(n),
            FingerprintValue::Str(s) => Value::String(s.clone()),
            FingerprintValue::List(items) => Value::Array(
                items.iter().map(FingerprintValue::to_value).collect(),
            ),
            FingerprintValue::Obj(canonical) => {
                serde_json::from_str(canonical).unwrap()
            }
            FingerprintValue::Dp(dp) => dp.to_value(),
            FingerprintValue::Of(of) => of.to_value(),
        }
    }

    // Wraps a JSON object by its canonical string form.
    pub fn from_object(value: &Value) -> FingerprintValue {
        FingerprintValue::Obj(crate::canonical::to_canonical_string(value))
    }

    pub fn from_value(
        value: &Value,
    ) -> Result<FingerprintValue, FingerprintError> {
        match value {
            Value::Null => Ok(FingerprintValue::Null),
            Value::Bool(b) => Ok(FingerprintValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(FingerprintValue::Int)
                .ok_or_else(|| {
                    FingerprintError::NonIntegerNumber(n.to_string())
                }),
            Value::String(s) => Ok(FingerprintValue::Str(s.clone())),
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(FingerprintValue::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FingerprintValue::List(items))
            }
            Value::Object(map) => {
                match map.get("class").and_then(Value::as_str) {
                    Some(DP_CLASS) => {
                        DpFingerprint::from_map(map).map(FingerprintValue::Dp)
                    }
                    Some(OF_CLASS) => {
                        OfFingerprint::from_map(map).map(FingerprintValue::Of)
                    }
                    Some(class) => Err(FingerprintError::UnknownObjectClass(
                        class.to_owned(),
                    )),
                    None => Ok(FingerprintValue::from_object(value)),
                }
            }
        }
    }
}

impl From<bool> for FingerprintValue {
    fn from(b: bool) -> FingerprintValue {
        FingerprintValue::Bool(b)
    }
}

impl From<i64> for FingerprintValue {
    fn from(n: i64) -> FingerprintValue {
        FingerprintValue::Int(n)
    }
}

impl From<u64> for FingerprintValue {
    fn from(n: u64) -> FingerprintValue {
        FingerprintValue::Int(n as i64)
    }
}

impl From<u16> for FingerprintValue {
    fn from(n: u16) -> FingerprintValue {
        FingerprintValue::Int(n as i64)
    }
}

impl From<&str> for FingerprintValue {
    fn from(s: &str) -> FingerprintValue {
        FingerprintValue::Str(s.to_owned())
    }
}

impl From<String> for FingerprintValue {
    fn from(s: String) -> FingerprintValue {
        FingerprintValue::Str(s)
    }
}

// ===== impl DpFingerprint =====

impl DpFingerprint {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("class".to_owned(), DP_CLASS.into());
        if let Some(dl_src) = &self.dl_src {
            map.insert("dl_src".to_owned(), dl_src.to_string().into());
        }
        if let Some(dl_dst) = &self.dl_dst {
            map.insert("dl_dst".to_owned(), dl_dst.to_string().into());
        }
        if let Some(dl_type) = self.dl_type {
            map.insert("dl_type".to_owned(), dl_type.into());
        }
        if let Some(nw_src) = self.nw_src {
            map.insert("nw_src".to_owned(), nw_src.to_string().into());
        }
        if let Some(nw_dst) = self.nw_dst {
            map.insert("nw_dst".to_owned(), nw_dst.to_string().into());
        }
        if let Some(nw_proto) = self.nw_proto {
            map.insert("nw_proto".to_owned(), nw_proto.into());
        }
        if let Some(tp_src) = self.tp_src {
            map.insert("tp_src".to_owned(), tp_src.into());
        }
        if let Some(tp_dst) = self.tp_dst {
            map.insert("tp_dst".to_owned(), tp_dst.into());
        }
        if let Some(arp_op) = self.arp_op {
            map.insert("arp_op".to_owned(), arp_op.into());
        }
        if let Some(arp_spa) = self.arp_spa {
            map.insert("arp_spa".to_owned(), arp_spa.to_string().into());
        }
        if let Some(arp_tpa) = self.arp_tpa {
            map.insert("arp_tpa".to_owned(), arp_tpa.to_string().into());
        }
        Value::Object(map)
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, FingerprintError> {
        fn mac(
            map: &Map<String, Value>,
            key: &'static str,
        ) -> Result<Option<MacAddr>, FingerprintError> {
            map.get(key)
                .map(|value| {
                    value
                        .as_str()
                        .and_then(|s| s.parse().ok())
                        .ok_or(FingerprintError::InvalidField(key))
                })
                .transpose()
        }
        fn ip(
            map: &Map<String, Value>,
            key: &'static str,
        ) -> Result<Option<Ipv4Addr>, FingerprintError> {
            map.get(key)
                .map(|value| {
                    value
                        .as_str()
                        .and_then(|s| s.parse().ok())
                        .ok_or(FingerprintError::InvalidField(key))
                })
                .transpose()
        }
        fn num<T: TryFrom<u64>>(
            map: &Map<String, Value>,
            key: &'static str,
        ) -> Result<Option<T>, FingerprintError> {
            map.get(key)
                .map(|value| {
                    value
                        .as_u64()
                        .and_then(|n| T::try_from(n).ok())
                        .ok_or(FingerprintError::InvalidField(key))
                })
                .transpose()
        }

        Ok(DpFingerprint {
            dl_src: mac(map, "dl_src")?,
            dl_dst: mac(map, "dl_dst")?,
            dl_type: num(map, "dl_type")?,
            nw_src: ip(map, "nw_src")?,
            nw_dst: ip(map, "nw_dst")?,
            nw_proto: num(map, "nw_proto")?,
            tp_src: num(map, "tp_src")?,
            tp_dst: num(map, "tp_dst")?,
            arp_op: num(map, "arp_op")?,
            arp_spa: ip(map, "arp_spa")?,
            arp_tpa: ip(map, "arp_tpa")?,
        })
    }
}

// ===== impl OfFingerprint =====

impl OfFingerprint {
    // Type-only fingerprint, used for every message type whose body
    // carries no replay-relevant state.
    pub fn type_only(msg_type: OfType) -> OfFingerprint {
        OfFingerprint {
            msg_type,
            fields: Default::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("class".to_owned(), OF_CLASS.into());
        map.insert("type".to_owned(), self.msg_type.to_string().into());
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.to_value());
        }
        Value::Object(map)
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, FingerprintError> {
        let msg_type = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or(FingerprintError::InvalidField("type"))?;
        let mut fields = BTreeMap::new();
        for (key, value) in map {
            if key == "class" || key == "type" {
                continue;
            }
            fields
                .insert(key.clone(), FingerprintValue::from_value(value)?);
        }
        Ok(OfFingerprint { msg_type, fields })
    }
}

impl std::fmt::Display for OfFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg_type)?;
        if !self.fields.is_empty() {
            write!(f, "{:?}", self.fields)?;
        }
        Ok(())
    }
}

// ===== impl FingerprintError =====

impl std::fmt::Display for FingerprintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FingerprintError::NotAnArray => {
                write!(f, "fingerprint is not a JSON array")
            }
            FingerprintError::NonIntegerNumber(n) => {
                write!(f, "non-integer number in fingerprint: {n}")
            }
            FingerprintError::UnknownObjectClass(class) => {
                write!(f, "unknown fingerprint object class: {class}")
            }
            FingerprintError::InvalidField(field) => {
                write!(f, "invalid fingerprint field: {field}")
            }
        }
    }
}

impl std::error::Error for FingerprintError {}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_roundtrip() {
        let fp = Fingerprint::tagged(
            "LinkFailure",
            [1u64.into(), 1u16.into(), 2u64.into(), 1u16.into()],
        );
        let value = fp.to_value();
        assert_eq!(value, serde_json::json!(["LinkFailure", 1, 1, 2, 1]));
        assert_eq!(Fingerprint::from_value(&value).unwrap(), fp);
        assert_eq!(fp.class_tag(), Some("LinkFailure"));
    }

    #[test]
    fn test_typed_inner_decode() {
        let value = serde_json::json!([
            "DataplaneDrop",
            {
                "class": "DPFingerprint",
                "dl_src": "00:00:00:00:00:01",
                "dl_dst": "00:00:00:00:00:02",
                "dl_type": 2048,
                "nw_src": "10.0.0.1",
                "nw_dst": "10.0.0.2",
                "nw_proto": 6,
                "tp_src": 80,
                "tp_dst": 5000
            },
            1,
            2
        ]);
        let fp = Fingerprint::from_value(&value).unwrap();
        let FingerprintValue::Dp(dp) = &fp.values()[1] else {
            panic!("expected typed dataplane fingerprint");
        };
        assert_eq!(dp.nw_proto, Some(6));
        assert_eq!(fp.to_value(), value);
    }

    #[test]
    fn test_unknown_object_class() {
        let value = serde_json::json!([{"class": "Mystery"}]);
        assert_eq!(
            Fingerprint::from_value(&value),
            Err(FingerprintError::UnknownObjectClass("Mystery".to_owned()))
        );
    }
}
