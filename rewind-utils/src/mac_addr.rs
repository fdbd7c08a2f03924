//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

// 48-bit MAC address (IEEE EUI-48 format).
//
// Serializes as the colon-separated string form used by recorded traces.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MacAddr([u8; 6]);

// MAC address string that doesn't parse.
#[derive(Debug, Eq, PartialEq)]
pub struct InvalidMacAddr(pub String);

// ===== impl MacAddr =====

impl MacAddr {
    pub const LENGTH: usize = 6;
    pub const BROADCAST: Self = Self([0xff; 6]);

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}

impl FromStr for MacAddr {
    type Err = InvalidMacAddr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut octets = s.split(':');
        for byte in bytes.iter_mut() {
            let octet = octets.next().ok_or_else(|| {
                InvalidMacAddr(s.to_owned())
            })?;
            *byte = u8::from_str_radix(octet, 16)
                .map_err(|_| InvalidMacAddr(s.to_owned()))?;
        }
        if octets.next().is_some() {
            return Err(InvalidMacAddr(s.to_owned()));
        }
        Ok(MacAddr(bytes))
    }
}

impl Serialize for MacAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D>(deserializer: D) -> Result<MacAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| de::Error::custom(format!("invalid MAC address: {s}")))
    }
}

// ===== impl InvalidMacAddr =====

impl std::fmt::Display for InvalidMacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid MAC address: {}", self.0)
    }
}

impl std::error::Error for InvalidMacAddr {}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        let mac: MacAddr = "00:26:08:e0:f7:af".parse().unwrap();
        assert_eq!(
            mac.as_bytes(),
            [0x00, 0x26, 0x08, 0xe0, 0xf7, 0xaf]
        );
        assert_eq!(mac.to_string(), "00:26:08:e0:f7:af");
        assert!("00:26:08:e0:f7".parse::<MacAddr>().is_err());
        assert!("00:26:08:e0:f7:af:01".parse::<MacAddr>().is_err());
    }
}
