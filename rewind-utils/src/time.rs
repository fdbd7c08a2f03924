//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeTuple, Serializer};

/// Wall-clock timestamp recorded alongside every trace event.
///
/// Serializes as a two-element array `[seconds, microseconds]`, the
/// format used by the `events.trace` file and the controller sync
/// protocol.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SyncTime {
    pub secs: i64,
    pub usecs: i64,
}

// ===== impl SyncTime =====

impl SyncTime {
    pub fn new(secs: i64, usecs: i64) -> SyncTime {
        SyncTime { secs, usecs }
    }

    // Returns the current wall-clock time.
    pub fn now() -> SyncTime {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        SyncTime {
            secs: now.as_secs() as i64,
            usecs: now.subsec_micros() as i64,
        }
    }
}

impl std::fmt::Display for SyncTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.usecs)
    }
}

impl Serialize for SyncTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.secs)?;
        tuple.serialize_element(&self.usecs)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for SyncTime {
    fn deserialize<D>(deserializer: D) -> Result<SyncTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, usecs) = <(i64, i64)>::deserialize(deserializer)?;
        if usecs < 0 || usecs >= 1_000_000 {
            return Err(de::Error::custom(format!(
                "microseconds out of range: {usecs}"
            )));
        }
        Ok(SyncTime { secs, usecs })
    }
}
