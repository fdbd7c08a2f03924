//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Unique event label: a numeric id prefixed by `e` (input events) or
/// `i` (internal events).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Label {
    prefix: LabelPrefix,
    id: u64,
}

// Label prefix distinguishing input from internal events.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LabelPrefix {
    Input,
    Internal,
}

/// Hands out process-unique label ids.
///
/// Label ids are unique across both prefixes: once `e7` is taken, `i7`
/// is taken too. The allocator is an explicit context object so that
/// independent traces (and parallel tests) never share label state.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next_id: u64,
    used: BTreeSet<u64>,
}

// Attempt to register a label whose id is already taken.
#[derive(Debug, Eq, PartialEq)]
pub struct DuplicateLabel(pub Label);

// Label string that doesn't match `[ei]<digits>`.
#[derive(Debug, Eq, PartialEq)]
pub struct InvalidLabel(pub String);

// ===== impl Label =====

impl Label {
    pub fn new(prefix: LabelPrefix, id: u64) -> Label {
        Label { prefix, id }
    }

    pub fn prefix(&self) -> LabelPrefix {
        self.prefix
    }

    // Returns the numeric id of the label.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.id)
    }
}

impl FromStr for Label {
    type Err = InvalidLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = match s.chars().next() {
            Some('e') => LabelPrefix::Input,
            Some('i') => LabelPrefix::Internal,
            _ => return Err(InvalidLabel(s.to_owned())),
        };
        let id = s[1..]
            .parse::<u64>()
            .map_err(|_| InvalidLabel(s.to_owned()))?;
        Ok(Label { prefix, id })
    }
}

impl Serialize for Label {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D>(deserializer: D) -> Result<Label, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            de::Error::custom(format!("invalid event label: {s}"))
        })
    }
}

// ===== impl LabelPrefix =====

impl std::fmt::Display for LabelPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelPrefix::Input => write!(f, "e"),
            LabelPrefix::Internal => write!(f, "i"),
        }
    }
}

// ===== impl LabelAllocator =====

impl LabelAllocator {
    pub fn new() -> LabelAllocator {
        LabelAllocator {
            next_id: 1,
            used: Default::default(),
        }
    }

    // Allocates the next free label with the given prefix.
    pub fn allocate(&mut self, prefix: LabelPrefix) -> Label {
        while self.used.contains(&self.next_id) {
            self.next_id += 1;
        }
        let label = Label::new(prefix, self.next_id);
        self.used.insert(self.next_id);
        self.next_id += 1;
        label
    }

    // Registers a label read from a trace, enforcing id uniqueness.
    pub fn register(&mut self, label: Label) -> Result<(), DuplicateLabel> {
        if !self.used.insert(label.id()) {
            return Err(DuplicateLabel(label));
        }
        Ok(())
    }
}

// ===== impl DuplicateLabel =====

impl std::fmt::Display for DuplicateLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "duplicate event label: {}", self.0)
    }
}

impl std::error::Error for DuplicateLabel {}

// ===== impl InvalidLabel =====

impl std::fmt::Display for InvalidLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid event label: {}", self.0)
    }
}

impl std::error::Error for InvalidLabel {}

// ===== tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip() {
        let label: Label = "e42".parse().unwrap();
        assert_eq!(label.prefix(), LabelPrefix::Input);
        assert_eq!(label.id(), 42);
        assert_eq!(label.to_string(), "e42");
        assert!("x1".parse::<Label>().is_err());
        assert!("e".parse::<Label>().is_err());
    }

    #[test]
    fn test_allocator_skips_registered_ids() {
        let mut allocator = LabelAllocator::new();
        allocator
            .register(Label::new(LabelPrefix::Input, 1))
            .unwrap();
        allocator
            .register(Label::new(LabelPrefix::Internal, 2))
            .unwrap();
        let label = allocator.allocate(LabelPrefix::Input);
        assert_eq!(label.to_string(), "e3");
    }

    #[test]
    fn test_duplicate_label() {
        let mut allocator = LabelAllocator::new();
        let label = Label::new(LabelPrefix::Input, 7);
        allocator.register(label).unwrap();
        // Ids are unique across prefixes.
        let dup = Label::new(LabelPrefix::Internal, 7);
        assert_eq!(allocator.register(dup), Err(DuplicateLabel(dup)));
    }
}
