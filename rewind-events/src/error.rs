//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use rewind_utils::fingerprint::FingerprintError;
use rewind_utils::label::DuplicateLabel;
use tracing::error;

// Event decode errors. All of these are fatal to trace load.
#[derive(Debug)]
pub enum DecodeError {
    NotAnObject,
    MissingField(&'static str),
    InvalidField(&'static str),
    UnknownClass(String),
    DuplicateLabel(DuplicateLabel),
    UnknownInvariant(String),
    LegacyInvariantCheck,
    BadFingerprint(FingerprintError),
}

// Trace file errors.
#[derive(Debug)]
pub enum TraceError {
    IoError(std::io::Error),
    JsonError(usize, serde_json::Error),
    DecodeError(usize, DecodeError),
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::NotAnObject => {
                write!(f, "event is not a JSON object")
            }
            DecodeError::MissingField(field) => {
                write!(f, "missing required field: {field}")
            }
            DecodeError::InvalidField(field) => {
                write!(f, "invalid field: {field}")
            }
            DecodeError::UnknownClass(class) => {
                write!(f, "unknown event class: {class}")
            }
            DecodeError::DuplicateLabel(..) => {
                write!(f, "duplicate event label")
            }
            DecodeError::UnknownInvariant(name) => {
                write!(f, "unknown invariant check: {name}")
            }
            DecodeError::LegacyInvariantCheck => {
                write!(
                    f,
                    "trace carries a marshalled invariant check function; \
                     only named checks from the static registry are supported"
                )
            }
            DecodeError::BadFingerprint(..) => {
                write!(f, "malformed fingerprint")
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::DuplicateLabel(error) => Some(error),
            DecodeError::BadFingerprint(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DuplicateLabel> for DecodeError {
    fn from(error: DuplicateLabel) -> DecodeError {
        DecodeError::DuplicateLabel(error)
    }
}

impl From<FingerprintError> for DecodeError {
    fn from(error: FingerprintError) -> DecodeError {
        DecodeError::BadFingerprint(error)
    }
}

// ===== impl TraceError =====

impl TraceError {
    pub fn log(&self) {
        match self {
            TraceError::IoError(error) => {
                error!(error = %with_source(error), "{}", self);
            }
            TraceError::JsonError(line, error) => {
                error!(%line, %error, "{}", self);
            }
            TraceError::DecodeError(line, error) => {
                error!(%line, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::IoError(..) => {
                write!(f, "failed to read trace file")
            }
            TraceError::JsonError(line, ..) => {
                write!(f, "malformed JSON at trace line {line}")
            }
            TraceError::DecodeError(line, ..) => {
                write!(f, "malformed event at trace line {line}")
            }
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::IoError(error) => Some(error),
            TraceError::JsonError(_, error) => Some(error),
            TraceError::DecodeError(_, error) => Some(error),
        }
    }
}

impl From<std::io::Error> for TraceError {
    fn from(error: std::io::Error) -> TraceError {
        TraceError::IoError(error)
    }
}

// ===== global functions =====

pub(crate) fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
