//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io::Write;
use std::path::Path;

use tracing::warn;

use crate::codec::{self, TraceContext};
use crate::error::TraceError;
use crate::Event;

/// Writes events to a newline-delimited JSON trace file, one compact
/// object per line.
pub struct TraceWriter(std::fs::File);

// ===== impl TraceWriter =====

impl TraceWriter {
    // Creates (truncating) the trace file.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<TraceWriter> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(TraceWriter(file))
    }

    // Appends one event. Atomicity is per line: a crash mid-write
    // leaves at most one unfinished final line, which the reader drops.
    pub fn append(&mut self, event: &Event) -> std::io::Result<()> {
        let line = codec::encode(event).to_string();
        writeln!(self.0, "{line}")
    }
}

// ===== global functions =====

/// Loads a trace file.
///
/// The file is a newline-delimited JSON stream. An unfinished final
/// line (no trailing newline and unparseable) is dropped with a
/// warning; any other malformed line is fatal and the error names the
/// line number.
pub fn load_trace<P: AsRef<Path>>(
    path: P,
    ctx: &mut TraceContext<'_>,
) -> Result<Vec<Event>, TraceError> {
    let contents = std::fs::read_to_string(&path)?;
    parse_trace(&contents, ctx)
}

// Parses the contents of a trace file.
pub fn parse_trace(
    contents: &str,
    ctx: &mut TraceContext<'_>,
) -> Result<Vec<Event>, TraceError> {
    let complete = contents.ends_with('\n');
    let line_count = contents.lines().count();

    let mut events = vec![];
    for (index, line) in contents.lines().enumerate() {
        let lineno = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(error) => {
                if lineno == line_count && !complete {
                    warn!(line = %lineno, "dropping unfinished final trace line");
                    break;
                }
                return Err(TraceError::JsonError(lineno, error));
            }
        };
        let event = codec::decode(&value, ctx)
            .map_err(|error| TraceError::DecodeError(lineno, error))?;
        events.push(event);
    }
    Ok(events)
}

// ===== tests =====
