//! # Response Parsing
//!
//! Purpose: Decode hlld's line-oriented responses: status tokens, START/END
//! block payloads, and the typed statistics carried by `info` and `list`.
//!
//! ## Design Principles
//! 1. **No I/O**: Everything here operates on lines someone else has read.
//! 2. **Lenient Splitting**: A block line without a space still yields its
//!    key; only typed field conversion rejects malformed values.
//! 3. **Preserve the Evidence**: Rejected lines travel inside the error.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// First line of every block response.
pub const BLOCK_START: &str = "START";
/// Last line of every block response.
pub const BLOCK_END: &str = "END";
/// Status line acknowledging a successful command.
pub const DONE: &str = "Done";
/// Status line when creating a set that already exists.
pub const EXISTS: &str = "Exists";

/// Splits a block line at the first space into key and remainder.
///
/// A line without a space becomes a key with an empty value.
pub fn split_key_value(line: &str) -> (&str, &str) {
    match line.split_once(' ') {
        Some((key, value)) => (key, value),
        None => (line, ""),
    }
}

/// Converts block lines into a key/value map.
pub fn block_to_map(lines: &[String]) -> HashMap<String, String> {
    lines
        .iter()
        .map(|line| {
            let (key, value) = split_key_value(line);
            (key.to_string(), value.to_string())
        })
        .collect()
}

/// Statistics for one set, as reported by `info` and `list`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetInfo {
    /// Error bound the set was created with.
    pub eps: f64,
    /// HyperLogLog register precision.
    pub precision: u64,
    /// Bytes used by the set's registers.
    pub bytes: u64,
    /// Estimated cardinality.
    pub size: u64,
}

impl SetInfo {
    /// Builds a `SetInfo` from an `info` response map. Fields beyond the
    /// four required ones are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ProtocolError> {
        Ok(SetInfo {
            eps: parse_field(map, "eps")?,
            precision: parse_field(map, "precision")?,
            bytes: parse_field(map, "bytes")?,
            size: parse_field(map, "size")?,
        })
    }
}

fn parse_field<T: FromStr>(
    map: &HashMap<String, String>,
    field: &'static str,
) -> Result<T, ProtocolError> {
    let value = map.get(field).ok_or(ProtocolError::MissingField(field))?;
    value.parse().map_err(|_| ProtocolError::InvalidFieldValue {
        field,
        value: value.clone(),
    })
}

/// Parses one `list` line: `<name> <eps> <precision> <bytes> <size>`.
pub fn parse_list_line(line: &str) -> Result<(String, SetInfo), ProtocolError> {
    let mut parts = line.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| ProtocolError::MalformedListLine(line.to_string()))?;
    let info = SetInfo {
        eps: parse_list_field(line, parts.next())?,
        precision: parse_list_field(line, parts.next())?,
        bytes: parse_list_field(line, parts.next())?,
        size: parse_list_field(line, parts.next())?,
    };
    Ok((name.to_string(), info))
}

fn parse_list_field<T: FromStr>(line: &str, part: Option<&str>) -> Result<T, ProtocolError> {
    part.and_then(|p| p.parse().ok())
        .ok_or_else(|| ProtocolError::MalformedListLine(line.to_string()))
}
