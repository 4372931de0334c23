//! # Command Encoding
//!
//! Purpose: Build the textual command lines understood by hlld and record,
//! per command, how its response is framed on the wire.
//!
//! ## Design Principles
//! 1. **Closed Command Set**: `CommandKind` enumerates every pipelined
//!    command, so an unrecognized kind cannot reach the response decoder.
//! 2. **Shape Over Strings**: Each kind declares its response shape; decoding
//!    dispatches on the enum, never on command text.
//! 3. **Type-Level Exclusivity**: `Accuracy` makes `precision` and `eps`
//!    mutually exclusive by construction instead of by runtime check.

use serde::{Deserialize, Serialize};

/// Commands a pipeline can buffer, tagged by how their response is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// `s <set> <key>` - add a single key.
    Add,
    /// `b <set> <key>...` - add a batch of keys.
    Bulk,
    /// `drop <set>` - delete the set permanently.
    Drop,
    /// `close <set>` - unmap the set from server memory.
    Close,
    /// `clear <set>` - remove the set from management, keeping its data.
    Clear,
    /// `flush <set>` - force the set to disk.
    Flush,
    /// `info <set>` - fetch the set's statistics block.
    Info,
}

impl CommandKind {
    /// How the server frames this command's response.
    pub const fn response_shape(self) -> ResponseShape {
        match self {
            CommandKind::Info => ResponseShape::InfoBlock,
            _ => ResponseShape::StatusLine,
        }
    }
}

/// Framing of a command response on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A single line, `Done` on success.
    StatusLine,
    /// A START/END block of `key value` lines.
    InfoBlock,
}

/// Accuracy target for a new set.
///
/// The server accepts either a raw register precision or a desired error
/// bound, never both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Accuracy {
    /// Explicit HyperLogLog register precision.
    Precision(u32),
    /// Desired error bound; smaller means more registers.
    Epsilon(f64),
}

/// Options for `create`. The default requests server defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Accuracy target; server defaults apply when absent.
    pub accuracy: Option<Accuracy>,
    /// Keep the set purely in memory instead of paging to disk.
    pub in_memory: bool,
}

/// Builds a `create` command line.
pub fn create(set: &str, options: &CreateOptions) -> String {
    let mut cmd = format!("create {set}");
    match options.accuracy {
        Some(Accuracy::Precision(precision)) => {
            cmd.push_str(&format!(" precision={precision}"));
        }
        Some(Accuracy::Epsilon(eps)) => {
            cmd.push_str(&format!(" eps={eps}"));
        }
        None => {}
    }
    if options.in_memory {
        cmd.push_str(" in_memory=1");
    }
    cmd
}

/// Builds an `s` (single add) command line.
pub fn add(set: &str, key: &str) -> String {
    format!("s {set} {key}")
}

/// Builds a `b` (bulk add) command line with space-joined keys.
pub fn bulk<S: AsRef<str>>(set: &str, keys: &[S]) -> String {
    let mut cmd = format!("b {set}");
    for key in keys {
        cmd.push(' ');
        cmd.push_str(key.as_ref());
    }
    cmd
}

/// Builds a `drop` command line.
pub fn drop(set: &str) -> String {
    format!("drop {set}")
}

/// Builds a `close` command line.
pub fn close(set: &str) -> String {
    format!("close {set}")
}

/// Builds a `clear` command line.
pub fn clear(set: &str) -> String {
    format!("clear {set}")
}

/// Builds a per-set `flush` command line.
pub fn flush(set: &str) -> String {
    format!("flush {set}")
}

/// Builds the global `flush` command line.
pub fn flush_all() -> String {
    "flush".to_string()
}

/// Builds the `list` command line.
pub fn list() -> String {
    "list".to_string()
}

/// Builds an `info` command line.
pub fn info(set: &str) -> String {
    format!("info {set}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_plain() {
        assert_eq!(create("users", &CreateOptions::default()), "create users");
    }

    #[test]
    fn test_create_with_precision() {
        let options = CreateOptions {
            accuracy: Some(Accuracy::Precision(12)),
            in_memory: false,
        };
        assert_eq!(create("users", &options), "create users precision=12");
    }

    #[test]
    fn test_create_with_eps_in_memory() {
        let options = CreateOptions {
            accuracy: Some(Accuracy::Epsilon(0.01)),
            in_memory: true,
        };
        assert_eq!(create("users", &options), "create users eps=0.01 in_memory=1");
    }

    #[test]
    fn test_add_and_bulk() {
        assert_eq!(add("users", "alice"), "s users alice");
        assert_eq!(bulk("users", &["alice", "bob"]), "b users alice bob");
    }

    #[test]
    fn test_lifecycle_commands() {
        assert_eq!(drop("users"), "drop users");
        assert_eq!(close("users"), "close users");
        assert_eq!(clear("users"), "clear users");
        assert_eq!(flush("users"), "flush users");
        assert_eq!(flush_all(), "flush");
        assert_eq!(list(), "list");
        assert_eq!(info("users"), "info users");
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(CommandKind::Info.response_shape(), ResponseShape::InfoBlock);
        assert_eq!(CommandKind::Add.response_shape(), ResponseShape::StatusLine);
        assert_eq!(CommandKind::Drop.response_shape(), ResponseShape::StatusLine);
        assert_eq!(CommandKind::Flush.response_shape(), ResponseShape::StatusLine);
    }
}
