//! # Pipelined Execution
//!
//! Purpose: Buffer commands against one set and flush them in a single
//! write-then-read pass, pairing responses back to commands by position.
//!
//! ## Design Principles
//! 1. **All Writes, Then All Reads**: hlld answers strictly in issue order
//!    with no correlation tokens, so the two phases never interleave and
//!    both preserve buffer order.
//! 2. **Slots Absorb Failures**: A failed command fills its own result slot;
//!    it never desynchronizes the commands behind it.
//! 3. **Drain Before Flight**: The buffer is taken atomically at execute,
//!    so appends during execution land in the next batch.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};

use tracing::debug;

use hlld_protocol::{command, CommandKind, ResponseShape, DONE};

use crate::conn::Connection;
use crate::error::{HlldError, HlldResult};
use crate::sha1::sha1_hex;

/// Outcome of one pipelined command.
#[derive(Debug)]
pub enum CommandResult {
    /// Server acknowledged with `Done`.
    Done,
    /// `info` payload as raw key/value pairs.
    Info(HashMap<String, String>),
    /// The command failed; the error is parked here instead of aborting
    /// the batch.
    Failed(HlldError),
}

impl CommandResult {
    /// True when the command was acknowledged.
    pub fn is_done(&self) -> bool {
        matches!(self, CommandResult::Done)
    }

    /// Info payload, when present.
    pub fn as_info(&self) -> Option<&HashMap<String, String>> {
        match self {
            CommandResult::Info(map) => Some(map),
            _ => None,
        }
    }

    /// Parked failure, when present.
    pub fn as_failure(&self) -> Option<&HlldError> {
        match self {
            CommandResult::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Deferred command buffer for one set.
///
/// Created by [`HlldSet::pipeline`](crate::HlldSet::pipeline). Commands
/// accumulate locally and hit the network only in [`execute`](Self::execute).
pub struct Pipeline {
    conn: Arc<Mutex<Connection>>,
    set: String,
    hash_keys: bool,
    buf: Vec<(CommandKind, String)>,
}

impl Pipeline {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>, set: String, hash_keys: bool) -> Self {
        Pipeline {
            conn,
            set,
            hash_keys,
            buf: Vec::new(),
        }
    }

    /// Queues a single-key add.
    pub fn add(&mut self, key: &str) -> &mut Self {
        let line = command::add(&self.set, &self.wire_key(key));
        self.append(CommandKind::Add, line)
    }

    /// Queues a bulk add.
    pub fn bulk<S: AsRef<str>>(&mut self, keys: &[S]) -> &mut Self {
        let keys: Vec<String> = keys.iter().map(|k| self.wire_key(k.as_ref())).collect();
        let line = command::bulk(&self.set, &keys);
        self.append(CommandKind::Bulk, line)
    }

    /// Queues a `drop` of the whole set.
    pub fn delete(&mut self) -> &mut Self {
        let line = command::drop(&self.set);
        self.append(CommandKind::Drop, line)
    }

    /// Queues a `close`.
    pub fn close(&mut self) -> &mut Self {
        let line = command::close(&self.set);
        self.append(CommandKind::Close, line)
    }

    /// Queues a `clear`.
    pub fn clear(&mut self) -> &mut Self {
        let line = command::clear(&self.set);
        self.append(CommandKind::Clear, line)
    }

    /// Queues a per-set `flush`.
    pub fn flush(&mut self) -> &mut Self {
        let line = command::flush(&self.set);
        self.append(CommandKind::Flush, line)
    }

    /// Queues an `info` fetch.
    pub fn info(&mut self) -> &mut Self {
        let line = command::info(&self.set);
        self.append(CommandKind::Info, line)
    }

    /// Queues a raw command line under an explicit kind. The fluent methods
    /// above all funnel through here.
    pub fn append(&mut self, kind: CommandKind, line: impl Into<String>) -> &mut Self {
        self.buf.push((kind, line.into()));
        self
    }

    /// Appends another pipeline's queued commands after this one's,
    /// preserving both orders. Consuming the other pipeline keeps its
    /// commands from executing twice.
    pub fn merge(&mut self, other: Pipeline) -> &mut Self {
        self.buf.extend(other.buf);
        self
    }

    /// Number of commands waiting to execute.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Flushes the buffer: writes every command, then reads every response,
    /// pairing them by position. The result vector has the same length and
    /// order as the buffer had.
    ///
    /// Transport faults and framing errors outside an `info` slot abort the
    /// whole call. Per-command failures (a status other than `Done`, a
    /// malformed `info` block) are parked in the matching slot instead.
    pub fn execute(&mut self) -> HlldResult<Vec<CommandResult>> {
        let batch = mem::take(&mut self.buf);
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            target: "hlld::pipeline",
            set = %self.set,
            commands = batch.len(),
            "executing"
        );

        let mut conn = self.conn.lock().expect("connection mutex poisoned");

        for (_, line) in &batch {
            conn.send(line)?;
        }

        let mut results = Vec::with_capacity(batch.len());
        for (kind, _) in &batch {
            let result = match kind.response_shape() {
                ResponseShape::StatusLine => {
                    let line = conn.read_line()?;
                    if line == DONE {
                        CommandResult::Done
                    } else {
                        CommandResult::Failed(HlldError::Server(line))
                    }
                }
                ResponseShape::InfoBlock => match conn.read_block_as_map() {
                    Ok(map) => CommandResult::Info(map),
                    Err(err @ HlldError::Protocol(_)) => CommandResult::Failed(err),
                    Err(err) => return Err(err),
                },
            };
            results.push(result);
        }

        Ok(results)
    }

    fn wire_key(&self, key: &str) -> String {
        if self.hash_keys {
            sha1_hex(key.as_bytes())
        } else {
            key.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnectionConfig;

    fn pipeline(hash_keys: bool) -> Pipeline {
        let conn = Connection::new("localhost".parse().unwrap(), ConnectionConfig::default());
        Pipeline::new(Arc::new(Mutex::new(conn)), "users".to_string(), hash_keys)
    }

    fn queued_lines(pipe: &Pipeline) -> Vec<&str> {
        pipe.buf.iter().map(|(_, line)| line.as_str()).collect()
    }

    #[test]
    fn buffers_commands_in_order() {
        let mut pipe = pipeline(false);
        pipe.add("alice").bulk(&["bob", "carol"]).info().flush();
        assert_eq!(
            queued_lines(&pipe),
            vec!["s users alice", "b users bob carol", "info users", "flush users"]
        );
        assert_eq!(pipe.len(), 4);
    }

    #[test]
    fn lifecycle_kinds_map_to_wire_words() {
        let mut pipe = pipeline(false);
        pipe.delete().close().clear();
        assert_eq!(
            queued_lines(&pipe),
            vec!["drop users", "close users", "clear users"]
        );
        assert_eq!(pipe.buf[0].0, CommandKind::Drop);
    }

    #[test]
    fn merge_appends_after_own_commands() {
        let mut first = pipeline(false);
        first.add("a1").add("a2");
        let mut second = pipeline(false);
        second.add("b1");
        first.merge(second);
        assert_eq!(
            queued_lines(&first),
            vec!["s users a1", "s users a2", "s users b1"]
        );
    }

    #[test]
    fn hashed_keys_are_buffered_hashed() {
        let mut pipe = pipeline(true);
        pipe.add("abc");
        assert_eq!(
            queued_lines(&pipe),
            vec!["s users a9993e364706816aba3e25717850c26c9cd0d89d"]
        );
    }

    #[test]
    fn empty_execute_returns_no_results() {
        let mut pipe = pipeline(false);
        let results = pipe.execute().expect("empty batch");
        assert!(results.is_empty());
    }
}
