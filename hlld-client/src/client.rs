//! # Client Facade
//!
//! Purpose: Expose hlld's set lifecycle and membership operations behind
//! handle types that share one connection.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `HlldClient` hides connection and protocol
//!    details; `HlldSet` narrows the surface to one named set.
//! 2. **One Socket Per Client**: Every handle created from a client funnels
//!    through the same mutex-guarded connection, holding the lock for a
//!    full request/response exchange.
//! 3. **Fail Fast**: A status other than `Done` (or `Exists` on create)
//!    surfaces immediately as an error carrying the raw text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use hlld_protocol::{command, parse_list_line, CreateOptions, SetInfo, DONE, EXISTS};

use crate::conn::{Connection, ConnectionConfig, Endpoint, DEFAULT_ATTEMPTS};
use crate::error::{HlldError, HlldResult};
use crate::pipeline::Pipeline;
use crate::sha1::sha1_hex;

/// Configuration for [`HlldClient`].
#[derive(Debug, Clone)]
pub struct HlldConfig {
    /// Server address as `host` or `host:port`; the port defaults to 4553.
    pub server: String,
    /// Optional timeout applied uniformly to connect, read, and write.
    pub timeout: Option<Duration>,
    /// Send attempts before a command is abandoned.
    pub attempts: u32,
    /// Replace keys with their SHA-1 hex digest before sending.
    pub hash_keys: bool,
}

impl Default for HlldConfig {
    fn default() -> Self {
        HlldConfig {
            server: "localhost:4553".to_string(),
            timeout: None,
            attempts: DEFAULT_ATTEMPTS,
            hash_keys: false,
        }
    }
}

/// Client bound to one hlld server.
///
/// Set handles and pipelines created from a client share its connection;
/// no network traffic happens until the first command.
pub struct HlldClient {
    conn: Arc<Mutex<Connection>>,
    hash_keys: bool,
}

impl HlldClient {
    /// Creates a client with default configuration.
    pub fn connect(server: impl Into<String>) -> HlldResult<Self> {
        let mut config = HlldConfig::default();
        config.server = server.into();
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration. The address is parsed
    /// eagerly so a malformed one fails here, not at first use.
    pub fn with_config(config: HlldConfig) -> HlldResult<Self> {
        let endpoint: Endpoint = config.server.parse()?;
        let conn = Connection::new(
            endpoint,
            ConnectionConfig {
                timeout: config.timeout,
                attempts: config.attempts,
            },
        );
        Ok(HlldClient {
            conn: Arc::new(Mutex::new(conn)),
            hash_keys: config.hash_keys,
        })
    }

    /// Creates a new set with server defaults.
    ///
    /// An `Exists` response is not an error; it yields a handle to the
    /// existing set.
    pub fn create_set(&self, name: &str) -> HlldResult<HlldSet> {
        self.create_set_with(name, &CreateOptions::default())
    }

    /// Creates a new set with explicit options.
    pub fn create_set_with(&self, name: &str, options: &CreateOptions) -> HlldResult<HlldSet> {
        let line = command::create(name, options);
        let response = {
            let mut conn = self.conn.lock().expect("connection mutex poisoned");
            conn.send(&line)?;
            conn.read_line()?
        };
        match response.as_str() {
            DONE => {
                debug!(target: "hlld::client", set = name, "created");
                Ok(self.get_set(name))
            }
            EXISTS => Ok(self.get_set(name)),
            _ => Err(HlldError::Server(response)),
        }
    }

    /// Returns a handle to a named set without touching the network. The
    /// set is not checked for existence.
    pub fn get_set(&self, name: &str) -> HlldSet {
        HlldSet {
            conn: self.conn.clone(),
            name: name.to_string(),
            hash_keys: self.hash_keys,
        }
    }

    /// Lists the sets known to the server with their statistics.
    pub fn list_sets(&self) -> HlldResult<HashMap<String, SetInfo>> {
        let lines = {
            let mut conn = self.conn.lock().expect("connection mutex poisoned");
            conn.send(&command::list())?;
            conn.read_block()?
        };
        let mut sets = HashMap::with_capacity(lines.len());
        for line in &lines {
            let (name, info) = parse_list_line(line)?;
            sets.insert(name, info);
        }
        Ok(sets)
    }

    /// Flushes every set to disk.
    pub fn flush(&self) -> HlldResult<()> {
        let mut conn = self.conn.lock().expect("connection mutex poisoned");
        expect_done(conn.send_and_receive(&command::flush_all())?)
    }
}

/// Handle to one named set.
///
/// Cheap to create and clone; operations go through the owning client's
/// shared connection.
#[derive(Clone)]
pub struct HlldSet {
    conn: Arc<Mutex<Connection>>,
    name: String,
    hash_keys: bool,
}

impl HlldSet {
    /// Set name as known to the server.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a key to the set.
    pub fn add(&self, key: &str) -> HlldResult<()> {
        expect_done(self.exchange(&command::add(&self.name, &self.wire_key(key)))?)
    }

    /// Adds a batch of keys in one command.
    pub fn bulk<S: AsRef<str>>(&self, keys: &[S]) -> HlldResult<()> {
        let keys: Vec<String> = keys.iter().map(|k| self.wire_key(k.as_ref())).collect();
        expect_done(self.exchange(&command::bulk(&self.name, &keys))?)
    }

    /// Deletes the set permanently.
    pub fn delete(&self) -> HlldResult<()> {
        expect_done(self.exchange(&command::drop(&self.name))?)
    }

    /// Closes the set, unmapping it from server memory.
    pub fn close(&self) -> HlldResult<()> {
        expect_done(self.exchange(&command::close(&self.name))?)
    }

    /// Removes the set from server management, keeping its data on disk.
    pub fn clear(&self) -> HlldResult<()> {
        expect_done(self.exchange(&command::clear(&self.name))?)
    }

    /// Forces the set to disk.
    pub fn flush(&self) -> HlldResult<()> {
        expect_done(self.exchange(&command::flush(&self.name))?)
    }

    /// Fetches the set's statistics.
    pub fn info(&self) -> HlldResult<SetInfo> {
        let mut conn = self.conn.lock().expect("connection mutex poisoned");
        conn.send(&command::info(&self.name))?;
        let map = conn.read_block_as_map()?;
        Ok(SetInfo::from_map(&map)?)
    }

    /// Estimated cardinality of the set, from `info`.
    pub fn size(&self) -> HlldResult<u64> {
        Ok(self.info()?.size)
    }

    /// Starts an empty pipeline against this set.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.conn.clone(), self.name.clone(), self.hash_keys)
    }

    fn exchange(&self, line: &str) -> HlldResult<String> {
        let mut conn = self.conn.lock().expect("connection mutex poisoned");
        conn.send_and_receive(line)
    }

    fn wire_key(&self, key: &str) -> String {
        if self.hash_keys {
            sha1_hex(key.as_bytes())
        } else {
            key.to_string()
        }
    }
}

fn expect_done(response: String) -> HlldResult<()> {
    if response == DONE {
        Ok(())
    } else {
        Err(HlldError::Server(response))
    }
}
