//! # hlld Sync Client
//!
//! Purpose: Provide a lightweight, synchronous client for the hlld
//! HyperLogLog daemon, with bounded reconnect-and-retry on transient
//! socket faults and positional pipelining of batched commands.
//!
//! ## Design Principles
//! 1. **Lazy Connections**: Sockets open on first use and are replaced,
//!    never repaired, after a fault.
//! 2. **Bounded Retry**: One retry primitive caps every send at a fixed
//!    number of attempts across reconnects; reads are never retried.
//! 3. **Positional Pipelining**: Batched commands are written back-to-back
//!    and their responses paired by order, as the protocol requires.
//! 4. **Shared Connection**: Set handles and pipelines created from one
//!    client funnel through one mutex-guarded connection.

mod client;
mod conn;
mod error;
mod pipeline;
mod sha1;

pub use client::{HlldClient, HlldConfig, HlldSet};
pub use conn::{Connection, ConnectionConfig, Endpoint, DEFAULT_ATTEMPTS, DEFAULT_PORT};
pub use error::{HlldError, HlldResult};
pub use pipeline::{CommandResult, Pipeline};

pub use hlld_protocol::{Accuracy, CommandKind, CreateOptions, ProtocolError, ResponseShape, SetInfo};
