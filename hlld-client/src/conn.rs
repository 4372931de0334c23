//! # Connection Core
//!
//! Purpose: Own one lazily-opened TCP connection to an hlld server and expose
//! the line and block primitives the protocol needs, with bounded
//! reconnect-and-retry on transient socket faults.
//!
//! ## Design Principles
//! 1. **Replace, Never Repair**: A faulted socket is discarded whole; the
//!    next operation opens a fresh one.
//! 2. **One Buffered Reader**: The `BufReader` owns the stream, so at most
//!    one read buffer ever fronts a socket.
//! 3. **Single Retry Primitive**: `send` and `send_and_receive` share one
//!    bounded loop; nothing else retries.
//! 4. **Reads Are Not Retried**: Replaying a read after reconnect would pair
//!    it with the wrong response, so read faults surface immediately.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, error, warn};

use hlld_protocol::{block_to_map, ProtocolError, BLOCK_END, BLOCK_START};

use crate::error::{is_transient, HlldError, HlldResult};

/// Port hlld listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 4553;

/// Send attempts made before reporting the connection exhausted.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Server location, parsed from `host` or `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or address literal.
    pub host: String,
    /// TCP port, defaulting to [`DEFAULT_PORT`].
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = HlldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| HlldError::InvalidAddress(s.to_string()))?;
                (host, port)
            }
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(HlldError::InvalidAddress(s.to_string()));
        }
        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Tuning for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Applied uniformly to connect, read, and write. `None` blocks
    /// indefinitely.
    ///
    /// On Unix an expired read deadline surfaces as `WouldBlock`, which is
    /// in the transient set, so a timeout doubles as a retry trigger for
    /// stalled sends.
    pub timeout: Option<Duration>,
    /// Attempts per send before reporting the connection exhausted.
    pub attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            timeout: None,
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

/// One lazily-connected TCP session with an hlld server.
///
/// The socket lives inside an `Option<BufReader<TcpStream>>`: absent until
/// first use, dropped whole on a transient fault, rebuilt by the next
/// operation. Methods assume exclusive access; sharing a connection across
/// threads requires an external mutex, one logical exchange per lock.
pub struct Connection {
    endpoint: Endpoint,
    config: ConnectionConfig,
    stream: Option<BufReader<TcpStream>>,
    write_buf: Vec<u8>,
}

impl Connection {
    /// Creates a connection handle without touching the network.
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        Connection {
            endpoint,
            config,
            stream: None,
            write_buf: Vec::with_capacity(256),
        }
    }

    /// Server this connection talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Writes one command line, retrying with a fresh connection on
    /// transient faults.
    pub fn send(&mut self, line: &str) -> HlldResult<()> {
        self.with_retry(|conn| conn.send_once(line))
    }

    /// Sends one command and reads its single-line response as a unit.
    ///
    /// The whole exchange sits inside the retry loop, so a transient fault
    /// after the write replays the command on a fresh connection. The wire
    /// protocol carries no correlation tokens, so the server cannot tell a
    /// replay from a new command: a retried non-idempotent command (an add
    /// or a drop) may be applied more than once.
    pub fn send_and_receive(&mut self, line: &str) -> HlldResult<String> {
        self.with_retry(|conn| {
            conn.send_once(line)?;
            conn.read_line_once()
        })
    }

    /// Reads one response line with the trailing CR/LF stripped. Connects
    /// lazily; never retries. A clean close surfaces as `UnexpectedEof`.
    pub fn read_line(&mut self) -> HlldResult<String> {
        Ok(self.read_line_once()?)
    }

    /// Reads a START/END framed block, returning the lines between the
    /// markers. Never retries.
    pub fn read_block(&mut self) -> HlldResult<Vec<String>> {
        self.read_block_between(BLOCK_START, BLOCK_END)
    }

    /// Reads a block framed by explicit markers. A first line that is not
    /// the start marker is a protocol violation carrying that line.
    pub fn read_block_between(&mut self, start: &str, end: &str) -> HlldResult<Vec<String>> {
        self.ensure_connected()?;
        let reader = self.stream.as_mut().expect("stream populated above");
        read_block_from(reader, start, end)
    }

    /// Reads a block and splits each line into a key/value pair at the
    /// first space.
    pub fn read_block_as_map(&mut self) -> HlldResult<HashMap<String, String>> {
        let lines = self.read_block()?;
        Ok(block_to_map(&lines))
    }

    /// Runs `op` up to `attempts` times, discarding the socket and
    /// reconnecting after each transient fault. Non-transient faults
    /// propagate immediately without consuming further attempts.
    fn with_retry<T>(&mut self, mut op: impl FnMut(&mut Self) -> io::Result<T>) -> HlldResult<T> {
        let attempts = self.config.attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match op(self) {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => {
                    warn!(
                        target: "hlld::conn",
                        server = %self.endpoint,
                        attempt,
                        error = %err,
                        "transient fault, reconnecting"
                    );
                    self.stream = None;
                    last = Some(err);
                }
                Err(err) => return Err(HlldError::Io(err)),
            }
        }
        error!(
            target: "hlld::conn",
            server = %self.endpoint,
            attempts,
            "cannot contact hlld server"
        );
        Err(HlldError::ConnectionExhausted {
            attempts,
            last: last.expect("exhaustion implies a failed attempt"),
        })
    }

    fn send_once(&mut self, line: &str) -> io::Result<()> {
        self.write_buf.clear();
        self.write_buf.extend_from_slice(line.as_bytes());
        self.write_buf.push(b'\n');

        self.ensure_connected()?;
        let stream = self
            .stream
            .as_mut()
            .expect("stream populated above")
            .get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()
    }

    fn read_line_once(&mut self) -> io::Result<String> {
        self.ensure_connected()?;
        let reader = self.stream.as_mut().expect("stream populated above");
        read_line_from(reader)
    }

    fn ensure_connected(&mut self) -> io::Result<()> {
        if self.stream.is_none() {
            let stream = self.open_stream()?;
            debug!(target: "hlld::conn", server = %self.endpoint, "connected");
            self.stream = Some(BufReader::new(stream));
        }
        Ok(())
    }

    fn open_stream(&self) -> io::Result<TcpStream> {
        let stream = connect_stream(&self.endpoint, self.config.timeout)?;
        stream.set_read_timeout(self.config.timeout)?;
        stream.set_write_timeout(self.config.timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        enable_keepalive(&stream)?;
        Ok(stream)
    }
}

fn connect_stream(endpoint: &Endpoint, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let addrs = (endpoint.host.as_str(), endpoint.port).to_socket_addrs()?;
    let mut last_err = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")))
}

#[cfg(unix)]
fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    use nix::sys::socket::{setsockopt, sockopt};
    // std::net exposes no keep-alive knob; set the raw socket option.
    setsockopt(stream, sockopt::KeepAlive, &true).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn enable_keepalive(_stream: &TcpStream) -> io::Result<()> {
    Ok(())
}

fn read_line_from<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "server closed the connection",
        ));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn read_block_from<R: BufRead>(reader: &mut R, start: &str, end: &str) -> HlldResult<Vec<String>> {
    let first = read_line_from(reader)?;
    if first != start {
        return Err(ProtocolError::BadBlockStart {
            expected: start.to_string(),
            found: first,
        }
        .into());
    }
    let mut lines = Vec::new();
    loop {
        let line = read_line_from(reader)?;
        if line == end {
            return Ok(lines);
        }
        lines.push(line);
    }
}
