use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::{Buf, Bytes};

use crate::protocol::TransportError;
use crate::transport::Transport;

/// A scripted in-memory transport.
///
/// Inbound bytes are delivered fragment by fragment, exactly as they were
/// queued through [`MemoryTransportBuilder::read`], optionally cut further by
/// [`MemoryTransportBuilder::max_read`]. Outbound bytes are collected in a
/// [`WrittenBytes`] handle that stays readable after the transport is dropped.
///
/// Once the script is drained the transport either reports end of stream or,
/// with [`MemoryTransportBuilder::hold_open`], stays silent forever, which is
/// what a client that keeps an idle connection looks like.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: VecDeque<Bytes>,
    max_read: usize,
    hold_open: bool,
    handshake_failure: Option<io::ErrorKind>,
    stall_handshake: bool,
    written: WrittenBytes,
    read_closed: bool,
    shut_down: bool,
}

impl MemoryTransport {
    pub fn builder() -> MemoryTransportBuilder {
        MemoryTransportBuilder::new()
    }

    /// A transport that delivers `bytes` in one fragment, then reports end of stream.
    pub fn with_input(bytes: impl Into<Bytes>) -> Self {
        Self::builder().read(bytes).build()
    }

    /// A handle to everything written to this transport so far.
    pub fn written(&self) -> WrittenBytes {
        self.written.clone()
    }

    /// Whether [`Transport::close`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

#[derive(Debug)]
pub struct MemoryTransportBuilder {
    inbound: VecDeque<Bytes>,
    max_read: usize,
    hold_open: bool,
    handshake_failure: Option<io::ErrorKind>,
    stall_handshake: bool,
}

impl MemoryTransportBuilder {
    fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            max_read: usize::MAX,
            hold_open: false,
            handshake_failure: None,
            stall_handshake: false,
        }
    }

    /// Queues one inbound fragment. Empty fragments are ignored.
    pub fn read(mut self, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if !bytes.is_empty() {
            self.inbound.push_back(bytes);
        }
        self
    }

    /// Caps the bytes a single receive returns.
    pub fn max_read(mut self, max_read: usize) -> Self {
        assert!(max_read > 0, "max_read must be positive");
        self.max_read = max_read;
        self
    }

    /// Stay open and silent after the script is drained instead of reporting end of stream.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Makes [`Transport::init`] fail the way a broken TLS handshake does.
    pub fn fail_handshake(mut self, kind: io::ErrorKind) -> Self {
        self.handshake_failure = Some(kind);
        self
    }

    /// Makes [`Transport::init`] never finish, like a client that connects
    /// and never sends its hello.
    pub fn stall_handshake(mut self) -> Self {
        self.stall_handshake = true;
        self
    }

    pub fn build(self) -> MemoryTransport {
        MemoryTransport {
            inbound: self.inbound,
            max_read: self.max_read,
            hold_open: self.hold_open,
            handshake_failure: self.handshake_failure,
            stall_handshake: self.stall_handshake,
            written: WrittenBytes::default(),
            read_closed: false,
            shut_down: false,
        }
    }
}

/// Shared view of what a [`MemoryTransport`] sent, readable after the
/// transport itself is gone.
#[derive(Debug, Clone, Default)]
pub struct WrittenBytes {
    inner: Arc<Mutex<Outbound>>,
}

#[derive(Debug, Default)]
struct Outbound {
    bytes: Vec<u8>,
    closed: bool,
}

impl WrittenBytes {
    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// The written bytes, lossily decoded as UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock().bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the transport has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Outbound> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn init(&mut self) -> Result<(), TransportError> {
        if self.stall_handshake {
            return std::future::pending().await;
        }
        match self.handshake_failure {
            Some(kind) => {
                self.read_closed = true;
                self.shut_down = true;
                Err(TransportError::handshake(io::Error::from(kind)))
            }
            None => Ok(()),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if let Some(front) = self.inbound.front_mut() {
            let n = front.len().min(buf.len()).min(self.max_read);
            buf[..n].copy_from_slice(&front[..n]);
            front.advance(n);
            if front.is_empty() {
                self.inbound.pop_front();
            }
            return Ok(n);
        }

        if self.hold_open {
            return std::future::pending().await;
        }

        self.read_closed = true;
        Ok(0)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.shut_down {
            return Err(TransportError::io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.written.lock().bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn available(&self) -> usize {
        self.inbound.front().map_or(0, |front| front.len().min(self.max_read))
    }

    fn is_open(&self) -> bool {
        !self.read_closed && !self.shut_down
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shut_down = true;
        self.written.lock().closed = true;
        Ok(())
    }
}
