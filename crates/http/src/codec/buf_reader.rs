//! Fixed arena reader on top of a [`Transport`].
//!
//! The arena is allocated once per connection and never resized. Two offsets
//! partition it:
//!
//! ```text
//! 0            read_pos          fill_end            capacity
//! | consumed    | unconsumed      | unfilled          |
//! ```
//!
//! Every parse step is a cursor scan over `read_pos..fill_end` that calls
//! [`BufReader::refill`] when it runs out of bytes, so a request may arrive in
//! any number of fragments. Scans only move `read_pos` forward.

use tokio::time::{Instant, timeout_at};
use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;
use crate::transport::Transport;

pub struct BufReader {
    transport: Box<dyn Transport>,
    arena: Box<[u8]>,
    read_pos: usize,
    fill_end: usize,
}

impl BufReader {
    pub fn with_capacity(transport: Box<dyn Transport>, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        Self { transport, arena: vec![0u8; capacity].into_boxed_slice(), read_pos: 0, fill_end: 0 }
    }

    #[inline]
    pub fn get_ref(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// The read cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    #[inline]
    pub fn unconsumed(&self) -> usize {
        self.fill_end - self.read_pos
    }

    /// Everything received since the last [`BufReader::compact`], consumed or not.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.arena[..self.fill_end]
    }

    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.arena[self.read_pos..self.fill_end]
    }

    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.unconsumed(), "consume past fill end");
        self.read_pos = (self.read_pos + n).min(self.fill_end);
    }

    /// Performs one partial receive into the unfilled region.
    ///
    /// Returns the number of bytes received, always at least 1.
    pub async fn refill(&mut self, deadline: Instant) -> Result<usize, ParseError> {
        let capacity = self.arena.len();
        ensure!(self.fill_end < capacity, ParseError::too_large_head(capacity));
        ensure!(self.transport.is_open(), ParseError::ConnectionClosed);

        // a receive that is ready wins even past the deadline
        let unfilled = &mut self.arena[self.fill_end..];
        let received = match timeout_at(deadline, self.transport.receive(unfilled)).await {
            Ok(received) => received?,
            Err(_elapsed) => return Err(ParseError::Timeout),
        };
        ensure!(received > 0, ParseError::ConnectionClosed);

        self.fill_end += received;
        trace!(received, fill_end = self.fill_end, pending = self.transport.available(), "refill buffer");
        Ok(received)
    }

    /// Refills until at least `n` unconsumed bytes are present.
    pub async fn wait_for_count(&mut self, n: usize, deadline: Instant) -> Result<(), ParseError> {
        while self.unconsumed() < n {
            self.refill(deadline).await?;
        }
        Ok(())
    }

    /// Moves the cursor onto the first byte contained in `set` and returns it.
    /// The matched byte itself is not consumed.
    pub async fn find_first_of(&mut self, set: &[u8], deadline: Instant) -> Result<u8, ParseError> {
        loop {
            let window = &self.arena[self.read_pos..self.fill_end];
            if let Some(index) = window.iter().position(|b| set.contains(b)) {
                let found = window[index];
                self.read_pos += index;
                return Ok(found);
            }
            self.read_pos = self.fill_end;
            self.refill(deadline).await?;
        }
    }

    pub async fn find(&mut self, byte: u8, deadline: Instant) -> Result<u8, ParseError> {
        self.find_first_of(&[byte], deadline).await
    }

    /// Consumes bytes while `predicate` holds and returns the first byte that
    /// does not match, leaving it unconsumed.
    pub async fn skip_while<P>(&mut self, predicate: P, deadline: Instant) -> Result<u8, ParseError>
    where
        P: Fn(u8) -> bool,
    {
        loop {
            let window = &self.arena[self.read_pos..self.fill_end];
            if let Some(index) = window.iter().position(|b| !predicate(*b)) {
                let found = window[index];
                self.read_pos += index;
                return Ok(found);
            }
            self.read_pos = self.fill_end;
            self.refill(deadline).await?;
        }
    }

    /// Returns the byte under the cursor without consuming it.
    pub async fn peek(&mut self, deadline: Instant) -> Result<u8, ParseError> {
        self.wait_for_count(1, deadline).await?;
        Ok(self.arena[self.read_pos])
    }

    /// Moves the unconsumed bytes to the front of the arena.
    ///
    /// Called between request cycles only: spans handed out for the previous
    /// request are invalid afterwards.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.arena.copy_within(self.read_pos..self.fill_end, 0);
        self.fill_end -= self.read_pos;
        self.read_pos = 0;
    }
}

impl std::fmt::Debug for BufReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufReader")
            .field("capacity", &self.arena.len())
            .field("read_pos", &self.read_pos)
            .field("fill_end", &self.fill_end)
            .finish()
    }
}
