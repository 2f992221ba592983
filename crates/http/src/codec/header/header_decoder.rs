//! Header block scanner.
//!
//! The core keeps no header map. The scanner walks the header block line by
//! line until the blank line, and the only header it looks into is
//! `Connection`, whose value decides whether the connection persists after the
//! response. Every other line is skipped up to its terminator.
//!
//! # Line rules
//!
//! - lines end with `\r\n`; a bare `\n` is accepted, a `\r` followed by
//!   anything else is rejected
//! - a non-empty line must contain `:`
//! - spaces and tabs after `:` are skipped
//! - the name `Connection` is matched case-sensitively

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::codec::BufReader;
use crate::ensure;
use crate::protocol::{KeepAliveClock, ParseError};

const CONNECTION: &[u8] = b"Connection";

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

impl HeaderDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Consumes the header block including its blank line, applying any
    /// `Connection` header to `clock`.
    pub async fn decode(&self, reader: &mut BufReader, clock: &mut KeepAliveClock) -> Result<(), ParseError> {
        loop {
            let line_start = reader.position();
            let found = reader.find_first_of(b":\r\n", clock.deadline()).await?;
            let name_end = reader.position();

            if found != b':' {
                ensure!(name_end == line_start, ParseError::invalid_header("header line without colon"));
                consume_line_end(reader, found, clock.deadline()).await?;
                trace!(header_bytes = reader.position(), "header block finished");
                return Ok(());
            }

            ensure!(name_end > line_start, ParseError::invalid_header("empty header name"));
            let is_connection = &reader.buffer()[line_start..name_end] == CONNECTION;
            reader.consume(1);

            reader.skip_while(|b| b == b' ' || b == b'\t', clock.deadline()).await?;
            let value_start = reader.position();
            let terminator = reader.find_first_of(b"\r\n", clock.deadline()).await?;

            if is_connection {
                let value = &reader.buffer()[value_start..reader.position()];
                clock.observe_connection_header(value, Instant::now());
                debug!(persistent = clock.is_persistent(), "observed connection header");
            }

            consume_line_end(reader, terminator, clock.deadline()).await?;
        }
    }
}

async fn consume_line_end(reader: &mut BufReader, terminator: u8, deadline: Instant) -> Result<(), ParseError> {
    reader.consume(1);
    if terminator == b'\r' {
        let next = reader.peek(deadline).await?;
        ensure!(next == b'\n', ParseError::invalid_header("carriage return without line feed"));
        reader.consume(1);
    }
    Ok(())
}
