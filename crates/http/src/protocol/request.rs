//! Parsed HTTP request values.
//!
//! The parser never copies the request line out of the connection arena. It
//! records `(offset, length)` [`Span`]s into a [`RequestLine`], and the
//! connection task resolves them into a borrowed [`Request`] once the header
//! block has been consumed. A `Request` therefore lives at most for one
//! request cycle: the arena is compacted before the next request is read.

use http::Method;

use crate::protocol::ParseError;

/// A byte range inside the connection arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Span {
    offset: usize,
    len: usize,
}

impl Span {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { offset: start, len: end - start }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns the bytes covered by this span, or `None` when the span does not
    /// fit inside `buffer`.
    pub fn slice<'a>(&self, buffer: &'a [u8]) -> Option<&'a [u8]> {
        buffer.get(self.offset..self.end())
    }
}

/// The spans of one request line, as produced by the request decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub(crate) method: Method,
    pub(crate) path: Span,
    pub(crate) query: Span,
}

impl RequestLine {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> Span {
        self.path
    }

    pub fn query(&self) -> Span {
        self.query
    }

    /// Borrows the path and query out of `buffer`.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError::MalformedRequestLine`] when a span lies outside
    /// the buffer or does not hold UTF-8.
    pub fn resolve<'a>(&self, buffer: &'a [u8]) -> Result<Request<'a>, ParseError> {
        let path = resolve_str(self.path, buffer, "path")?;
        let query = resolve_str(self.query, buffer, "query")?;
        Ok(Request { method: self.method.clone(), path, query })
    }
}

fn resolve_str<'a>(span: Span, buffer: &'a [u8], part: &str) -> Result<&'a str, ParseError> {
    let bytes = span.slice(buffer).ok_or_else(|| ParseError::malformed_request_line(format!("{part} outside buffer")))?;
    std::str::from_utf8(bytes).map_err(|_e| ParseError::malformed_request_line(format!("{part} is not utf-8")))
}

/// An immutable view of one parsed request.
///
/// Only the request line is retained: the header block is scanned for its
/// keep-alive effect and otherwise discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    method: Method,
    path: &'a str,
    query: &'a str,
}

impl<'a> Request<'a> {
    pub fn new(method: Method, path: &'a str, query: &'a str) -> Self {
        Self { method, path, query }
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path exactly as sent, without percent-decoding.
    pub fn path(&self) -> &'a str {
        self.path
    }

    /// The raw query string after `?`, empty when the request had none.
    pub fn query(&self) -> &'a str {
        self.query
    }
}
