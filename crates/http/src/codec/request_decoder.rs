//! Incremental request line decoder.
//!
//! The decoder reads `<METHOD> <path>[?<query>] HTTP/1.1\r\n` straight out of
//! the connection arena and records where the path and query live instead of
//! copying them. The method is classified from its first one or two bytes;
//! eight buffered bytes always cover the longest method keyword plus its space.

use http::Method;
use tokio::time::Instant;
use tracing::trace;

use crate::codec::BufReader;
use crate::ensure;
use crate::protocol::{ParseError, RequestLine, Span};

/// The shortest prefix that decides and verifies every method keyword.
const MIN_REQUEST_LINE: usize = 8;

const HTTP_11_SUFFIX: &[u8] = b" HTTP/1.1\r\n";

#[derive(Debug, Default, Clone, Copy)]
pub struct RequestDecoder;

impl RequestDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes one request line, leaving the cursor on the first header byte.
    pub async fn decode(&self, reader: &mut BufReader, deadline: Instant) -> Result<RequestLine, ParseError> {
        reader.wait_for_count(MIN_REQUEST_LINE, deadline).await?;

        let (method, keyword) = classify_method(reader.remaining())?;
        ensure!(
            reader.remaining().starts_with(keyword),
            ParseError::malformed_request_line(format!("expect method keyword {}", method))
        );
        reader.consume(keyword.len());

        let path_start = reader.position();
        let delimiter = reader.find_first_of(b"? \n", deadline).await?;
        let path = Span::new(path_start, reader.position());
        ensure!(delimiter != b'\n', ParseError::malformed_request_line("request line ends before http version"));
        ensure!(!path.is_empty(), ParseError::malformed_request_line("empty path"));

        let query = if delimiter == b'?' {
            reader.consume(1);
            let query_start = reader.position();
            let delimiter = reader.find_first_of(b" \n", deadline).await?;
            ensure!(delimiter == b' ', ParseError::malformed_request_line("request line ends before http version"));
            Span::new(query_start, reader.position())
        } else {
            Span::new(path.end(), path.end())
        };

        expect_http_11(reader, deadline).await?;

        let buffer = reader.buffer();
        for span in [path, query] {
            let bytes = span.slice(buffer).unwrap_or_default();
            ensure!(std::str::from_utf8(bytes).is_ok(), ParseError::malformed_request_line("request target is not utf-8"));
        }

        trace!(%method, path_len = path.len(), query_len = query.len(), "decoded request line");
        Ok(RequestLine { method, path, query })
    }
}

fn classify_method(head: &[u8]) -> Result<(Method, &'static [u8]), ParseError> {
    let unknown = || ParseError::malformed_request_line("unknown method");

    let classified = match head.first().copied() {
        Some(b'G') => (Method::GET, b"GET ".as_slice()),
        Some(b'H') => (Method::HEAD, b"HEAD ".as_slice()),
        Some(b'P') => match head.get(1).copied() {
            Some(b'O') => (Method::POST, b"POST ".as_slice()),
            Some(b'U') => (Method::PUT, b"PUT ".as_slice()),
            Some(b'A') => (Method::PATCH, b"PATCH ".as_slice()),
            _ => return Err(unknown()),
        },
        Some(b'D') => (Method::DELETE, b"DELETE ".as_slice()),
        Some(b'C') => (Method::CONNECT, b"CONNECT ".as_slice()),
        Some(b'O') => (Method::OPTIONS, b"OPTIONS ".as_slice()),
        Some(b'T') => (Method::TRACE, b"TRACE ".as_slice()),
        _ => return Err(unknown()),
    };
    Ok(classified)
}

/// Matches the version suffix byte by byte as it arrives, so a wrong version
/// fails as soon as the first differing byte is buffered.
async fn expect_http_11(reader: &mut BufReader, deadline: Instant) -> Result<(), ParseError> {
    loop {
        let n = reader.unconsumed().min(HTTP_11_SUFFIX.len());
        ensure!(reader.remaining()[..n] == HTTP_11_SUFFIX[..n], ParseError::UnsupportedVersion);
        if n == HTTP_11_SUFFIX.len() {
            reader.consume(n);
            return Ok(());
        }
        reader.refill(deadline).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::protocol::Request;
    use crate::transport::MemoryTransport;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    async fn decode_with(transport: MemoryTransport) -> (Result<RequestLine, ParseError>, BufReader) {
        let mut reader = BufReader::with_capacity(Box::new(transport), 1024);
        let result = RequestDecoder::new().decode(&mut reader, deadline()).await;
        (result, reader)
    }

    async fn decode(input: &'static str) -> Result<(Method, String, String), ParseError> {
        let (result, reader) = decode_with(MemoryTransport::with_input(input)).await;
        let line = result?;
        let request = line.resolve(reader.buffer())?;
        Ok((request.method().clone(), request.path().to_string(), request.query().to_string()))
    }

    #[tokio::test]
    async fn path_and_query() {
        let (method, path, query) = decode("GET /api/time?tz=utc&fmt=iso HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        assert_eq!(method, Method::GET);
        assert_eq!(path, "/api/time");
        assert_eq!(query, "tz=utc&fmt=iso");
    }

    #[tokio::test]
    async fn shortest_request_line() {
        let (method, path, query) = decode("GET / HTTP/1.1\r\n").await.unwrap();
        assert_eq!(method, Method::GET);
        assert_eq!(path, "/");
        assert_eq!(query, "");
    }

    #[tokio::test]
    async fn empty_query_after_question_mark() {
        let (_, path, query) = decode("GET /a? HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(path, "/a");
        assert_eq!(query, "");
    }

    #[tokio::test]
    async fn every_method() {
        let cases = [
            ("GET / HTTP/1.1\r\n", Method::GET),
            ("HEAD / HTTP/1.1\r\n", Method::HEAD),
            ("POST / HTTP/1.1\r\n", Method::POST),
            ("PUT / HTTP/1.1\r\n", Method::PUT),
            ("PATCH / HTTP/1.1\r\n", Method::PATCH),
            ("DELETE / HTTP/1.1\r\n", Method::DELETE),
            ("CONNECT / HTTP/1.1\r\n", Method::CONNECT),
            ("OPTIONS / HTTP/1.1\r\n", Method::OPTIONS),
            ("TRACE / HTTP/1.1\r\n", Method::TRACE),
        ];
        for (input, expected) in cases {
            let (method, path, _) = decode(input).await.unwrap();
            assert_eq!(method, expected, "{input}");
            assert_eq!(path, "/");
        }
    }

    #[tokio::test]
    async fn fragmentation_never_changes_the_result() {
        let input = "PATCH /users/42?name=kiln&x= HTTP/1.1\r\nHost: x\r\n\r\n";
        let (whole, reader) = decode_with(MemoryTransport::with_input(input)).await;
        let whole = whole.unwrap();
        let expected: Request<'_> = whole.resolve(reader.buffer()).unwrap();

        for max_read in 1..input.len() {
            let transport = MemoryTransport::builder().read(input).max_read(max_read).build();
            let (line, reader) = decode_with(transport).await;
            let line = line.unwrap();
            assert_eq!(line, whole, "max_read = {max_read}");
            assert_eq!(line.resolve(reader.buffer()).unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn independent_buffers_decode_equal() {
        let first = decode("DELETE /item?id=7 HTTP/1.1\r\n\r\n").await.unwrap();
        let second = decode("DELETE /item?id=7 HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cursor_stops_at_first_header() {
        let (line, reader) = decode_with(MemoryTransport::with_input("GET /x HTTP/1.1\r\nHost: y\r\n\r\n")).await;
        line.unwrap();
        assert_eq!(reader.remaining(), b"Host: y\r\n\r\n");
    }

    #[tokio::test]
    async fn unknown_method() {
        let e = decode("XYZ / HTTP/1.1\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::MalformedRequestLine { .. }));

        let e = decode("PIN / HTTP/1.1\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::MalformedRequestLine { .. }));
    }

    #[tokio::test]
    async fn keyword_must_match_entirely() {
        let e = decode("GOT / HTTP/1.1\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::MalformedRequestLine { .. }));

        let e = decode("get / HTTP/1.1\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::MalformedRequestLine { .. }));
    }

    #[tokio::test]
    async fn empty_path() {
        let e = decode("GET  HTTP/1.1\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::MalformedRequestLine { .. }));
    }

    #[tokio::test]
    async fn missing_version() {
        let e = decode("GET /index\r\nHost: x\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::MalformedRequestLine { .. }));
    }

    #[tokio::test]
    async fn only_http_11() {
        let e = decode("GET / HTTP/1.0\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::UnsupportedVersion));

        let e = decode("GET / HTTP/2\r\n\r\n").await.unwrap_err();
        assert!(matches!(e, ParseError::UnsupportedVersion));
    }

    #[tokio::test]
    async fn non_utf8_path() {
        let transport = MemoryTransport::with_input(&b"GET /\xff HTTP/1.1\r\n\r\n"[..]);
        let (result, _) = decode_with(transport).await;
        assert!(matches!(result, Err(ParseError::MalformedRequestLine { .. })));
    }

    #[tokio::test]
    async fn truncated_line_is_connection_closed() {
        let e = decode("GET /index HT").await.unwrap_err();
        assert!(matches!(e, ParseError::ConnectionClosed));
    }
}
