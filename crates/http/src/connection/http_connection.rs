use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use http::Method;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, trace};

use crate::codec::{BufReader, HeaderDecoder, RequestDecoder};
use crate::connection::message_writer::MessageWriter;
use crate::handler::{Dispatch, HttpService};
use crate::protocol::{
    ConnectionPolicy, DEFAULT_KEEP_ALIVE_TIMEOUT, DEFAULT_MAX_KEEP_ALIVE_REQUESTS, DispatchError, HttpError, KeepAliveClock,
    ParseError, Request, RequestLine, Response, ResponseMessage,
};
use crate::transport::Transport;

/// Arena size of one connection.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024 * 1024;

/// Initial size of the outbound buffer, it grows with the largest response.
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Per-connection limits, fixed before the server starts accepting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Arena capacity; a request line plus header block larger than this is rejected.
    pub buffer_capacity: usize,
    pub keep_alive_timeout: Duration,
    /// Requests served on one connection before it is closed.
    pub max_keep_alive_requests: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            keep_alive_timeout: DEFAULT_KEEP_ALIVE_TIMEOUT,
            max_keep_alive_requests: DEFAULT_MAX_KEEP_ALIVE_REQUESTS,
        }
    }
}

/// The per-connection task.
///
/// One `HttpConnection` owns one transport and serves the requests that arrive
/// on it strictly one after another:
///
/// ```text
/// Init ─▶ AwaitRequest ─▶ ParsingHeaders ─▶ Dispatching ─▶ Responding ─┬─▶ AwaitRequest
///                                                                       └─▶ Closing ─▶ Closed
/// ```
///
/// The transport is closed on every exit path of [`HttpConnection::process`].
/// Failures never escape as panics: a panicking middleware or dispatcher is
/// caught at the task boundary and answered like any other dispatch failure, with a best
/// effort `500` and `Connection: close`.
#[derive(Debug)]
pub struct HttpConnection {
    reader: BufReader,
    writer: MessageWriter,
    config: ConnectionConfig,
}

impl HttpConnection {
    pub fn new(transport: Box<dyn Transport>, config: ConnectionConfig) -> Self {
        Self {
            reader: BufReader::with_capacity(transport, config.buffer_capacity),
            writer: MessageWriter::with_capacity(WRITE_BUFFER_SIZE),
            config,
        }
    }

    pub async fn process<D: Dispatch>(mut self, service: &HttpService<D>) -> Result<(), HttpError> {
        let mut clock =
            KeepAliveClock::start(Instant::now(), self.config.keep_alive_timeout, self.config.max_keep_alive_requests);

        match timeout_at(clock.deadline(), self.reader.get_mut().init()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(cause = %e, "transport handshake error");
                self.close().await;
                return Err(HttpError::handshake(e));
            }
            Err(_elapsed) => {
                debug!("handshake not finished before deadline, close without response");
                self.close().await;
                return Ok(());
            }
        }

        let result = self.serve(service, &mut clock).await;
        self.close().await;
        result
    }

    async fn serve<D: Dispatch>(
        &mut self,
        service: &HttpService<D>,
        clock: &mut KeepAliveClock,
    ) -> Result<(), HttpError> {
        let mut served = 0usize;

        loop {
            self.reader.compact();

            let line = match self.read_head(clock).await {
                Ok(line) => line,
                Err(e) => return self.on_parse_error(e).await,
            };

            served += 1;
            if served >= self.config.max_keep_alive_requests {
                debug!(served, "keep-alive request limit reached");
                clock.expire();
            }

            let is_head = *line.method() == Method::HEAD;
            let dispatched = match line.resolve(self.reader.buffer()) {
                Ok(request) => dispatch_catching(service, &request).await,
                Err(e) => return self.on_parse_error(e).await,
            };

            let response = match dispatched {
                Ok(response) => response,
                Err(e) => {
                    error!(cause = %e, "dispatch request error");
                    self.send_error_response().await;
                    return Err(e.into());
                }
            };

            let mut message = ResponseMessage::new(response, clock.policy());
            if is_head {
                message = message.without_body();
            }
            if let Err(e) = self.writer.write(message) {
                self.send_error_response().await;
                return Err(e.into());
            }
            self.writer.flush(self.reader.get_mut()).await?;

            if !clock.is_persistent() || !self.reader.get_ref().is_open() {
                debug!(served, "close connection after response");
                return Ok(());
            }
            clock.reset(Instant::now());
            trace!(served, "keep-alive, await next request");
        }
    }

    async fn read_head(&mut self, clock: &mut KeepAliveClock) -> Result<RequestLine, ParseError> {
        let line = RequestDecoder::new().decode(&mut self.reader, clock.deadline()).await?;
        HeaderDecoder::new().decode(&mut self.reader, clock).await?;
        Ok(line)
    }

    async fn on_parse_error(&mut self, e: ParseError) -> Result<(), HttpError> {
        // the arena is compacted at the start of every cycle, so an empty
        // buffer means not a single byte of a next request arrived
        if e.is_silence() && self.reader.buffer().is_empty() {
            debug!(cause = %e, "connection idle, close without response");
            return Ok(());
        }

        if matches!(e, ParseError::ConnectionClosed) {
            info!(received = self.reader.buffer().len(), "peer closed connection in the middle of a request");
            return Err(e.into());
        }

        error!(cause = %e, "parse request error");
        self.send_error_response().await;
        Err(e.into())
    }

    /// Writes a `500` with `Connection: close`. Failures are ignored, the
    /// connection is closing anyway.
    async fn send_error_response(&mut self) {
        self.writer.clear_buf();
        let message = ResponseMessage::new(Response::internal_server_error(), ConnectionPolicy::Close);
        if let Err(e) = self.writer.write(message) {
            debug!(cause = %e, "render error response error");
            return;
        }
        if let Err(e) = self.writer.flush(self.reader.get_mut()).await {
            debug!(cause = %e, "send error response error");
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.reader.get_mut().close().await {
            debug!(cause = %e, "close transport error");
        }
    }
}

/// Runs the middlewares and the dispatcher. A panic in either becomes a
/// [`DispatchError`].
async fn dispatch_catching<D: Dispatch>(
    service: &HttpService<D>,
    request: &Request<'_>,
) -> Result<Response, DispatchError> {
    let dispatched = async {
        service.middlewares().on_request_received(request);
        service.dispatch().resolve(request).await
    };
    match AssertUnwindSafe(dispatched).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(DispatchError::panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use http::StatusCode;
    use indoc::indoc;

    use super::*;
    use crate::handler::{Middlewares, make_dispatch};
    use crate::protocol::Body;
    use crate::transport::{MemoryTransport, WrittenBytes};

    const JSON_BODY: &str = r#"{"hello":"world"}"#;

    fn service() -> HttpService<impl Dispatch> {
        let dispatch = make_dispatch(|request: &Request<'_>| match request.path() {
            "/json" => Ok(Response::ok(Body::new(mime::APPLICATION_JSON, JSON_BODY))),
            "/echo" => Ok(Response::text(request.query().to_string())),
            "/error" => Err(DispatchError::handler("handler failed")),
            "/panic" => panic!("handler panicked"),
            _ => Ok(Response::not_found()),
        });
        HttpService::new(dispatch)
    }

    async fn run(transport: MemoryTransport, config: ConnectionConfig) -> (Result<(), HttpError>, WrittenBytes) {
        let written = transport.written();
        let result = HttpConnection::new(Box::new(transport), config).process(&service()).await;
        (result, written)
    }

    async fn run_input(input: &'static str) -> (Result<(), HttpError>, String) {
        let (result, written) = run(MemoryTransport::with_input(input), ConnectionConfig::default()).await;
        assert!(written.is_closed());
        (result, written.to_string_lossy())
    }

    fn response_count(output: &str) -> usize {
        output.matches("HTTP/1.1 ").count()
    }

    #[tokio::test]
    async fn route_response_is_returned_unmodified() {
        let (result, output) = run_input("GET /json HTTP/1.1\r\nHost: x\r\n\r\n").await;
        result.unwrap();

        assert!(output.starts_with("HTTP/1.1 200 \r\n"));
        assert!(output.contains("\r\nConnection: keep-alive\r\nKeep-Alive: timeout=30, max=1000\r\n"));
        assert!(output.contains("\r\nContent-Type: application/json\r\n"));
        assert!(output.ends_with(&format!("Content-Length: {}\r\n\r\n{JSON_BODY}", JSON_BODY.len())));
        assert_eq!(response_count(&output), 1);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (result, output) = run_input("GET /missing HTTP/1.1\r\n\r\n").await;
        result.unwrap();

        assert!(output.starts_with("HTTP/1.1 404 \r\n"));
        assert!(output.contains("\r\nContent-Type: text/html\r\n"));
        assert!(output.ends_with("\r\n\r\n404 Not Found"));
    }

    #[tokio::test]
    async fn malformed_request_line_answers_500_and_closes() {
        let (result, output) = run_input("XYZ / HTTP/1.1\r\n\r\nGET /json HTTP/1.1\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::MalformedRequestLine { .. } })));
        assert!(output.starts_with("HTTP/1.1 500 \r\n"));
        assert!(output.contains("\r\nConnection: close\r\n"));
        assert!(output.ends_with("Content-Length: 0\r\n\r\n"));
        assert_eq!(response_count(&output), 1);
    }

    #[tokio::test]
    async fn unsupported_version_answers_500() {
        let (result, output) = run_input("GET / HTTP/1.0\r\n\r\n").await;
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::UnsupportedVersion })));
        assert!(output.starts_with("HTTP/1.1 500 \r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_times_out_silently() {
        let transport = MemoryTransport::builder().hold_open().build();
        let start = Instant::now();
        let (result, written) = run(transport, ConnectionConfig::default()).await;

        result.unwrap();
        assert!(written.is_empty());
        assert!(written.is_closed());
        assert!(Instant::now() - start >= DEFAULT_KEEP_ALIVE_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_after_first_response_times_out_silently() {
        let transport = MemoryTransport::builder().read("GET /json HTTP/1.1\r\n\r\n").hold_open().build();
        let (result, written) = run(transport, ConnectionConfig::default()).await;

        result.unwrap();
        assert_eq!(response_count(&written.to_string_lossy()), 1);
        assert!(written.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_times_out_with_500() {
        let transport = MemoryTransport::builder().read("GET /json HTTP/1.1\r\nHo").hold_open().build();
        let (result, written) = run(transport, ConnectionConfig::default()).await;

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::Timeout })));
        assert!(written.to_string_lossy().starts_with("HTTP/1.1 500 \r\n"));
    }

    #[tokio::test]
    async fn connection_close_is_honoured() {
        let input = indoc! {"
            GET /json HTTP/1.1\r
            Connection: close\r
            \r
            GET /json HTTP/1.1\r
            \r
        "};
        let (result, output) = run_input(input).await;
        result.unwrap();

        assert_eq!(response_count(&output), 1);
        assert!(output.contains("\r\nConnection: close\r\n"));
        assert!(!output.contains("keep-alive"));
    }

    #[tokio::test]
    async fn default_keeps_alive_across_requests() {
        let input = "GET /json HTTP/1.1\r\n\r\nGET /echo?a=1 HTTP/1.1\r\nHost: x\r\n\r\n";
        let (result, output) = run_input(input).await;
        result.unwrap();

        assert_eq!(response_count(&output), 2);
        assert_eq!(output.matches("Connection: keep-alive").count(), 2);
        assert!(output.ends_with("\r\n\r\na=1"));
    }

    #[tokio::test]
    async fn one_byte_fragments_serve_every_request() {
        let input = "GET /echo?x=1 HTTP/1.1\r\nHost: x\r\n\r\nGET /echo?y=2 HTTP/1.1\r\n\r\n";
        let whole = run_input(input).await.1;

        let transport = MemoryTransport::builder().read(input).max_read(1).build();
        let (result, written) = run(transport, ConnectionConfig::default()).await;
        result.unwrap();

        let fragmented = written.to_string_lossy();
        assert_eq!(response_count(&fragmented), 2);
        assert!(fragmented.contains("\r\n\r\nx=1HTTP/1.1 200 \r\n"));
        assert!(fragmented.ends_with("\r\n\r\ny=2"));
        assert_eq!(fragmented.len(), whole.len());
    }

    #[tokio::test]
    async fn keep_alive_request_limit() {
        let config = ConnectionConfig { max_keep_alive_requests: 2, ..ConnectionConfig::default() };
        let input = "GET /json HTTP/1.1\r\n\r\nGET /json HTTP/1.1\r\n\r\nGET /json HTTP/1.1\r\n\r\n";
        let (result, written) = run(MemoryTransport::with_input(input), config).await;
        result.unwrap();

        let output = written.to_string_lossy();
        assert_eq!(response_count(&output), 2);
        assert_eq!(output.matches("Keep-Alive: timeout=30, max=2").count(), 1);
        assert_eq!(output.matches("Connection: close").count(), 1);
    }

    #[tokio::test]
    async fn dispatch_error_answers_500_and_closes() {
        let (result, output) = run_input("GET /error HTTP/1.1\r\n\r\nGET /json HTTP/1.1\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::DispatchError { source: DispatchError::Handler { .. } })));
        assert_eq!(response_count(&output), 1);
        assert!(output.starts_with("HTTP/1.1 500 \r\n"));
        assert!(output.contains("\r\nConnection: close\r\n"));
    }

    #[tokio::test]
    async fn panic_is_caught_at_task_boundary() {
        let (result, output) = run_input("GET /panic HTTP/1.1\r\n\r\n").await;

        match result {
            Err(HttpError::DispatchError { source: DispatchError::Panic { message } }) => {
                assert_eq!(message, "handler panicked")
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(output.starts_with("HTTP/1.1 500 \r\n"));
    }

    #[tokio::test]
    async fn head_omits_body() {
        let (result, output) = run_input("HEAD /json HTTP/1.1\r\n\r\n").await;
        result.unwrap();

        assert!(output.ends_with(&format!("Content-Length: {}\r\n\r\n", JSON_BODY.len())));
    }

    #[tokio::test]
    async fn oversized_head_answers_500() {
        let config = ConnectionConfig { buffer_capacity: 32, ..ConnectionConfig::default() };
        let input = "GET /json HTTP/1.1\r\nUser-Agent: a-very-long-user-agent\r\n\r\n";
        let (result, written) = run(MemoryTransport::with_input(input), config).await;

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::TooLargeHead { capacity: 32 } })));
        assert!(written.to_string_lossy().starts_with("HTTP/1.1 500 \r\n"));
    }

    #[tokio::test]
    async fn peer_gone_mid_request_gets_no_response() {
        let (result, output) = run_input("GET /json HTTP/1.1\r\nHost").await;

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::ConnectionClosed })));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn handshake_failure_is_fatal() {
        let transport = MemoryTransport::builder()
            .read("GET /json HTTP/1.1\r\n\r\n")
            .fail_handshake(io::ErrorKind::InvalidData)
            .build();
        let (result, written) = run(transport, ConnectionConfig::default()).await;

        assert!(matches!(result, Err(HttpError::HandshakeError { .. })));
        assert!(written.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_handshake_is_closed_at_deadline() {
        let config = ConnectionConfig { keep_alive_timeout: Duration::from_secs(2), ..ConnectionConfig::default() };
        let transport = MemoryTransport::builder().read("GET /json HTTP/1.1\r\n\r\n").stall_handshake().build();
        let start = Instant::now();
        let (result, written) = run(transport, config).await;

        result.unwrap();
        assert!(written.is_empty());
        assert!(written.is_closed());
        assert!(Instant::now() - start >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn middleware_panic_answers_500_and_closes() {
        let panicking = |request: &Request<'_>| assert!(request.path().is_empty(), "middleware panicked");
        let dispatch = make_dispatch(|_request: &Request<'_>| Ok(Response::text("unreachable")));
        let service = HttpService::with_middlewares(dispatch, Middlewares::builder().add_last(panicking).build());

        let transport = MemoryTransport::with_input("GET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\n");
        let written = transport.written();
        let result = HttpConnection::new(Box::new(transport), ConnectionConfig::default()).process(&service).await;

        match result {
            Err(HttpError::DispatchError { source: DispatchError::Panic { message } }) => {
                assert_eq!(message, "middleware panicked")
            }
            other => panic!("unexpected result {other:?}"),
        }
        let output = written.to_string_lossy();
        assert_eq!(response_count(&output), 1);
        assert!(output.starts_with("HTTP/1.1 500 \r\n"));
        assert!(output.contains("\r\nConnection: close\r\n"));
        assert!(written.is_closed());
    }

    #[tokio::test]
    async fn middlewares_observe_requests_before_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let seen = seen.clone();
            move |request: &Request<'_>| {
                seen.lock().unwrap().push(format!("{} {} {}", request.method(), request.path(), request.query()))
            }
        };
        let dispatch = make_dispatch(|_request: &Request<'_>| Ok(Response::from(StatusCode::NO_CONTENT)));
        let service = HttpService::with_middlewares(dispatch, Middlewares::builder().add_last(recorder).build());

        let transport = MemoryTransport::with_input("GET /a?b=c HTTP/1.1\r\n\r\nPOST /d HTTP/1.1\r\n\r\n");
        HttpConnection::new(Box::new(transport), ConnectionConfig::default()).process(&service).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["GET /a b=c", "POST /d "]);
    }
}
