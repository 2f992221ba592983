use kiln_http::handler::Middleware;
use kiln_http::protocol::Request;
use tracing::info;

/// Logs the method and path of every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn on_request_received(&self, request: &Request<'_>) {
        info!(method = %request.method(), path = request.path(), "request received");
    }
}
