use std::time::{SystemTime, UNIX_EPOCH};

use kiln_http::protocol::Request;
use kiln_web::{Json, RequestLogger, Router, Server, handler_fn};
use serde::Serialize;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Serialize)]
struct TimeResponse {
    hour: u64,
    minute: u64,
    second: u64,
}

fn handle_json(_request: &Request<'_>) -> Json<Message> {
    Json(Message { message: "Hello, World!" })
}

fn handle_time(_request: &Request<'_>) -> Json<TimeResponse> {
    let seconds = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs()) % 86_400;
    Json(TimeResponse { hour: seconds / 3600, minute: seconds / 60 % 60, second: seconds % 60 })
}

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder().get("/json", handler_fn(handle_json)).get("/api/time", handler_fn(handle_time)).build();

    let server = Server::builder()
        .address("127.0.0.1:8080")
        // .tls("localhost.pem", "localhost-key.pem")
        .threads(4)
        .static_files("/", concat!(env!("CARGO_MANIFEST_DIR"), "/examples/static"))
        .middleware(RequestLogger)
        .router(router)
        .build();

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "build server error");
            return;
        }
    };

    if let Err(e) = server.run() {
        error!(cause = %e, "server stopped with error");
    }
}
