use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionConfig, HttpConnection};
use crate::handler::{Dispatch, HttpService};
use crate::server::Acceptor;

/// Accepts connections from `listener` until `shutdown` resolves, spawning one
/// task per connection on the current runtime.
///
/// Accept failures are logged and skipped. Connections that are already
/// running when `shutdown` resolves are left to finish on their own.
///
/// # Errors
///
/// Fails only when the listener cannot report its local address.
pub async fn serve<D, S>(
    listener: TcpListener,
    acceptor: Acceptor,
    service: Arc<HttpService<D>>,
    config: ConnectionConfig,
    shutdown: S,
) -> io::Result<()>
where
    D: Dispatch + 'static,
    S: Future<Output = ()>,
{
    let local_addr = listener.local_addr()?;
    info!(%local_addr, tls = acceptor.is_tls(), "start accepting connections");

    tokio::pin!(shutdown);
    loop {
        let (tcp_stream, remote_addr) = select! {
            biased;
            () = &mut shutdown => {
                info!(%local_addr, "stop accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            },
        };

        if let Err(e) = tcp_stream.set_nodelay(true) {
            debug!(cause = %e, "set tcp nodelay error");
        }

        let transport = acceptor.accept(tcp_stream);
        let service = Arc::clone(&service);
        let config = config.clone();

        tokio::spawn(async move {
            let connection = HttpConnection::new(transport, config);
            match connection.process(&service).await {
                Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
            }
        });
    }
}
