use std::fmt;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use kiln_http::connection::ConnectionConfig;
use kiln_http::handler::{HttpService, Middleware, MiddlewaresBuilder, Middlewares};
use kiln_http::server::{Acceptor, ThreadPool, serve, serve_blocking};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::{Scheduling, ServerConfig, StaticFilesConfig, TlsConfig};
use crate::error::{ServerBuildError, ServerError, TlsConfigError};
use crate::router::Router;
use crate::static_files::StaticFiles;

/// Collects the configuration of a [`Server`].
///
/// Settings are applied on top of a [`ServerConfig`], the default one unless
/// [`ServerBuilder::config`] replaces it; later calls override earlier ones.
pub struct ServerBuilder {
    config: ServerConfig,
    address_error: Option<io::Error>,
    listeners: Vec<StdTcpListener>,
    router: Option<Router>,
    middlewares: MiddlewaresBuilder,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            address_error: None,
            listeners: vec![],
            router: None,
            middlewares: Middlewares::builder(),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the addresses to listen on.
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        match address.to_socket_addrs() {
            Ok(addresses) => self.config.addresses = addresses.collect(),
            Err(e) => self.address_error = Some(e),
        }
        self
    }

    /// Serves an already bound listener, in addition to the configured addresses.
    pub fn listener(mut self, listener: StdTcpListener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.config.keep_alive_timeout_secs = timeout.as_secs();
        self
    }

    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.config.buffer_capacity = buffer_capacity;
        self
    }

    pub fn max_keep_alive_requests(mut self, max_keep_alive_requests: usize) -> Self {
        self.config.max_keep_alive_requests = max_keep_alive_requests;
        self
    }

    /// Serves HTTPS with the PEM certificate chain and private key at these paths.
    pub fn tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.config.tls = Some(TlsConfig { cert_path: cert_path.into(), key_path: key_path.into() });
        self
    }

    pub fn static_files(mut self, prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.config.static_files = Some(StaticFilesConfig { prefix: prefix.into(), root: root.into() });
        self
    }

    pub fn scheduling(mut self, scheduling: Scheduling) -> Self {
        self.config.scheduling = scheduling;
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Appends a middleware; middlewares run in the order they are added.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares = self.middlewares.add_last(middleware);
        self
    }

    /// Freezes the configuration.
    ///
    /// # Errors
    ///
    /// Fails on an invalid setting, when there is nothing to listen on, or when
    /// the TLS files cannot be loaded.
    pub fn build(self) -> Result<Server, ServerBuildError> {
        if let Some(source) = self.address_error {
            return Err(ServerBuildError::InvalidAddress { source });
        }
        let config = self.config;
        if config.addresses.is_empty() && self.listeners.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }
        validate(&config)?;

        let acceptor = match &config.tls {
            Some(tls) => tls_acceptor(tls)?,
            None => Acceptor::Plain,
        };

        let mut router = self.router.unwrap_or_else(|| Router::builder().build());
        if let Some(static_files) = &config.static_files {
            router.set_static_files(StaticFiles::new(static_files.prefix.clone(), static_files.root.clone()));
        }

        let service = Arc::new(HttpService::with_middlewares(router, self.middlewares.build()));
        Ok(Server {
            service,
            acceptor,
            connection_config: config.to_connection_config(),
            addresses: config.addresses,
            listeners: self.listeners,
            threads: config.threads,
            scheduling: config.scheduling,
        })
    }
}

fn validate(config: &ServerConfig) -> Result<(), ServerBuildError> {
    if config.threads == 0 {
        return Err(ServerBuildError::invalid_setting("threads", "must be positive"));
    }
    if config.buffer_capacity == 0 {
        return Err(ServerBuildError::invalid_setting("buffer_capacity", "must be positive"));
    }
    if config.max_keep_alive_requests == 0 {
        return Err(ServerBuildError::invalid_setting("max_keep_alive_requests", "must be positive"));
    }
    if let Scheduling::ThreadPool { max_connections: 0 } = config.scheduling {
        return Err(ServerBuildError::invalid_setting("max_connections", "must be positive"));
    }
    Ok(())
}

#[cfg(feature = "tls")]
fn tls_acceptor(tls: &TlsConfig) -> Result<Acceptor, TlsConfigError> {
    crate::tls::load_acceptor(&tls.cert_path, &tls.key_path).map(Acceptor::from)
}

#[cfg(not(feature = "tls"))]
fn tls_acceptor(_tls: &TlsConfig) -> Result<Acceptor, TlsConfigError> {
    Err(TlsConfigError::Unsupported)
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// A configured server.
///
/// [`Server::run`] owns the threads it serves on and blocks the caller;
/// [`Server::start`] and [`Server::start_with_shutdown`] serve from inside an
/// existing tokio runtime.
pub struct Server {
    service: Arc<HttpService<Router>>,
    acceptor: Acceptor,
    connection_config: ConnectionConfig,
    addresses: Vec<SocketAddr>,
    listeners: Vec<StdTcpListener>,
    threads: usize,
    scheduling: Scheduling,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Serves with the configured scheduling model until interrupted.
    ///
    /// # Errors
    ///
    /// Fails when an address cannot be bound or the worker threads cannot be
    /// started.
    pub fn run(self) -> Result<(), ServerError> {
        match self.scheduling {
            Scheduling::Reactor => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(self.threads)
                    .enable_all()
                    .build()
                    .map_err(ServerError::runtime)?;
                runtime.block_on(self.start())
            }
            Scheduling::ThreadPool { max_connections } => self.run_thread_pool(max_connections),
        }
    }

    /// Serves on the current runtime until interrupted.
    ///
    /// # Errors
    ///
    /// See [`Server::start_with_shutdown`].
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(interrupted()).await
    }

    /// Serves on the current runtime until `shutdown` resolves.
    ///
    /// Connections are always scheduled as tasks of the current runtime here,
    /// whatever the configured scheduling model.
    ///
    /// # Errors
    ///
    /// Fails when an address cannot be bound.
    pub async fn start_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let listeners = self.bind()?;
        let shutdown = shutdown.shared();

        let servers = listeners.into_iter().map(|listener| {
            let acceptor = self.acceptor.clone();
            let service = Arc::clone(&self.service);
            let config = self.connection_config.clone();
            let shutdown = shutdown.clone();
            async move {
                let listener = listener
                    .set_nonblocking(true)
                    .and_then(|()| TcpListener::from_std(listener))
                    .map_err(ServerError::serve)?;
                serve(listener, acceptor, service, config, shutdown).await.map_err(ServerError::serve)
            }
        });

        futures::future::try_join_all(servers).await?;
        info!("server stopped");
        Ok(())
    }

    fn run_thread_pool(self, max_connections: usize) -> Result<(), ServerError> {
        let listeners = self.bind()?;
        let pool = ThreadPool::new(self.threads, max_connections).map_err(ServerError::runtime)?;

        std::thread::scope(|scope| {
            let accept_loops = listeners
                .into_iter()
                .map(|listener| {
                    let acceptor = self.acceptor.clone();
                    let service = Arc::clone(&self.service);
                    let config = self.connection_config.clone();
                    let pool = &pool;
                    scope.spawn(move || serve_blocking(listener, acceptor, service, config, pool))
                })
                .collect::<Vec<_>>();

            for accept_loop in accept_loops {
                match accept_loop.join() {
                    Ok(result) => result.map_err(ServerError::serve)?,
                    Err(_panic) => error!("accept loop panicked"),
                }
            }
            Ok(())
        })
    }

    fn bind(&self) -> Result<Vec<StdTcpListener>, ServerError> {
        let mut listeners = Vec::with_capacity(self.addresses.len() + self.listeners.len());
        for &address in &self.addresses {
            let listener = StdTcpListener::bind(address).map_err(|e| ServerError::bind(address, e))?;
            info!(%address, "start listening");
            listeners.push(listener);
        }
        for listener in &self.listeners {
            let listener = listener.try_clone().map_err(ServerError::serve)?;
            if let Ok(address) = listener.local_addr() {
                info!(%address, "start listening");
            }
            listeners.push(listener);
        }
        Ok(listeners)
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("service", &self.service)
            .field("acceptor", &self.acceptor)
            .field("connection_config", &self.connection_config)
            .field("addresses", &self.addresses)
            .field("threads", &self.threads)
            .field("scheduling", &self.scheduling)
            .finish_non_exhaustive()
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(cause = %e, "listen for ctrl-c error, serving until the process ends");
        std::future::pending::<()>().await;
    }
}
