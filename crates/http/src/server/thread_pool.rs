use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::TcpListener;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionConfig, HttpConnection};
use crate::handler::{Dispatch, HttpService};
use crate::server::Acceptor;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Error)]
#[error("thread pool is shut down")]
pub struct PoolShutdown;

struct State {
    queue: VecDeque<Job>,
    running: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    job_ready: Condvar,
    slot_free: Condvar,
    max_connections: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed set of OS threads serving connections with admission control.
///
/// Each worker owns a current-thread tokio runtime and drives one job at a time
/// to completion. Occupancy is the number of queued plus running jobs; a
/// producer calling [`ThreadPool::queue_task`] blocks while occupancy is at
/// `max_connections`.
///
/// Dropping the pool stops accepting jobs, lets the workers drain the queue and
/// joins them.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// # Errors
    ///
    /// Fails when a worker runtime or thread cannot be created.
    pub fn new(threads: usize, max_connections: usize) -> io::Result<Self> {
        assert!(threads > 0, "thread pool needs at least one thread");
        assert!(max_connections > 0, "max_connections must be positive");

        let shared = Arc::new(Shared {
            state: Mutex::new(State { queue: VecDeque::new(), running: 0, shutdown: false }),
            job_ready: Condvar::new(),
            slot_free: Condvar::new(),
            max_connections,
        });

        let mut pool = Self { shared, workers: Vec::with_capacity(threads) };
        for index in 0..threads {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            let shared = Arc::clone(&pool.shared);
            let handle = std::thread::Builder::new()
                .name(format!("kiln-worker-{index}"))
                .spawn(move || worker_loop(&shared, &runtime))?;
            pool.workers.push(handle);
        }

        info!(threads, max_connections, "thread pool started");
        Ok(pool)
    }

    /// Blocks until occupancy is below the connection limit.
    ///
    /// # Errors
    ///
    /// Fails once the pool is shutting down.
    pub fn wait_for_slot(&self) -> Result<(), PoolShutdown> {
        drop(self.wait_for_slot_locked()?);
        Ok(())
    }

    /// Queues `task`, blocking the caller until there is room for it.
    ///
    /// # Errors
    ///
    /// Fails once the pool is shutting down; the task is dropped.
    pub fn queue_task<F>(&self, task: F) -> Result<(), PoolShutdown>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.wait_for_slot_locked()?;
        state.queue.push_back(Box::pin(task));
        drop(state);
        self.shared.job_ready.notify_one();
        Ok(())
    }

    /// Queued plus running jobs.
    pub fn occupancy(&self) -> usize {
        let state = self.shared.lock();
        state.queue.len() + state.running
    }

    pub fn max_connections(&self) -> usize {
        self.shared.max_connections
    }

    fn wait_for_slot_locked(&self) -> Result<MutexGuard<'_, State>, PoolShutdown> {
        let mut state = self.shared.lock();
        while !state.shutdown && state.queue.len() + state.running >= self.shared.max_connections {
            state = self.shared.slot_free.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.shutdown {
            return Err(PoolShutdown);
        }
        Ok(state)
    }
}

fn worker_loop(shared: &Shared, runtime: &Runtime) {
    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    state.running += 1;
                    break job;
                }
                if state.shutdown {
                    return;
                }
                state = shared.job_ready.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        if std::panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(job))).is_err() {
            error!("thread pool job panicked");
        }

        shared.lock().running -= 1;
        shared.slot_free.notify_one();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.job_ready.notify_all();
        self.shared.slot_free.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("thread pool worker exited with panic");
            }
        }
        debug!("thread pool stopped");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.workers.len())
            .field("max_connections", &self.shared.max_connections)
            .field("occupancy", &self.occupancy())
            .finish()
    }
}

/// The blocking accept loop of the thread pool model.
///
/// A connection is accepted only once the pool has room for it, so a full pool
/// leaves new connections waiting in the listen backlog. Returns when the pool
/// shuts down.
///
/// # Errors
///
/// Fails only when the listener cannot report its local address.
pub fn serve_blocking<D>(
    listener: TcpListener,
    acceptor: Acceptor,
    service: Arc<HttpService<D>>,
    config: ConnectionConfig,
    pool: &ThreadPool,
) -> io::Result<()>
where
    D: Dispatch + 'static,
{
    let local_addr = listener.local_addr()?;
    info!(%local_addr, tls = acceptor.is_tls(), max_connections = pool.max_connections(), "start accepting connections");

    loop {
        if pool.wait_for_slot().is_err() {
            info!(%local_addr, "thread pool shut down, stop accepting connections");
            return Ok(());
        }

        let (std_stream, remote_addr) = match listener.accept() {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let service = Arc::clone(&service);
        let config = config.clone();
        let job = async move {
            // registration with the reactor must happen on the worker runtime
            let tcp_stream = match std_stream.set_nonblocking(true).and_then(|()| TcpStream::from_std(std_stream)) {
                Ok(tcp_stream) => tcp_stream,
                Err(e) => {
                    error!(%remote_addr, cause = %e, "register accepted socket error");
                    return;
                }
            };
            if let Err(e) = tcp_stream.set_nodelay(true) {
                debug!(cause = %e, "set tcp nodelay error");
            }

            let connection = HttpConnection::new(acceptor.accept(tcp_stream), config);
            match connection.process(&service).await {
                Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
            }
        };

        if pool.queue_task(job).is_err() {
            info!(%local_addr, "thread pool shut down, stop accepting connections");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn runs_every_queued_task() {
        let pool = ThreadPool::new(2, 4).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let done = Arc::clone(&done);
            pool.queue_task(async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        drop(pool);

        assert_eq!(done.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn producer_blocks_while_pool_is_full() {
        let pool = Arc::new(ThreadPool::new(1, 1).unwrap());
        let (release, released) = mpsc::channel::<()>();

        pool.queue_task(async move {
            released.recv().unwrap();
        })
        .unwrap();

        let queued = Arc::new(AtomicBool::new(false));
        let producer = {
            let pool = Arc::clone(&pool);
            let queued = Arc::clone(&queued);
            std::thread::spawn(move || {
                pool.queue_task(async {}).unwrap();
                queued.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(!queued.load(Ordering::SeqCst));
        assert_eq!(pool.occupancy(), 1);

        release.send(()).unwrap();
        producer.join().unwrap();
        assert!(queued.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_job_keeps_worker_alive() {
        let pool = ThreadPool::new(1, 2).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.queue_task(async {
            panic!("job failed");
        })
        .unwrap();
        pool.queue_task(async move { tx.send(42).unwrap() }).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }
}
