//! TCP server for digit-product sessions.
//!
//! Accepts connections and dispatches each to its own task, with the
//! number of actively served sessions bounded by a worker-pool semaphore.
//! Shutdown stops accepting, drains in-flight sessions within a grace
//! period, and aborts whatever is still running after it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::protocol::handler;

/// Listen backlog for the listening socket.
const BACKLOG: i32 = 1024;

/// Lifecycle states published on the server's watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Errors fatal to server startup.
#[derive(Debug)]
pub enum ServerError {
    /// The configured listen address is not a valid socket address.
    InvalidAddr(String, std::net::AddrParseError),
    /// The listening socket could not be created or bound.
    Bind(String, std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::InvalidAddr(addr, e) => {
                write!(f, "Invalid listen address '{}': {}", addr, e)
            }
            ServerError::Bind(addr, e) => {
                write!(f, "Failed to bind '{}': {}", addr, e)
            }
        }
    }
}

impl std::error::Error for ServerError {}

/// Server instance owning the listening socket.
pub struct Server {
    listener: TcpListener,
    config: Config,
    workers: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    state_tx: watch::Sender<ServerState>,
}

impl Server {
    /// Bind the listening socket. Fails fast: a server that cannot acquire
    /// its port never reaches the accept loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| ServerError::InvalidAddr(config.listen.clone(), e))?;

        let listener = create_listener(addr)
            .and_then(TcpListener::from_std)
            .map_err(|e| ServerError::Bind(config.listen.clone(), e))?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (state_tx, _) = watch::channel(ServerState::Starting);
        let workers = Arc::new(Semaphore::new(config.workers));

        Ok(Server {
            listener,
            config,
            workers,
            shutdown_tx,
            shutdown_rx,
            state_tx,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for requesting and awaiting shutdown.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown_tx: self.shutdown_tx.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Accept connections until shutdown is requested, then drain.
    ///
    /// Each accepted connection is spawned into its own task immediately,
    /// so accepting is never blocked behind busy workers; the task waits
    /// for a worker permit (FIFO) before its session starts. When the pool
    /// is saturated, accepted connections queue unbounded in permit-wait
    /// order.
    pub async fn serve(self) {
        let Server {
            listener,
            config,
            workers,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
            state_tx,
        } = self;

        let mut sessions: JoinSet<()> = JoinSet::new();
        state_tx.send_replace(ServerState::Running);
        info!(workers = config.workers, "Accepting connections");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "New connection");
                        let workers = Arc::clone(&workers);

                        sessions.spawn(async move {
                            // Admission: the session starts only once a
                            // worker slot frees up.
                            let Ok(_permit) = workers.acquire_owned().await else {
                                return;
                            };

                            match handler::handle_connection(stream).await {
                                Ok(()) => debug!(peer = %peer, "Session closed"),
                                Err(e) => debug!(peer = %peer, error = %e, "Session error"),
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }
        }

        // Closing the listener releases the port and refuses new peers
        // while in-flight sessions drain.
        drop(listener);
        state_tx.send_replace(ServerState::Stopping);

        let grace = Duration::from_secs(config.grace_period);
        if !sessions.is_empty() {
            info!(
                active = sessions.len(),
                grace_secs = grace.as_secs(),
                "Draining sessions"
            );
        }

        if tokio::time::timeout(grace, drain(&mut sessions)).await.is_err() {
            warn!(
                active = sessions.len(),
                "Grace period elapsed, aborting remaining sessions"
            );
            sessions.shutdown().await;
        }

        state_tx.send_replace(ServerState::Stopped);
        info!("Server stopped");
    }
}

/// Cloneable handle for requesting and awaiting server shutdown.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<ServerState>,
}

impl ServerHandle {
    /// Request shutdown and wait until the server has fully stopped: the
    /// listening port is released and every session has finished or been
    /// cut off by the grace period.
    ///
    /// Idempotent and safe to call from several tasks at once; every
    /// caller returns once the server reaches [`ServerState::Stopped`].
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(());

        let mut state_rx = self.state_rx.clone();
        // An error means the server task is gone, which is as stopped as
        // it gets.
        let _ = state_rx
            .wait_for(|state| *state == ServerState::Stopped)
            .await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state_rx.borrow()
    }
}

/// Create the listening socket with `SO_REUSEADDR` so a restarted server
/// can rebind without waiting out TIME_WAIT.
fn create_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

async fn drain(sessions: &mut JoinSet<()>) {
    while sessions.join_next().await.is_some() {}
}
