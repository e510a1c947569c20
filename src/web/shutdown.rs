//! Shutdown coordinator.
//!
//! The process moves `Running -> Draining -> Stopped` exactly once. Three
//! things can start the drain: the OS asking us to stop, the listener dying,
//! or a request hitting a [`StructuralFault`](super::StructuralFault). The
//! first trigger wins and its reason is the one reported; later triggers are
//! logged and ignored.
//!
//! Once draining, the listener stops accepting and in-flight requests get a
//! bounded grace period. When it runs out the handle is hard-stopped: every
//! handler still running is dropped and its client gets a 503. The shutdown
//! is then reported as not graceful.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal, e.g. `SIGTERM`.
    Signal(String),
    ListenerFailed(String),
    /// A structural fault raised while serving a request.
    Fault(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {name}"),
            ShutdownReason::ListenerFailed(detail) => write!(f, "listener failed: {detail}"),
            ShutdownReason::Fault(detail) => write!(f, "structural fault: {detail}"),
        }
    }
}

struct Shared {
    triggered: AtomicBool,
    reason: watch::Sender<Option<ShutdownReason>>,
    stopped: watch::Sender<bool>,
}

/// Cloneable handle used to request and observe shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("reason", &self.reason())
            .finish()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        let (stopped, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                triggered: AtomicBool::new(false),
                reason,
                stopped,
            }),
        }
    }

    /// Requests shutdown. Returns `true` only for the call that actually
    /// started it.
    pub fn signal(&self, reason: ShutdownReason) -> bool {
        if self
            .shared
            .triggered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(reason = %reason, "Shutdown already in progress, ignoring trigger");
            return false;
        }

        info!(reason = %reason, "Shutdown requested");
        self.shared.reason.send_replace(Some(reason));
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.shared.triggered.load(Ordering::Acquire)
    }

    /// The winning reason, once shutdown has started.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.shared.reason.borrow().clone()
    }

    /// Resolves with the winning reason once shutdown has started.
    pub async fn triggered(&self) -> ShutdownReason {
        let mut rx = self.shared.reason.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            // The sender lives in `self`, so this only fails if it is dropped
            // concurrently, which cannot happen while we hold `&self`.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Ends the drain early. Requests still in flight are cut off.
    pub fn force_stop(&self) {
        self.shared.stopped.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shared.stopped.borrow()
    }

    /// Resolves once [`force_stop`](Self::force_stop) has been called.
    pub async fn stopped(&self) {
        let mut rx = self.shared.stopped.subscribe();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    /// `true` when every in-flight request finished inside the grace period
    /// and the listener did not fail.
    pub graceful: bool,
}

/// Serves `router` on `listener` until shutdown, then drains.
///
/// `os_signal` resolves with the name of the signal that asked us to stop;
/// pass [`wait_for_os_signal`] in production and a channel in tests.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    handle: ShutdownHandle,
    os_signal: F,
    grace: Duration,
) -> ShutdownReport
where
    F: Future<Output = String> + Send,
{
    let drain = handle.clone();
    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            drain.triggered().await;
        })
        .await
    });

    tokio::pin!(os_signal);

    let exited = tokio::select! {
        result = &mut server => Some(result),
        name = &mut os_signal => {
            handle.signal(ShutdownReason::Signal(name));
            None
        }
        _ = handle.triggered() => None,
    };

    let graceful = match exited {
        Some(result) => {
            let clean = matches!(result, Ok(Ok(())));
            let detail = match result {
                Ok(Ok(())) => "server stopped without a shutdown request".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            // Losing the race means a drain was already under way and has
            // now finished.
            let first = handle.signal(ShutdownReason::ListenerFailed(detail));
            if first {
                error!("Listener stopped unexpectedly");
            }
            !first && clean
        }
        None => drain_within(&mut server, &handle, grace).await,
    };

    let reason = handle.triggered().await;
    info!(reason = %reason, graceful, "Shutdown complete");
    ShutdownReport { reason, graceful }
}

async fn drain_within(
    server: &mut JoinHandle<std::io::Result<()>>,
    handle: &ShutdownHandle,
    grace: Duration,
) -> bool {
    info!(grace_secs = grace.as_secs_f64(), "Draining in-flight requests");
    match tokio::time::timeout(grace, &mut *server).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(e))) => {
            error!(error = %e, "Server error while draining");
            false
        }
        Ok(Err(e)) => {
            error!(error = %e, "Server task failed while draining");
            false
        }
        Err(_) => {
            warn!("Grace period elapsed, aborting remaining requests");
            // Connections run on their own tasks, so aborting the accept
            // loop alone leaves their handlers running.
            handle.force_stop();
            server.abort();
            false
        }
    }
}

/// Resolves with the name of the first termination signal received.
pub async fn wait_for_os_signal() -> String {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT".to_string(),
        _ = terminate => "SIGTERM".to_string(),
    }
}
