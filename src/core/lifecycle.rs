//! Listener ownership and the shutdown sequence.
//!
//! `run` serves until the first termination signal, gives in-flight requests
//! the configured grace period, then releases the provisioned dependencies
//! exactly once, whether or not the listener stopped cleanly.
use std::{io, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{ConnectInfo, Request},
    middleware::Next,
};
use eyre::{Result, WrapErr};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful},
    service::TowerToHyperService,
};
use tokio::{net::TcpListener, task::JoinSet, time::timeout};
use tower::ServiceExt;

use crate::{
    core::provisioner::{Feature, ProvisionedDependencies},
    utils::{GracefulShutdown, InflightTracker, ShutdownReason, ShutdownToken},
};

const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// How the serve loop ended after a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection finished inside the grace period
    Drained,
    /// The grace period expired; remaining requests were cut off
    TimedOut { remaining: u64 },
}

pub struct LifecycleManager {
    deps: Arc<ProvisionedDependencies>,
    shutdown: Arc<GracefulShutdown>,
    inflight: InflightTracker,
    grace_period: Duration,
}

impl LifecycleManager {
    pub fn new(deps: Arc<ProvisionedDependencies>, grace_period: Duration) -> Self {
        Self {
            deps,
            shutdown: Arc::new(GracefulShutdown::new()),
            inflight: InflightTracker::new(),
            grace_period,
        }
    }

    pub fn shutdown(&self) -> Arc<GracefulShutdown> {
        self.shutdown.clone()
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.subscribe()
    }

    pub fn inflight(&self) -> InflightTracker {
        self.inflight.clone()
    }

    /// Warm the orchestrator cache, if any. Failure is fatal and releases the
    /// dependencies before returning.
    pub async fn start(&self) -> Result<()> {
        if let Feature::Enabled(orchestrator) = &self.deps.orchestrator {
            tracing::info!(watched = ?orchestrator.watched(), "Warming orchestrator cache");
            if let Err(e) = orchestrator.start_cache().await {
                self.deps.close().await;
                return Err(e).wrap_err("orchestrator cache failed to warm up");
            }
            tracing::info!("Orchestrator cache ready");
        }
        Ok(())
    }

    /// Serve `app` on `listener` until shutdown, then tear down.
    ///
    /// Installs the process signal handler. A listener failure that was not
    /// caused by shutdown is returned as an error after teardown.
    pub async fn run(&self, listener: TcpListener, app: Router) -> Result<DrainOutcome> {
        let signals = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signals.run_signal_handler().await {
                tracing::error!("Signal handler failed: {e:#}");
            }
        });

        self.serve(listener, app).await
    }

    /// Like [`LifecycleManager::run`] but without signal handling; shutdown is
    /// triggered through [`LifecycleManager::shutdown`].
    pub async fn serve(&self, listener: TcpListener, app: Router) -> Result<DrainOutcome> {
        let outcome = serve_until_shutdown(
            listener,
            app,
            self.shutdown.subscribe(),
            self.grace_period,
            self.inflight.clone(),
        )
        .await;

        if outcome.is_err() {
            // health checks report not-live from here on
            self.shutdown.trigger_shutdown(ShutdownReason::Requested);
        }

        tracing::info!("Releasing provisioned resources");
        self.deps.close().await;
        outcome
    }
}

/// Serve until `shutdown` fires, then wait at most `grace` for open requests.
///
/// Every connection runs on a task owned here, so connections still open when
/// the grace period expires are aborted rather than left running behind the
/// teardown.
pub async fn serve_until_shutdown(
    listener: TcpListener,
    app: Router,
    shutdown: ShutdownToken,
    grace: Duration,
    inflight: InflightTracker,
) -> Result<DrainOutcome> {
    let local_addr = listener.local_addr().wrap_err("listener has no local address")?;
    let tracker = inflight.clone();
    let app = app.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
        let guard = tracker.begin();
        async move {
            let response = next.run(req).await;
            drop(guard);
            response
        }
    }));

    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = graceful::GracefulShutdown::new();
    let mut connections = JoinSet::new();
    let stop = shutdown.wait();
    tokio::pin!(stop);
    tracing::info!(%local_addr, "Listening");

    let reason = loop {
        tokio::select! {
            reason = &mut stop => break reason,
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Connection task panicked");
                    }
                }
            }
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => continue,
                    Err(e) => {
                        // e.g. out of file descriptors; retrying at once would spin
                        tracing::error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                let service = TowerToHyperService::new(app.clone().map_request(
                    move |mut req: http::Request<Incoming>| {
                        req.extensions_mut().insert(ConnectInfo(remote_addr));
                        req
                    },
                ));
                let builder = builder.clone();
                let watcher = graceful.watcher();
                connections.spawn(async move {
                    let connection =
                        builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                    if let Err(e) = watcher.watch(connection).await {
                        tracing::debug!(%remote_addr, error = %e, "Connection closed with error");
                    }
                });
            }
        }
    };

    drop(listener);
    tracing::info!(
        ?reason,
        grace_period = ?grace,
        active = inflight.active(),
        connections = connections.len(),
        "Stopped accepting connections, draining in-flight requests"
    );

    let drained = timeout(grace, async {
        graceful.shutdown().await;
        while connections.join_next().await.is_some() {}
    })
    .await;

    match drained {
        Ok(()) => {
            tracing::info!(served = inflight.total(), "Listener drained");
            Ok(DrainOutcome::Drained)
        }
        Err(_) => {
            let remaining = inflight.active();
            tracing::warn!(
                remaining,
                connections = connections.len(),
                grace_period = ?grace,
                "Grace period expired, closing remaining connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
            Ok(DrainOutcome::TimedOut { remaining })
        }
    }
}

/// Errors that only concern the connection being accepted.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
