//! Connection lifecycle manager.
//!
//! Owns the single streaming session to the chain node and the state
//! machine that keeps it alive: connect with a bounded liveness
//! confirmation, a periodic health probe, and error- or probe-triggered
//! reconnects with a bounded attempt budget. Exhausting the budget is
//! terminal: the manager reports an unrecoverable condition and the
//! process is expected to exit non-zero.
//!
//! The manager is generic over the [`Connect`] capability so the state
//! machine can be exercised in tests without a network.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionSettings;
use crate::connection::backoff;

/// Connection lifecycle state, owned exclusively by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("no live session")]
    NotConnected,
    #[error("session confirmation timed out")]
    ConfirmTimeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection lost and retry budget exhausted")]
    Unrecoverable,
}

/// Capability to open and health-check a streaming session.
pub trait Connect: Send + Sync {
    type Session: Clone + Send + Sync + 'static;

    /// Open a fresh session.
    fn open(&self) -> impl Future<Output = Result<Self::Session, ConnectionError>> + Send;

    /// Lightweight liveness check against an open session. Streaming
    /// transports can stall without surfacing a transport-level error, so
    /// this is the only reliable staleness detector.
    fn probe(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

struct Inner<S> {
    state: ConnectionState,
    session: Option<S>,
    attempts: u32,
    fatal: bool,
}

/// Keeps one streaming session alive across network failures.
///
/// Consumers obtain the current session via [`session`](Self::session) and
/// watch [`subscribe_epoch`](Self::subscribe_epoch) for replacement: the
/// epoch counter bumps on every successful (re)connect, and subscriptions
/// installed against the previous session must be re-installed.
pub struct ConnectionManager<C: Connect> {
    connector: C,
    settings: ConnectionSettings,
    inner: Mutex<Inner<C::Session>>,
    epoch_tx: watch::Sender<u64>,
}

impl<C: Connect> ConnectionManager<C> {
    pub fn new(connector: C, settings: ConnectionSettings) -> Self {
        let (epoch_tx, _) = watch::channel(0);

        Self {
            connector,
            settings,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                session: None,
                attempts: 0,
                fatal: false,
            }),
            epoch_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state
    }

    /// True once the retry budget has been exhausted. Terminal.
    pub fn is_fatal(&self) -> bool {
        self.inner.lock().unwrap().fatal
    }

    /// The live session handle, or `NotConnected` while between sessions.
    pub fn session(&self) -> Result<C::Session, ConnectionError> {
        let inner = self.inner.lock().unwrap();
        if inner.fatal {
            return Err(ConnectionError::Unrecoverable);
        }
        inner.session.clone().ok_or(ConnectionError::NotConnected)
    }

    /// Session generation counter; bumps on every successful (re)connect
    /// and once more when the manager goes fatal, so waiters always wake.
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> {
        self.epoch_tx.subscribe()
    }

    /// Open the initial session, blocking until it is confirmed live or
    /// the confirmation timeout elapses (a timeout is a connect failure).
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fatal {
                return Err(ConnectionError::Unrecoverable);
            }
            inner.state = ConnectionState::Connecting;
        }

        match self.open_confirmed().await {
            Ok(session) => {
                self.install(session);
                info!("Chain node session established");
                Ok(())
            },
            Err(e) => {
                self.inner.lock().unwrap().state = ConnectionState::Disconnected;
                Err(e)
            },
        }
    }

    /// Replace a failed session, retrying with backoff up to the
    /// configured attempt budget.
    ///
    /// Re-entrant calls are no-ops: a reconnect triggered by a health
    /// probe can race one triggered by a transport error, and only the
    /// first caller drives the retry loop. The attempt counter resets
    /// only on a successful connect, so repeated partial recoveries still
    /// drain the budget.
    pub async fn reconnect(&self) -> Result<(), ConnectionError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fatal {
                return Err(ConnectionError::Unrecoverable);
            }
            if inner.state == ConnectionState::Reconnecting {
                return Ok(());
            }
            inner.state = ConnectionState::Reconnecting;
            // Stale session teardown is best-effort: dropping the handle
            // closes the transport in the background.
            inner.session = None;
        }

        loop {
            let attempt = {
                let mut inner = self.inner.lock().unwrap();
                inner.attempts += 1;
                inner.attempts
            };

            if attempt > self.settings.max_reconnect_attempts {
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.state = ConnectionState::Disconnected;
                    inner.fatal = true;
                }
                error!(
                    "Connection lost after {} reconnect attempts, giving up",
                    self.settings.max_reconnect_attempts
                );
                // Wake epoch waiters so they observe the terminal state
                self.epoch_tx.send_modify(|epoch| *epoch += 1);
                return Err(ConnectionError::Unrecoverable);
            }

            warn!(
                "Reconnecting to chain node (attempt {}/{})",
                attempt, self.settings.max_reconnect_attempts
            );

            tokio::time::sleep(backoff::delay(
                attempt,
                self.settings.reconnect_delay_ms,
                self.settings.reconnect_delay_max_ms,
            ))
            .await;

            match self.open_confirmed().await {
                Ok(session) => {
                    self.install(session);
                    info!("Chain node session re-established");
                    return Ok(());
                },
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", attempt, e);
                },
            }
        }
    }

    /// Run the periodic health probe until cancelled.
    ///
    /// Returns `Err` only on unrecoverable connection loss; the binary
    /// treats that as a fatal exit.
    pub async fn run(&self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        let probe_interval = Duration::from_secs(self.settings.probe_interval_secs);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Connection manager received cancellation signal");
                    self.disconnect();
                    return Ok(());
                }
                _ = tokio::time::sleep(probe_interval) => {
                    let session = match self.session() {
                        Ok(session) => session,
                        Err(ConnectionError::Unrecoverable) => {
                            return Err(ConnectionError::Unrecoverable.into());
                        },
                        // Between sessions; a reconnect is being driven elsewhere
                        Err(_) => continue,
                    };

                    if let Err(e) = self.connector.probe(&session).await {
                        warn!("Health probe failed: {}", e);
                        self.reconnect().await.map_err(|e| {
                            anyhow::anyhow!(e).context("probe-triggered reconnect failed")
                        })?;
                    }
                }
            }
        }
    }

    /// Drop the live session and stop probing. Idempotent; the probe
    /// timer dies with the cancelled `run` task.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.session.is_some() || inner.state != ConnectionState::Disconnected {
            inner.session = None;
            inner.state = ConnectionState::Disconnected;
            info!("Chain node session closed");
        }
    }

    async fn open_confirmed(&self) -> Result<C::Session, ConnectionError> {
        let session = self.connector.open().await?;

        // A session that opens but never answers is indistinguishable from
        // a stalled transport; bound the liveness confirmation.
        tokio::time::timeout(
            Duration::from_secs(self.settings.confirm_timeout_secs),
            self.connector.probe(&session),
        )
        .await
        .map_err(|_| ConnectionError::ConfirmTimeout)??;

        Ok(session)
    }

    fn install(&self, session: C::Session) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.session = Some(session);
            inner.state = ConnectionState::Connected;
            inner.attempts = 0;
        }
        self.epoch_tx.send_modify(|epoch| *epoch += 1);
    }
}
