//! Filtered-stream connection lifecycle.
//!
//! A [`StreamSession`] owns at most one background worker. The worker opens
//! the stream through a [`StreamTransport`], forwards decoded mentions into a
//! bounded channel, and reconnects forever on failure using a [`RetryPolicy`].

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::{StreamExt, stream::BoxStream},
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{config::RetryConfig, error::Result, tweet::InboundEvent};

/// Capacity of the channel between the stream worker and its consumer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Decoded mentions from one stream connection.
pub type EventStream = BoxStream<'static, Result<InboundEvent>>;

/// Opens filtered-stream connections.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a stream tracking `track`. Returning `Ok` means the connection is
    /// established.
    async fn open(&self, track: &str) -> Result<EventStream>;
}

/// Delay before the next reconnection attempt.
pub trait RetryPolicy: Send + Sync {
    /// `consecutive_failures` is at least 1.
    fn delay(&self, consecutive_failures: u32) -> Duration;
}

/// Reconnect immediately, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateRetry;

impl RetryPolicy for ImmediateRetry {
    fn delay(&self, _consecutive_failures: u32) -> Duration {
        Duration::ZERO
    }
}

/// Doubling delay, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(16);
        self.initial
            .saturating_mul(1u32 << exponent)
            .min(self.max)
    }
}

/// Build the policy described by `config`.
pub fn retry_policy_from_config(config: &RetryConfig) -> Arc<dyn RetryPolicy> {
    if config.initial_delay_ms == 0 {
        Arc::new(ImmediateRetry)
    } else {
        Arc::new(ExponentialBackoff {
            initial: Duration::from_millis(config.initial_delay_ms),
            max: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
        })
    }
}

/// Connection status of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            2 => Self::Connected,
            1 => Self::Connecting,
            _ => Self::Disconnected,
        }
    }
}

/// Status and readiness flags, readable from any component.
#[derive(Debug)]
struct SessionState {
    status: AtomicU8,
    ready: AtomicBool,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set(&self, status: SessionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    fn transition(&self, from: SessionStatus, to: SessionStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the filtered-stream connection for one bot account.
pub struct StreamSession {
    track: String,
    transport: Arc<dyn StreamTransport>,
    retry: Arc<dyn RetryPolicy>,
    state: Arc<SessionState>,
    worker: Mutex<Option<Worker>>,
}

impl StreamSession {
    pub fn new(
        track: impl Into<String>,
        transport: Arc<dyn StreamTransport>,
        retry: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            track: track.into(),
            transport,
            retry,
            state: Arc::new(SessionState {
                status: AtomicU8::new(SessionStatus::Disconnected as u8),
                ready: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// Whether the stream has confirmed a start since the last teardown.
    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::Acquire)
    }

    /// Start the streaming worker and return the receiving end of its event
    /// channel.
    ///
    /// Returns `None` (and logs a warning) when a worker is already running.
    pub fn start_stream(&self) -> Option<mpsc::Receiver<InboundEvent>> {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            warn!(track = %self.track, "twitter stream already started");
            return None;
        }

        self.state.set(SessionStatus::Connecting);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_stream_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.retry),
            Arc::clone(&self.state),
            self.track.clone(),
            tx,
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });

        info!(track = %self.track, "twitter stream start");
        Some(rx)
    }

    /// Stop the worker if one is running. Safe to call repeatedly and while a
    /// reconnection attempt is in flight; does not wait for the worker.
    pub fn stop_stream(&self) {
        let mut guard = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        let Some(worker) = guard.take() else {
            return;
        };

        worker.cancel.cancel();
        self.state.set(SessionStatus::Disconnected);
        self.state.ready.store(false, Ordering::Release);
        drop(guard);

        if worker.handle.is_finished() {
            debug!(track = %self.track, "twitter stream worker already exited");
        }
        info!(track = %self.track, "twitter stream stopped");
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

async fn run_stream_loop(
    transport: Arc<dyn StreamTransport>,
    retry: Arc<dyn RetryPolicy>,
    state: Arc<SessionState>,
    track: String,
    tx: mpsc::Sender<InboundEvent>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = pump_once(transport.as_ref(), &state, &track, &tx, &cancel, &mut failures) => outcome,
        };

        match outcome {
            Ok(()) if tx.is_closed() => {
                debug!(track, "event consumer dropped, leaving stream loop");
                break;
            },
            Ok(()) => info!(track, "twitter stream ended, reconnecting"),
            Err(e) => error!(track, error = %e, "twitter stream error"),
        }

        failures = failures.saturating_add(1);
        state.transition(SessionStatus::Connected, SessionStatus::Connecting);
        let delay = retry.delay(failures);
        debug!(track, failures, delay_ms = delay.as_millis() as u64, "scheduling stream restart");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {},
        }
    }

    debug!(track, "twitter stream loop exited");
}

/// Run one connection until it ends. Events are forwarded in order.
async fn pump_once(
    transport: &dyn StreamTransport,
    state: &SessionState,
    track: &str,
    tx: &mpsc::Sender<InboundEvent>,
    cancel: &CancellationToken,
    failures: &mut u32,
) -> Result<()> {
    let mut events = transport.open(track).await?;

    // A torn-down session must not be marked connected by a late open.
    if !cancel.is_cancelled()
        && state.transition(SessionStatus::Connecting, SessionStatus::Connected)
    {
        state.ready.store(true, Ordering::Release);
    }
    *failures = 0;
    info!(track, "twitter stream connected");

    while let Some(event) = events.next().await {
        let event = event?;
        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}
