//! Generation service split into focused submodules.
//!
//! The `ImageGenerator` struct and its methods are organized by concern:
//! - [`run`] - The per-request flow: dispatch, submit, poll, report
//! - [`lifecycle`] - Graceful shutdown and signal handling

mod lifecycle;
mod run;


pub use lifecycle::run_with_shutdown;

use crate::client::ImageBackend;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::pool::ClientPool;
use crate::types::{Event, GenerationReport, GenerationRequest, RequestId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Receiver of finished reports for [`ImageGenerator::generate_with`]
///
/// Returning an error means the recipient is gone; the report is dropped
/// and the run is still considered complete.
#[async_trait::async_trait]
pub trait OutcomeSink: Send + Sync + 'static {
    /// Hand one report to the presentation side
    async fn deliver(
        &self,
        report: GenerationReport,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl OutcomeSink for tokio::sync::mpsc::Sender<GenerationReport> {
    async fn deliver(
        &self,
        report: GenerationReport,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send(report).await.map_err(|e| e.to_string().into())
    }
}

/// Handle to a detached generation run
///
/// Awaiting it yields the run's report. Dropping it does not cancel the run.
#[derive(Debug)]
pub struct JobHandle {
    request_id: RequestId,
    inner: tokio::task::JoinHandle<GenerationReport>,
}

impl JobHandle {
    /// Local id assigned to the request
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Future for JobHandle {
    type Output = Result<GenerationReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let request_id = self.request_id;
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|joined| joined.map_err(|_| Error::JobAborted { request_id }))
    }
}

/// Image generation service (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ImageGenerator {
    /// Round-robin selection over the initialized pool
    pub(crate) dispatcher: Arc<Dispatcher>,
    /// Configuration (polling budget, shutdown grace, defaults)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cleared when shutdown begins
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Detached runs still in flight
    pub(crate) tasks: TaskTracker,
    next_request_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for ImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGenerator")
            .field("dispatcher", &self.dispatcher)
            .field("in_flight", &self.tasks.len())
            .field("accepting_new", &self.is_accepting())
            .finish_non_exhaustive()
    }
}

impl ImageGenerator {
    /// Create a generator from configuration
    ///
    /// Validates `config`, builds one HTTP client per credential and resolves
    /// every pipeline concurrently. Credentials that fail resolution are left
    /// out; the call fails only if none is left.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for invalid configuration
    /// - [`Error::NoUsableCredentials`] when every credential failed resolution
    ///
    /// # Example
    ///
    /// ```no_run
    /// use imagen_dispatch::{Config, GenerationRequest, ImageGenerator};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let generator = ImageGenerator::new(Config::from_env()?).await?;
    ///
    ///     let handle = generator.generate(GenerationRequest::new("a lighthouse at dusk"))?;
    ///     let report = handle.await?;
    ///     println!("outcome: {}", report.outcome.kind());
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        let pool = ClientPool::from_config(&config).await?;
        Ok(Self::from_pool(config, pool))
    }

    /// Create a generator over caller-supplied backends
    ///
    /// `config.credentials` is ignored; every other setting applies.
    pub async fn with_backends(
        config: Config,
        backends: Vec<Arc<dyn ImageBackend>>,
    ) -> Result<Self> {
        config.validate_settings()?;
        let pool = ClientPool::initialize(backends).await?;
        Ok(Self::from_pool(config, pool))
    }

    fn from_pool(config: Config, pool: ClientPool) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        tracing::info!(
            pool_size = pool.len(),
            credentials = ?pool.credentials(),
            "image generator ready"
        );
        Self {
            dispatcher: Arc::new(Dispatcher::new(pool)),
            config: Arc::new(config),
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            tasks: TaskTracker::new(),
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to lifecycle events
    ///
    /// Each subscriber receives every event. A subscriber that falls more
    /// than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration (cheap `Arc` clone)
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Number of usable credentials
    pub fn pool_size(&self) -> usize {
        self.dispatcher.pool_size()
    }

    /// Whether new requests are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Number of detached runs still in flight
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Start a detached run and return a handle to its report
    ///
    /// Returns immediately; the caller is never blocked on the remote service.
    ///
    /// # Errors
    ///
    /// [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun.
    pub fn generate(&self, request: GenerationRequest) -> Result<JobHandle> {
        let request_id = self.admit()?;
        let generator = self.clone();
        let inner = self
            .tasks
            .spawn(async move { generator.run_request(request_id, request).await });
        Ok(JobHandle { request_id, inner })
    }

    /// Start a detached run whose report goes to `sink`
    ///
    /// A failing sink (recipient gone) only drops the report.
    ///
    /// # Errors
    ///
    /// [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun.
    pub fn generate_with<S>(&self, request: GenerationRequest, sink: S) -> Result<RequestId>
    where
        S: OutcomeSink,
    {
        let request_id = self.admit()?;
        let generator = self.clone();
        self.tasks.spawn(async move {
            let report = generator.run_request(request_id, request).await;
            if let Err(e) = sink.deliver(report).await {
                tracing::debug!(
                    request_id = %request_id,
                    error = %e,
                    "outcome recipient is gone, dropping report"
                );
            }
        });
        Ok(request_id)
    }

    fn admit(&self) -> Result<RequestId> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }
        Ok(self.next_request_id())
    }

    pub(crate) fn next_request_id(&self) -> RequestId {
        RequestId(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is not an error; the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn emit_finished(&self, report: &GenerationReport) {
        self.emit_event(Event::Finished {
            request_id: report.request_id,
            credential: report.credential,
            outcome: report.outcome.kind().to_string(),
        });
    }
}
