//! Message lifecycle tracking
//!
//! The tracker sends the numbered test messages, correlates every inbound
//! copy with its outstanding send and guarantees that each index ends in
//! exactly one outcome. Three contexts race to resolve an index: the sender
//! (publish failure), the inbound dispatcher (echo) and the timer wheel
//! (timeout). The registry decides the winner; only the winner enqueues an
//! outcome for the persistence worker.

pub mod dispatch;
pub mod registry;
pub mod timer;

pub use dispatch::spawn_dispatcher;
pub use registry::{OutcomeRegistry, Resolution, RunCounts};
pub use timer::{spawn_timer_wheel, ExpiryHandler, TimerHandle};

use crate::broker::{self, InboundMessage, MessageTransport};
use crate::clock::SendStamp;
use crate::defaults::CHANNEL_CAPACITY;
use crate::error::{AppError, Result};
use crate::logging::Logger;
use crate::models::{
    build_payload_data, is_return_topic, return_topic, Config, EchoMessage, InboundPayload, Outcome,
    OutboundMessage, ResultRecord,
};
use crate::storage::{PersistCommand, PersistenceWorker, ProgressMode, ResultSink, WorkerReport};
use crate::types::OutcomeKind;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

/// Extra wait after the last timeout window before forcing the sweep
const DEFAULT_SETTLE_GRACE: Duration = Duration::from_secs(5);

/// Run parameters the tracker needs
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub topic: String,
    pub message_count: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub data_string_length: usize,
    pub settle_grace: Duration,
}

impl TrackerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.topic.clone(),
            message_count: config.message_count,
            interval: config.interval(),
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            data_string_length: config.data_string_length,
            settle_grace: DEFAULT_SETTLE_GRACE,
        }
    }
}

/// Final state of a run, handed to the summary and the report
pub struct RunSummary {
    pub counts: RunCounts,
    /// Indices forced to timeout by the integrity sweep, sorted
    pub integrity_timeouts: Vec<u32>,
    pub rows_written: usize,
    pub storage_errors: usize,
    pub sink: Box<dyn ResultSink>,
}

impl std::fmt::Debug for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSummary")
            .field("counts", &self.counts)
            .field("integrity_timeouts", &self.integrity_timeouts)
            .field("rows_written", &self.rows_written)
            .field("storage_errors", &self.storage_errors)
            .field("location", &self.sink.location())
            .finish()
    }
}

/// Forwards timer expirations to the tracker without owning it
struct TimeoutRelay {
    tracker: Weak<MessageTracker>,
}

#[async_trait]
impl ExpiryHandler for TimeoutRelay {
    async fn on_expired(&self, index: u32) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.on_timeout(index).await;
        }
    }
}

pub struct MessageTracker {
    settings: TrackerSettings,
    payload_data: String,
    registry: OutcomeRegistry,
    transport: Arc<dyn MessageTransport>,
    timers: TimerHandle,
    persist: mpsc::Sender<PersistCommand>,
    settled: Notify,
    timer_task: Mutex<Option<JoinHandle<()>>>,
    worker_task: Mutex<Option<JoinHandle<WorkerReport>>>,
    dispatcher_stop: watch::Sender<bool>,
    dispatcher_task: Mutex<Option<JoinHandle<()>>>,
    logger: Logger,
}

impl MessageTracker {
    /// Build the tracker and start its background tasks: the timer wheel,
    /// the persistence worker and the inbound dispatcher
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        settings: TrackerSettings,
        transport: Arc<dyn MessageTransport>,
        inbound: mpsc::Receiver<InboundMessage>,
        sink: Box<dyn ResultSink>,
        progress: ProgressMode,
        logger: Logger,
    ) -> Arc<Self> {
        let (persist, persist_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let worker = PersistenceWorker::new(sink, progress, logger.clone()).spawn(persist_rx);
        let (dispatcher_stop, stop_rx) = watch::channel(false);

        let tracker = Arc::new_cyclic(|weak: &Weak<MessageTracker>| {
            let relay = Arc::new(TimeoutRelay { tracker: weak.clone() });
            let (timers, timer_task) = spawn_timer_wheel(relay);

            MessageTracker {
                payload_data: build_payload_data(settings.data_string_length),
                settings,
                registry: OutcomeRegistry::new(),
                transport,
                timers,
                persist,
                settled: Notify::new(),
                timer_task: Mutex::new(Some(timer_task)),
                worker_task: Mutex::new(Some(worker)),
                dispatcher_stop,
                dispatcher_task: Mutex::new(None),
                logger,
            }
        });

        let dispatcher = spawn_dispatcher(Arc::clone(&tracker), inbound, stop_rx);
        *lock(&tracker.dispatcher_task) = Some(dispatcher);

        tracker
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &OutcomeRegistry {
        &self.registry
    }

    pub fn timers(&self) -> &TimerHandle {
        &self.timers
    }

    /// Snapshot of the current tallies
    pub fn counts(&self) -> RunCounts {
        self.registry.counts()
    }

    /// Complete run: wait for the broker, send everything, wait for the
    /// outcomes to settle, then shut down and sweep
    pub async fn run(self: &Arc<Self>, connected: watch::Receiver<bool>) -> Result<RunSummary> {
        if let Err(e) = broker::wait_for_connection(connected, self.settings.connect_timeout).await {
            self.stop_background().await;
            return Err(e);
        }

        if let Err(e) = self.send_all().await {
            self.stop_background().await;
            return Err(e);
        }

        let bound = self.settings.timeout.saturating_add(self.settings.settle_grace);
        if !self.wait_settled(bound).await {
            self.logger
                .warn("Outstanding messages did not settle in time")
                .field("pending", self.registry.pending_count())
                .log();
        }

        self.finish().await
    }

    /// Send every index in order with the configured pause between sends
    pub async fn send_all(&self) -> Result<()> {
        let count = self.settings.message_count;
        for index in 1..=count {
            self.send(index).await?;
            if index < count && !self.settings.interval.is_zero() {
                tokio::time::sleep(self.settings.interval).await;
            }
        }
        self.logger
            .debug("Sender completed")
            .field("messages", count)
            .log();
        Ok(())
    }

    /// Publish one index
    ///
    /// A publish failure is an outcome, not an error: the index resolves to
    /// `failed` and the run goes on. Only a duplicate index is an error.
    pub async fn send(&self, index: u32) -> Result<()> {
        let stamp = SendStamp::now();
        let message = OutboundMessage::new(index, stamp.wall_clock.clone(), stamp.monotonic, self.payload_data.clone());

        // Registered before the publish so a fast echo always finds it
        self.registry.register_send(index, stamp)?;

        let published = match message.to_json() {
            Ok(body) => self.transport.publish(&self.settings.topic, body.into_bytes()).await,
            Err(e) => Err(e),
        };

        match published {
            Ok(()) => {
                // An echo may have resolved the index while publish was in flight
                let timeout = self.settings.timeout;
                self.registry.arm_if_pending(index, || self.timers.schedule(index, timeout));
                crate::log_trace!(self.logger, "Published message {}", index);
            }
            Err(e) => {
                self.logger
                    .error(&format!("Failed to publish message {}: {}", index, e))
                    .field("message_index", index)
                    .log();
                if let Resolution::Resolved(stamp) = self.registry.try_resolve(index, OutcomeKind::Failed) {
                    self.enqueue(Outcome::failed(index, stamp.wall_clock)).await;
                }
            }
        }

        Ok(())
    }

    /// Handle one inbound publish from the broker
    pub async fn on_inbound(&self, message: InboundMessage) {
        let payload = match InboundPayload::decode(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.logger
                    .warn(&format!("Discarding undecodable message on {}: {}", message.topic, e))
                    .log();
                return;
            }
        };

        let index = payload.original().message_index;
        match self.registry.try_resolve(index, OutcomeKind::Success) {
            Resolution::Resolved(stamp) => {
                self.timers.cancel(index);
                self.republish(&message);
                let outcome = Outcome::success(index, stamp.wall_clock, stamp.monotonic, message.received_at);
                self.logger
                    .debug(&format!("Round trip for message {}", index))
                    .field("delay_ms", outcome.delay_ms())
                    .log();
                self.enqueue(outcome).await;
            }
            Resolution::AlreadyResolved(kind) => {
                self.republish(&message);
                self.logger
                    .debug(&format!("Late echo for message {} already resolved as {}", index, kind))
                    .log();
            }
            Resolution::Unknown => {
                self.logger
                    .debug(&format!("Ignoring message {} not sent by this run", index))
                    .field("topic", &message.topic)
                    .log();
            }
        }
    }

    /// Handle an expired timer
    pub async fn on_timeout(&self, index: u32) {
        if let Resolution::Resolved(stamp) = self.registry.try_resolve(index, OutcomeKind::Timeout) {
            self.logger
                .error(&format!("Timeout exceeded for message {}. Marking as failed.", index))
                .field("message_index", index)
                .log();
            self.enqueue(Outcome::timeout(index, stamp.wall_clock)).await;
        }
    }

    /// Echo an original back on the return sub-topic
    fn republish(&self, message: &InboundMessage) {
        if is_return_topic(&message.topic) {
            return;
        }

        let original = String::from_utf8_lossy(&message.payload).into_owned();
        let echo = EchoMessage::new(message.received_at, original);
        let result = echo
            .to_json()
            .and_then(|body| self.transport.try_publish(&return_topic(&self.settings.topic), body.into_bytes()));

        if let Err(e) = result {
            self.logger.warn(&format!("Failed to publish round-trip echo: {}", e)).log();
        }
    }

    async fn enqueue(&self, outcome: Outcome) {
        let index = outcome.index;
        if self.persist.send(PersistCommand::Record(outcome)).await.is_err() {
            self.logger
                .error(&format!("Persistence queue closed; outcome of message {} not stored", index))
                .log();
        }
        if self.registry.mark_enqueued() {
            self.settled.notify_waiters();
        }
    }

    /// Wait until nothing is pending or in flight; false if `bound` elapsed
    pub async fn wait_settled(&self, bound: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.settled.notified();
                if self.registry.is_settled() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(bound, wait).await.is_ok()
    }

    /// Stop every resolver, drain the worker and sweep what is left
    ///
    /// The dispatcher and the timer wheel stop first, so every outcome they
    /// resolve is queued ahead of the worker's shutdown command. An echo that
    /// arrives after that point is left to the sweep.
    pub async fn finish(&self) -> Result<RunSummary> {
        self.stop_dispatcher().await;
        self.stop_timers().await;
        let mut report = self.stop_worker().await?;
        let integrity_timeouts = self.verify_integrity(&mut report);

        Ok(RunSummary {
            counts: self.registry.counts(),
            integrity_timeouts,
            rows_written: report.written,
            storage_errors: report.errors,
            sink: report.sink,
        })
    }

    /// Force every sent-but-never-received index to `timeout` and write it
    /// directly to the sink; returns the swept indices, sorted
    pub fn verify_integrity(&self, report: &mut WorkerReport) -> Vec<u32> {
        let missing = self.registry.unreceived();
        if missing.is_empty() {
            return missing;
        }

        self.logger
            .error(&format!("Missing message IDs: {:?}", missing))
            .field("count", missing.len())
            .log();

        let mut swept = Vec::with_capacity(missing.len());
        for index in missing {
            let Resolution::Resolved(stamp) = self.registry.try_resolve(index, OutcomeKind::Timeout) else {
                continue;
            };
            self.registry.mark_enqueued();
            swept.push(index);

            let record = ResultRecord::from(&Outcome::timeout(index, stamp.wall_clock));
            match report.sink.insert(&record) {
                Ok(()) => {
                    report.written += 1;
                    report.last_index = Some(index);
                }
                Err(e) => {
                    report.errors += 1;
                    self.logger
                        .error(&format!(
                            "Error inserting into results table: {}, Last successful MessageIndex: {}",
                            e,
                            report.last_index.map(|i| i.to_string()).unwrap_or_else(|| "none".to_string())
                        ))
                        .log();
                }
            }
        }
        swept
    }

    async fn stop_worker(&self) -> Result<WorkerReport> {
        let _ = self.persist.send(PersistCommand::Shutdown).await;
        let task = lock(&self.worker_task).take();
        match task {
            Some(task) => Ok(task.await?),
            None => Err(AppError::internal("Persistence worker already stopped")),
        }
    }

    async fn stop_timers(&self) {
        self.timers.shutdown();
        let task = lock(&self.timer_task).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Let the dispatcher finish the message in hand, then stop it
    async fn stop_dispatcher(&self) {
        let _ = self.dispatcher_stop.send(true);
        let task = lock(&self.dispatcher_task).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Tear down background tasks after an aborted run
    async fn stop_background(&self) {
        self.stop_dispatcher().await;
        self.stop_timers().await;
        if let Err(e) = self.stop_worker().await {
            self.logger.debug(&format!("Worker shutdown: {}", e)).log();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
