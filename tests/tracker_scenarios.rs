//! End-to-end tracker runs against a scripted in-process transport

use async_trait::async_trait;
use mqtt_load_tester::broker::{InboundMessage, MessageTransport};
use mqtt_load_tester::clock;
use mqtt_load_tester::error::{AppError, Result};
use mqtt_load_tester::logging::Logger;
use mqtt_load_tester::models::{EchoMessage, OutboundMessage};
use mqtt_load_tester::storage::{MemoryResultSink, ProgressMode, ResultSink};
use mqtt_load_tester::tracker::{MessageTracker, RunSummary, TrackerSettings};
use mqtt_load_tester::types::OutcomeKind;
use mqtt_load_tester::ResultRecord;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const TOPIC: &str = "load";

/// Broker stand-in: loops publishes back to the subscriber as told
struct ScriptedTransport {
    inbound: mpsc::Sender<InboundMessage>,
    echo_delay: Duration,
    per_index_delay: HashMap<u32, Duration>,
    ack_delay: Duration,
    drop: HashSet<u32>,
    fail: HashSet<u32>,
    echoes: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    fn new(inbound: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            inbound,
            echo_delay: Duration::ZERO,
            per_index_delay: HashMap::new(),
            ack_delay: Duration::ZERO,
            drop: HashSet::new(),
            fail: HashSet::new(),
            echoes: Mutex::new(Vec::new()),
        }
    }

    fn dropping(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.drop.extend(indices);
        self
    }

    fn failing(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.fail.extend(indices);
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.echo_delay = delay;
        self
    }

    fn delaying(mut self, index: u32, delay: Duration) -> Self {
        self.per_index_delay.insert(index, delay);
        self
    }

    /// Deliver the echo first and only then accept the publish
    fn acking_late(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    fn echo_count(&self) -> usize {
        self.echoes.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageTransport for ScriptedTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let message: OutboundMessage = serde_json::from_slice(&payload)?;
        let index = message.message_index;

        if self.fail.contains(&index) {
            return Err(AppError::publish(format!("scripted failure for {}", index)));
        }
        if self.drop.contains(&index) {
            return Ok(());
        }

        if !self.ack_delay.is_zero() {
            let _ = self
                .inbound
                .send(InboundMessage::new(topic, payload, clock::monotonic_seconds()))
                .await;
            tokio::time::sleep(self.ack_delay).await;
            return Ok(());
        }

        let inbound = self.inbound.clone();
        let topic = topic.to_string();
        let delay = self.per_index_delay.get(&index).copied().unwrap_or(self.echo_delay);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = inbound
                .send(InboundMessage::new(topic, payload, clock::monotonic_seconds()))
                .await;
        });
        Ok(())
    }

    fn try_publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.echoes.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }
}

/// In-memory sink that takes its time with every insert
struct SlowSink {
    inner: MemoryResultSink,
    per_insert: Duration,
}

impl ResultSink for SlowSink {
    fn insert(&mut self, record: &ResultRecord) -> Result<()> {
        std::thread::sleep(self.per_insert);
        self.inner.insert(record)
    }

    fn fetch_all(&self) -> Result<Vec<ResultRecord>> {
        self.inner.fetch_all()
    }
}

fn settings(message_count: u32, timeout: Duration) -> TrackerSettings {
    TrackerSettings {
        topic: TOPIC.to_string(),
        message_count,
        interval: Duration::from_millis(5),
        timeout,
        connect_timeout: Duration::from_secs(1),
        data_string_length: 55,
        settle_grace: Duration::from_millis(500),
    }
}

struct Harness {
    tracker: Arc<MessageTracker>,
    transport: Arc<ScriptedTransport>,
    inbound: mpsc::Sender<InboundMessage>,
}

fn harness(settings: TrackerSettings, script: impl FnOnce(ScriptedTransport) -> ScriptedTransport) -> Harness {
    harness_with_sink(settings, Box::new(MemoryResultSink::new()), script)
}

fn harness_with_sink(
    settings: TrackerSettings,
    sink: Box<dyn ResultSink>,
    script: impl FnOnce(ScriptedTransport) -> ScriptedTransport,
) -> Harness {
    let (inbound, inbound_rx) = mpsc::channel(64);
    let transport = Arc::new(script(ScriptedTransport::new(inbound.clone())));
    let tracker = MessageTracker::start(
        settings,
        transport.clone(),
        inbound_rx,
        sink,
        ProgressMode::Silent,
        Logger::quiet("TRACK"),
    );
    Harness {
        tracker,
        transport,
        inbound,
    }
}

fn connected() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(true);
    // Keep the signal alive for the whole test
    std::mem::forget(tx);
    rx
}

fn rows(summary: &RunSummary) -> Vec<ResultRecord> {
    summary.sink.fetch_all().unwrap()
}

#[tokio::test]
async fn all_messages_echoed_within_timeout() {
    let h = harness(settings(5, Duration::from_secs(2)), |t| t);

    let summary = h.tracker.run(connected()).await.unwrap();

    assert_eq!(summary.counts.succeeded, 5);
    assert_eq!(summary.counts.timed_out, 0);
    assert_eq!(summary.counts.failed, 0);
    assert!(summary.integrity_timeouts.is_empty());

    let rows = rows(&summary);
    assert_eq!(rows.len(), 5);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.message_index, i as u32 + 1);
        assert_eq!(row.status, OutcomeKind::Success);
        assert!(!row.failed);
        assert!(row.delay_ms.unwrap() >= 0.0);
        assert!(row.high_res_publish_time.is_some());
        assert!(row.high_res_subscribe_time.is_some());
    }

    // Every original is echoed once on the return sub-topic
    let echoes = h.transport.echoes.lock().unwrap();
    assert_eq!(echoes.len(), 5);
    for (topic, body) in echoes.iter() {
        assert_eq!(topic, "load/return");
        let echo: EchoMessage = serde_json::from_slice(body).unwrap();
        assert!(echo.round_trip);
        let original: OutboundMessage = serde_json::from_str(&echo.original_payload).unwrap();
        assert_eq!(original.data.len(), 55);
    }
}

#[tokio::test]
async fn no_messages_echoed_all_time_out() {
    let h = harness(settings(3, Duration::from_millis(100)), |t| t.dropping([1, 2, 3]));

    let summary = h.tracker.run(connected()).await.unwrap();

    assert_eq!(summary.counts.timed_out, 3);
    assert_eq!(summary.counts.succeeded, 0);
    // The timers resolved everything before the sweep
    assert!(summary.integrity_timeouts.is_empty());

    let rows = rows(&summary);
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.status, OutcomeKind::Timeout);
        assert!(row.failed);
        assert_eq!(row.delay_ms, None);
        assert_eq!(row.high_res_publish_time, None);
        assert_eq!(row.high_res_subscribe_time, None);
        assert!(!row.publish_date_time_utc.is_empty());
    }
    assert_eq!(h.transport.echo_count(), 0);
}

#[tokio::test]
async fn one_dropped_message_times_out() {
    let h = harness(settings(4, Duration::from_millis(200)), |t| t.dropping([2]));

    let summary = h.tracker.run(connected()).await.unwrap();

    assert_eq!(summary.counts.succeeded, 3);
    assert_eq!(summary.counts.timed_out, 1);

    let rows = rows(&summary);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1].message_index, 2);
    assert_eq!(rows[1].status, OutcomeKind::Timeout);
}

#[tokio::test]
async fn publish_failure_is_isolated_to_its_index() {
    let h = harness(settings(3, Duration::from_millis(300)), |t| t.failing([2]));

    let summary = h.tracker.run(connected()).await.unwrap();

    assert_eq!(summary.counts.succeeded, 2);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.timed_out, 0);

    let rows = rows(&summary);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].status, OutcomeKind::Failed);
    assert!(rows[1].failed);
    assert_eq!(rows[1].delay_ms, None);
    assert_eq!(rows[0].status, OutcomeKind::Success);
    assert_eq!(rows[2].status, OutcomeKind::Success);

    // The failed index never got a timeout timer
    assert_eq!(h.tracker.timers().scheduled_count(), 2);
}

#[tokio::test]
async fn echo_before_publish_returns_arms_no_timer() {
    let h = harness(settings(3, Duration::from_secs(2)), |t| t.acking_late(Duration::from_millis(50)));

    let summary = h.tracker.run(connected()).await.unwrap();

    assert_eq!(summary.counts.succeeded, 3);
    assert_eq!(rows(&summary).len(), 3);
    assert_eq!(h.tracker.timers().scheduled_count(), 0);
}

#[tokio::test]
async fn echo_arriving_during_finish_is_stored_once() {
    let sink = SlowSink {
        inner: MemoryResultSink::new(),
        per_insert: Duration::from_millis(300),
    };
    let h = harness_with_sink(settings(2, Duration::from_secs(30)), Box::new(sink), |t| {
        t.delaying(2, Duration::from_millis(100))
    });

    h.tracker.send_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    // The worker is still writing row 1 when the echo of 2 shows up
    let summary = h.tracker.finish().await.unwrap();

    let rows = rows(&summary);
    assert_eq!(rows.len(), 2);
    assert_eq!(summary.rows_written, 2);
    for row in &rows {
        assert_eq!(h.tracker.registry().outcome_of(row.message_index), Some(row.status));
    }
    assert_eq!(rows[0].status, OutcomeKind::Success);
    assert_eq!(summary.counts.resolved(), 2);
    assert_eq!(summary.counts.pending, 0);
}

#[tokio::test]
async fn echo_after_timeout_does_not_double_resolve() {
    let h = harness(settings(3, Duration::from_millis(50)), |t| t.delayed(Duration::from_millis(250)));

    h.tracker.send_all().await.unwrap();
    // Let the timers fire and the late echoes arrive
    tokio::time::sleep(Duration::from_millis(600)).await;
    let summary = h.tracker.finish().await.unwrap();

    assert_eq!(summary.counts.timed_out, 3);
    assert_eq!(summary.counts.succeeded, 0);
    assert_eq!(summary.counts.late_echoes, 3);

    let rows = rows(&summary);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.status == OutcomeKind::Timeout));
}

#[tokio::test]
async fn integrity_sweep_resolves_unsettled_messages() {
    let h = harness(settings(3, Duration::from_secs(30)), |t| t.dropping([1, 3]));

    h.tracker.send_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let summary = h.tracker.finish().await.unwrap();

    assert_eq!(summary.integrity_timeouts, vec![1, 3]);
    assert_eq!(summary.counts.succeeded, 1);
    assert_eq!(summary.counts.timed_out, 2);
    assert_eq!(summary.counts.pending, 0);

    let rows = rows(&summary);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].status, OutcomeKind::Timeout);
    assert_eq!(rows[1].status, OutcomeKind::Success);
    assert_eq!(rows[2].status, OutcomeKind::Timeout);
}

#[tokio::test]
async fn connect_timeout_aborts_the_run() {
    let mut s = settings(3, Duration::from_secs(1));
    s.connect_timeout = Duration::from_millis(50);
    let h = harness(s, |t| t);

    let (_tx, rx) = watch::channel(false);
    let err = h.tracker.run(rx).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert_eq!(h.tracker.counts().attempted, 0);
}

#[tokio::test]
async fn echo_envelope_on_return_topic_resolves_without_republish() {
    let h = harness(settings(1, Duration::from_secs(2)), |t| t.dropping([1]));

    h.tracker.send(1).await.unwrap();

    // Build the envelope another tester would publish for index 1
    let original = OutboundMessage::new(1, "2024-01-01T00:00:00.000+00:00".to_string(), 0.0, "x".to_string());
    let envelope = EchoMessage::new(0.0, original.to_json().unwrap()).to_json().unwrap();
    h.inbound
        .send(InboundMessage::new("load/return", envelope.into_bytes(), clock::monotonic_seconds()))
        .await
        .unwrap();

    assert!(h.tracker.wait_settled(Duration::from_secs(1)).await);
    let summary = h.tracker.finish().await.unwrap();

    assert_eq!(summary.counts.succeeded, 1);
    assert_eq!(h.transport.echo_count(), 0);
}

#[tokio::test]
async fn foreign_and_garbled_messages_are_ignored() {
    let h = harness(settings(1, Duration::from_secs(2)), |t| t);

    h.inbound
        .send(InboundMessage::new(TOPIC, b"not json".to_vec(), clock::monotonic_seconds()))
        .await
        .unwrap();
    let foreign = OutboundMessage::new(99, "t".to_string(), 0.0, String::new());
    h.inbound
        .send(InboundMessage::new(TOPIC, foreign.to_json().unwrap().into_bytes(), clock::monotonic_seconds()))
        .await
        .unwrap();

    let summary = h.tracker.run(connected()).await.unwrap();

    assert_eq!(summary.counts.attempted, 1);
    assert_eq!(summary.counts.succeeded, 1);
    assert_eq!(rows(&summary).len(), 1);
    // Only the run's own message was echoed
    assert_eq!(h.transport.echo_count(), 1);
}
