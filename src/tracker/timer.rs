//! Timer wheel for per-message timeouts
//!
//! One task owns a `DelayQueue` keyed by message index. Schedule and cancel
//! requests arrive over a channel; expirations are handed to an
//! [`ExpiryHandler`]. Cancellation is best effort: a timer that fires after
//! its index was resolved is expected to be ignored by the handler.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::time::{delay_queue::Key, DelayQueue};

/// Longest delay the wheel accepts; `DelayQueue` panics a little above two
/// years, so anything longer is treated as one year
pub const LONGEST_TIMER: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Receives expired indices
#[async_trait]
pub trait ExpiryHandler: Send + Sync {
    async fn on_expired(&self, index: u32);
}

#[derive(Debug)]
enum TimerCommand {
    Schedule(u32, Duration),
    Cancel(u32),
    Shutdown,
}

/// Cloneable handle used to drive the timer task
#[derive(Debug, Clone)]
pub struct TimerHandle {
    tx: mpsc::UnboundedSender<TimerCommand>,
    scheduled: Arc<AtomicUsize>,
}

impl TimerHandle {
    /// Arm (or re-arm) the timer of an index
    pub fn schedule(&self, index: u32, after: Duration) {
        if self.tx.send(TimerCommand::Schedule(index, after)).is_ok() {
            self.scheduled.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Schedule requests accepted so far, re-arms included
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// Disarm the timer of an index, if it is still armed
    pub fn cancel(&self, index: u32) {
        let _ = self.tx.send(TimerCommand::Cancel(index));
    }

    /// Stop the timer task; armed timers are dropped without firing
    pub fn shutdown(&self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
    }
}

/// Spawn the timer task
pub fn spawn_timer_wheel<H>(handler: Arc<H>) -> (TimerHandle, JoinHandle<()>)
where
    H: ExpiryHandler + ?Sized + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_timer_wheel(rx, handler));
    let handle = TimerHandle {
        tx,
        scheduled: Arc::default(),
    };
    (handle, task)
}

async fn run_timer_wheel<H>(mut rx: mpsc::UnboundedReceiver<TimerCommand>, handler: Arc<H>)
where
    H: ExpiryHandler + ?Sized,
{
    let mut timers: DelayQueue<u32> = DelayQueue::new();
    let mut keys: HashMap<u32, Key> = HashMap::new();

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(TimerCommand::Schedule(index, after)) => {
                    let key = timers.insert(index, after.min(LONGEST_TIMER));
                    if let Some(previous) = keys.insert(index, key) {
                        timers.try_remove(&previous);
                    }
                }
                Some(TimerCommand::Cancel(index)) => {
                    if let Some(key) = keys.remove(&index) {
                        timers.try_remove(&key);
                    }
                }
                Some(TimerCommand::Shutdown) | None => break,
            },
            Some(expired) = timers.next() => {
                let index = expired.into_inner();
                keys.remove(&index);
                handler.on_expired(index).await;
            }
        }
    }
}
