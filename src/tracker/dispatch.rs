//! Inbound dispatcher task

use super::MessageTracker;
use crate::broker::InboundMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Drain the inbound channel into the tracker until `stop` flips or every
/// sender is gone
///
/// A message already taken off the channel is always handled to the end;
/// the stop signal is only checked between messages.
pub fn spawn_dispatcher(
    tracker: Arc<MessageTracker>,
    mut inbound: mpsc::Receiver<InboundMessage>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                message = inbound.recv() => match message {
                    Some(message) => tracker.on_inbound(message).await,
                    None => break,
                },
            }
        }
    })
}
