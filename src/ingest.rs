//! Ingestion adapter
//!
//! Reads the channel subscription, validates each message and forwards
//! accepted readings to the gauge mailbox. Malformed messages are dropped
//! without surfacing anything; only a counter and a trace line record them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

use crate::channel::ChannelSubscription;
use crate::gauge::GaugeCommand;
use crate::payload::InboundPayload;

/// Running counters for the inbound path
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    dropped: AtomicU64,
    lagged: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub accepted: u64,
    pub dropped: u64,
    pub lagged: u64,
}

impl IngestStats {
    pub fn counts(&self) -> IngestCounts {
        IngestCounts {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            lagged: self.lagged.load(Ordering::Relaxed),
        }
    }
}

/// Consume `subscription` until the channel closes, the mailbox closes, or `stop` flips.
pub(crate) async fn run_ingestion(
    channel_name: String,
    mut subscription: ChannelSubscription,
    mailbox: mpsc::Sender<GaugeCommand>,
    stats: Arc<IngestStats>,
    mut stop: watch::Receiver<bool>,
) {
    info!("[INGEST] Subscribed to channel '{}'", channel_name);

    loop {
        let message = tokio::select! {
            received = subscription.recv() => received,
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        };

        match message {
            Ok(message) => {
                let Some(payload) = InboundPayload::parse(&message.data) else {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!("[INGEST] Dropped malformed message on '{}'", channel_name);
                    continue;
                };

                stats.accepted.fetch_add(1, Ordering::Relaxed);
                if mailbox
                    .send(GaugeCommand::Merge { payload, ack: None })
                    .await
                    .is_err()
                {
                    debug!("[INGEST] Gauge mailbox closed");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                stats.lagged.fetch_add(skipped, Ordering::Relaxed);
                debug!(
                    "[INGEST] Lagged behind channel '{}', skipped {} messages",
                    channel_name, skipped
                );
            }
            Err(RecvError::Closed) => {
                debug!("[INGEST] Channel '{}' closed", channel_name);
                break;
            }
        }
    }

    info!("[INGEST] Unsubscribed from channel '{}'", channel_name);
}
