//! Real-time channel seam
//!
//! The gauge talks to the outside world through `RealtimeChannel`: one named
//! channel, fire-and-forget publish, broadcast subscription. Delivery is
//! best-effort; slow subscribers lose messages rather than stall publishers.
//!
//! `LocalChannelHub` is the in-process implementation used by the binary
//! (the WebSocket relay bridges remote participants onto it) and by tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::error::ChannelError;
use crate::sample::now_millis;

/// Live buffer per channel before slow subscribers start lagging
pub const CHANNEL_BUFFER: usize = 256;

/// Persisted messages kept per channel for late joiners
pub const REPLAY_CAPACITY: usize = 100;

/// Largest encoded message accepted by the hub
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024;

/// Publish flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Keep the message in the channel's durable history
    pub persist: bool,
}

impl PublishOptions {
    pub fn ephemeral() -> Self {
        Self { persist: false }
    }

    pub fn persistent() -> Self {
        Self { persist: true }
    }
}

/// A message as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    pub data: Value,
    /// Hub receipt time (unix millis)
    pub timestamp: i64,
}

pub type ChannelSubscription = broadcast::Receiver<ChannelMessage>;

/// Publish/subscribe access to named real-time channels
pub trait RealtimeChannel: Send + Sync + 'static {
    fn publish(
        &self,
        channel: &str,
        data: Value,
        opts: PublishOptions,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError>;
}

struct ChannelSlot {
    sender: broadcast::Sender<ChannelMessage>,
    replay: VecDeque<ChannelMessage>,
}

impl ChannelSlot {
    fn new() -> Self {
        let (sender, _rx) = broadcast::channel(CHANNEL_BUFFER);
        Self {
            sender,
            replay: VecDeque::new(),
        }
    }
}

/// In-process channel hub: one broadcast sender per channel name
pub struct LocalChannelHub {
    channels: Mutex<HashMap<String, ChannelSlot>>,
    closed: AtomicBool,
}

impl Default for LocalChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalChannelHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self, channel: &str) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed(channel.to_string()));
        }
        Ok(())
    }

    /// Deliver synchronously; returns the number of live subscribers reached
    pub fn send(
        &self,
        channel: &str,
        data: Value,
        opts: PublishOptions,
    ) -> Result<usize, ChannelError> {
        self.ensure_open(channel)?;

        let encoded = serde_json::to_vec(&data)?;
        if encoded.len() > MAX_MESSAGE_BYTES {
            return Err(ChannelError::Rejected(format!(
                "message of {} bytes exceeds {} byte limit",
                encoded.len(),
                MAX_MESSAGE_BYTES
            )));
        }

        let message = ChannelMessage {
            channel: channel.to_string(),
            data,
            timestamp: now_millis(),
        };

        let mut channels = self.channels.lock();
        let slot = channels.entry(channel.to_string()).or_insert_with(|| {
            tracing::debug!("Created real-time channel: {}", channel);
            ChannelSlot::new()
        });

        if opts.persist {
            slot.replay.push_back(message.clone());
            if slot.replay.len() > REPLAY_CAPACITY {
                slot.replay.pop_front();
            }
        }

        match slot.sender.send(message) {
            Ok(count) => {
                tracing::trace!("Delivered message on '{}' to {} subscribers", channel, count);
                Ok(count)
            }
            Err(_) => {
                tracing::trace!("No active subscribers on '{}'", channel);
                Ok(0)
            }
        }
    }

    /// Persisted messages for a channel, oldest first
    pub fn replay(&self, channel: &str) -> Vec<ChannelMessage> {
        self.channels
            .lock()
            .get(channel)
            .map(|slot| slot.replay.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map(|slot| slot.sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels with no subscribers and nothing persisted
    pub fn cleanup_inactive(&self) {
        let mut channels = self.channels.lock();
        channels.retain(|name, slot| {
            if slot.sender.receiver_count() == 0 && slot.replay.is_empty() {
                tracing::debug!("Removing inactive channel: {}", name);
                false
            } else {
                true
            }
        });
    }

    /// Refuse further traffic and drop all senders so subscribers see `Closed`
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.channels.lock().clear();
        tracing::info!("Real-time channel hub closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl RealtimeChannel for LocalChannelHub {
    async fn publish(
        &self,
        channel: &str,
        data: Value,
        opts: PublishOptions,
    ) -> Result<(), ChannelError> {
        self.send(channel, data, opts).map(|_| ())
    }

    fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError> {
        self.ensure_open(channel)?;
        let mut channels = self.channels.lock();
        let slot = channels
            .entry(channel.to_string())
            .or_insert_with(ChannelSlot::new);
        Ok(slot.sender.subscribe())
    }
}
