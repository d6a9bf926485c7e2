//! Emission adapter
//!
//! Lets the local participant push a boosted reading onto the channel. The
//! gauge is never updated directly here: the published message comes back
//! through the ingestion path like anyone else's.
//!
//! Only one emission may be in flight. The guard is released one cool-down
//! window after the publish completes, whatever the outcome.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::channel::{PublishOptions, RealtimeChannel};
use crate::config::GaugeConfig;
use crate::gauge::GaugeReader;
use crate::intensity::clamp_level;
use crate::payload::OutboundPayload;
use crate::sample::{now_millis, IntensityTag};

/// Result of one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmitOutcome {
    /// Message handed to the channel
    Published { level: i64 },
    /// Another emission is still in flight or cooling down; nothing sent
    InFlight,
    /// Publish failed; logged and swallowed
    Failed,
}

/// Releases the in-flight flag after the cool-down, even if the trigger is cancelled
struct InFlightGuard {
    flag: Arc<AtomicBool>,
    cooldown: Duration,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let flag = self.flag.clone();
        let cooldown = self.cooldown;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    flag.store(false, Ordering::Release);
                });
            }
            Err(_) => flag.store(false, Ordering::Release),
        }
    }
}

pub struct Emitter<C: RealtimeChannel> {
    channel: Arc<C>,
    reader: GaugeReader,
    channel_name: String,
    user_id: String,
    boost_min: f64,
    boost_max: f64,
    cooldown: Duration,
    in_flight: Arc<AtomicBool>,
    rng: Mutex<StdRng>,
}

impl<C: RealtimeChannel> Emitter<C> {
    pub fn new(config: &GaugeConfig, reader: GaugeReader, channel: Arc<C>) -> Self {
        Self::with_rng(config, reader, channel, StdRng::from_entropy())
    }

    pub fn with_rng(
        config: &GaugeConfig,
        reader: GaugeReader,
        channel: Arc<C>,
        rng: StdRng,
    ) -> Self {
        let user_id = config
            .user_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            channel,
            reader,
            channel_name: config.channel_name.clone(),
            user_id,
            boost_min: config.boost_min,
            boost_max: config.boost_max,
            cooldown: config.cooldown(),
            in_flight: Arc::new(AtomicBool::new(false)),
            rng: Mutex::new(rng),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn draw_boost(&self) -> f64 {
        if self.boost_max > self.boost_min {
            self.rng.lock().gen_range(self.boost_min..=self.boost_max)
        } else {
            self.boost_min
        }
    }

    /// Level this participant would propose right now, before rounding
    fn propose(&self, boost: f64) -> f64 {
        clamp_level(self.reader.level() + boost)
    }

    /// Publish a boosted reading unless one is already in flight
    pub async fn trigger(&self) -> EmitOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[EMIT] Trigger ignored, emission already in flight");
            return EmitOutcome::InFlight;
        }
        let _guard = InFlightGuard {
            flag: self.in_flight.clone(),
            cooldown: self.cooldown,
        };

        let boost = self.draw_boost();
        let payload = OutboundPayload {
            user_id: self.user_id.clone(),
            level: self.propose(boost).round() as i64,
            intensity: IntensityTag::High,
            timestamp: now_millis(),
        };

        match self
            .channel
            .publish(&self.channel_name, payload.to_value(), PublishOptions::ephemeral())
            .await
        {
            Ok(()) => {
                info!(
                    "[EMIT] Published hype level {} (boost {:.1}) as {}",
                    payload.level, boost, self.user_id
                );
                EmitOutcome::Published {
                    level: payload.level,
                }
            }
            Err(e) => {
                warn!("[EMIT] Publish failed: {}", e);
                EmitOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalChannelHub;
    use crate::gauge::HypeGauge;

    fn config() -> GaugeConfig {
        GaugeConfig {
            decay_interval_ms: 60_000,
            cooldown_ms: 50,
            user_id: Some("me".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_boost_within_range() {
        let hub = Arc::new(LocalChannelHub::new());
        let gauge = HypeGauge::start(config(), &*hub).unwrap();
        let emitter = Emitter::with_rng(&config(), gauge.reader(), hub, StdRng::seed_from_u64(5));

        for _ in 0..200 {
            let boost = emitter.draw_boost();
            assert!((10.0..=30.0).contains(&boost));
        }
        assert_eq!(emitter.user_id(), "me");
    }

    #[tokio::test]
    async fn test_proposal_clamped() {
        let hub = Arc::new(LocalChannelHub::new());
        let gauge = HypeGauge::start(config(), &*hub).unwrap();
        gauge
            .merge(crate::payload::InboundPayload::absolute(95.0))
            .await
            .unwrap();

        let emitter = Emitter::new(&config(), gauge.reader(), hub);
        assert_eq!(emitter.propose(30.0), 100.0);
    }

    #[tokio::test]
    async fn test_generated_user_id() {
        let hub = Arc::new(LocalChannelHub::new());
        let cfg = GaugeConfig {
            user_id: None,
            ..config()
        };
        let gauge = HypeGauge::start(cfg.clone(), &*hub).unwrap();
        let emitter = Emitter::new(&cfg, gauge.reader(), hub);
        assert!(uuid::Uuid::parse_str(emitter.user_id()).is_ok());
    }

    #[tokio::test]
    async fn test_guard_released_after_cooldown() {
        let hub = Arc::new(LocalChannelHub::new());
        let gauge = HypeGauge::start(config(), &*hub).unwrap();
        let emitter = Emitter::new(&config(), gauge.reader(), hub);

        assert!(matches!(emitter.trigger().await, EmitOutcome::Published { .. }));
        assert!(emitter.is_in_flight());
        assert_eq!(emitter.trigger().await, EmitOutcome::InFlight);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!emitter.is_in_flight());
        assert!(matches!(emitter.trigger().await, EmitOutcome::Published { .. }));
    }
}
