//! Decay engine
//!
//! Excitement fades when nobody is feeding the channel. Each tick removes a
//! random base amount plus an accelerated share once the level is high. The
//! ticker never touches state itself; it posts `DecayTick` into the gauge
//! mailbox so decay and inbound merges are serialized by the same writer.

use rand::Rng;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::GaugeConfig;
use crate::gauge::GaugeCommand;
use crate::intensity::IntensityState;

/// Per-tick decay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayPolicy {
    pub base_min: f64,
    pub base_max: f64,
    /// Levels strictly above this decay faster
    pub accel_threshold: f64,
    pub accel_factor: f64,
}

impl Default for DecayPolicy {
    fn default() -> Self {
        Self {
            base_min: 5.0,
            base_max: 12.0,
            accel_threshold: 50.0,
            accel_factor: 0.08,
        }
    }
}

impl DecayPolicy {
    pub fn from_config(cfg: &GaugeConfig) -> Self {
        Self {
            base_min: cfg.decay_min,
            base_max: cfg.decay_max,
            accel_threshold: cfg.accel_threshold,
            accel_factor: cfg.accel_factor,
        }
    }

    /// Amount to subtract at `level`. Zero when already idle.
    pub fn amount<R: Rng + ?Sized>(&self, level: f64, rng: &mut R) -> f64 {
        if level <= 0.0 {
            return 0.0;
        }

        let base = if self.base_max > self.base_min {
            rng.gen_range(self.base_min..self.base_max)
        } else {
            self.base_min
        };

        let accelerated = if level > self.accel_threshold {
            level * self.accel_factor
        } else {
            0.0
        };

        base + accelerated
    }

    /// Apply one tick to `state`, returning the new level
    pub fn tick<R: Rng + ?Sized>(&self, state: &mut IntensityState, rng: &mut R) -> f64 {
        if state.is_idle() {
            return state.level();
        }
        let amount = self.amount(state.level(), rng);
        state.apply_decay(amount)
    }

    /// Upper bound on ticks needed to reach zero from `level`
    pub fn max_ticks_to_zero(&self, level: f64) -> u64 {
        if level <= 0.0 || self.base_min <= 0.0 {
            return 0;
        }
        (level / self.base_min).ceil() as u64
    }
}

/// Post a `DecayTick` to the gauge mailbox every `period` until `stop` flips.
///
/// The first tick fires one full period after start. Missed ticks are skipped
/// rather than bunched up.
pub(crate) async fn run_decay_ticker(
    period: Duration,
    mailbox: mpsc::Sender<GaugeCommand>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "[DECAY] Starting decay ticker (interval: {}ms)",
        period.as_millis()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if mailbox.send(GaugeCommand::DecayTick { ack: None }).await.is_err() {
                    debug!("[DECAY] Gauge mailbox closed, stopping ticker");
                    break;
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }

    info!("[DECAY] Decay ticker stopped");
}
