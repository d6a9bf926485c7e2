//! Hype gauge core
//!
//! One actor task owns the intensity level and the sample history. Inbound
//! merges (from the ingestion adapter) and decay ticks (from the ticker) both
//! arrive as `GaugeCommand`s on the same mailbox, so every mutation is
//! serialized and no merge can read a stale level.
//!
//! After each mutation the actor publishes an immutable `GaugeSnapshot` on a
//! watch channel. Readers only ever see snapshots.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channel::RealtimeChannel;
use crate::config::GaugeConfig;
use crate::decay::{run_decay_ticker, DecayPolicy};
use crate::error::GaugeError;
use crate::history::HistoryBuffer;
use crate::ingest::{run_ingestion, IngestCounts, IngestStats};
use crate::intensity::IntensityState;
use crate::payload::InboundPayload;
use crate::sample::{now_millis, Sample};
use crate::score;

const MAILBOX_CAPACITY: usize = 1024;

/// Mutation requests for the gauge actor
#[derive(Debug)]
pub(crate) enum GaugeCommand {
    Merge {
        payload: InboundPayload,
        ack: Option<oneshot::Sender<Sample>>,
    },
    DecayTick {
        ack: Option<oneshot::Sender<f64>>,
    },
    Shutdown,
}

/// Read-only view of the gauge at one point in time
#[derive(Debug, Clone)]
pub struct GaugeSnapshot {
    pub level: f64,
    pub history: Arc<[Sample]>,
    pub capacity: usize,
    /// Unix millis of the mutation that produced this snapshot
    pub updated_at: i64,
    /// Increments on every published mutation
    pub version: u64,
}

impl GaugeSnapshot {
    pub fn score(&self) -> f64 {
        score::score(self.level)
    }
}

/// State owned by the actor task
pub(crate) struct GaugeCore {
    intensity: IntensityState,
    history: HistoryBuffer,
    policy: DecayPolicy,
    rng: StdRng,
    version: u64,
    updated_at: i64,
}

impl GaugeCore {
    pub(crate) fn new(config: &GaugeConfig, rng: StdRng) -> Self {
        Self {
            intensity: IntensityState::new(),
            history: HistoryBuffer::new(config.history_capacity),
            policy: DecayPolicy::from_config(config),
            rng,
            version: 0,
            updated_at: now_millis(),
        }
    }

    /// Merge an accepted reading and record the resulting sample
    pub(crate) fn merge(&mut self, payload: InboundPayload) -> Sample {
        let level = self.intensity.merge(payload.level, payload.merge_mode());
        let sample = Sample::new(level, payload.user_id, payload.intensity);
        self.history.push(sample.clone());
        self.touch();
        sample
    }

    /// Apply one decay tick. Returns the new level when it changed.
    pub(crate) fn decay(&mut self) -> Option<f64> {
        if self.intensity.is_idle() {
            return None;
        }
        let level = self.policy.tick(&mut self.intensity, &mut self.rng);
        self.touch();
        Some(level)
    }

    pub(crate) fn level(&self) -> f64 {
        self.intensity.level()
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = now_millis();
    }

    pub(crate) fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot {
            level: self.intensity.level(),
            history: self.history.snapshot(),
            capacity: self.history.capacity(),
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

async fn run_actor(
    mut core: GaugeCore,
    mut mailbox: mpsc::Receiver<GaugeCommand>,
    snapshots: watch::Sender<GaugeSnapshot>,
) {
    while let Some(command) = mailbox.recv().await {
        match command {
            GaugeCommand::Merge { payload, ack } => {
                let sample = core.merge(payload);
                debug!(
                    level = sample.level(),
                    source = sample.source_id(),
                    "merged inbound sample"
                );
                snapshots.send_replace(core.snapshot());
                if let Some(ack) = ack {
                    let _ = ack.send(sample);
                }
            }
            GaugeCommand::DecayTick { ack } => {
                if core.decay().is_some() {
                    snapshots.send_replace(core.snapshot());
                }
                if let Some(ack) = ack {
                    let _ = ack.send(core.level());
                }
            }
            GaugeCommand::Shutdown => break,
        }
    }
    debug!("Gauge actor exited");
}

struct GaugeTasks {
    actor: JoinHandle<()>,
    decay: JoinHandle<()>,
    ingest: JoinHandle<()>,
}

impl GaugeTasks {
    fn abort_all(&self) {
        self.ingest.abort();
        self.decay.abort();
        self.actor.abort();
    }
}

/// Cloneable read-only handle on the gauge
#[derive(Clone)]
pub struct GaugeReader {
    snapshots: watch::Receiver<GaugeSnapshot>,
}

impl GaugeReader {
    pub fn level(&self) -> f64 {
        self.snapshots.borrow().level
    }

    /// Recomputed from the current level on every call
    pub fn score(&self) -> f64 {
        score::score(self.level())
    }

    pub fn history(&self) -> Arc<[Sample]> {
        self.snapshots.borrow().history.clone()
    }

    pub fn snapshot(&self) -> GaugeSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Current snapshot, marking it as seen for `changed`
    pub fn latest(&mut self) -> GaugeSnapshot {
        self.snapshots.borrow_and_update().clone()
    }

    /// Wait for the next published mutation. Returns `None` once the gauge stops.
    pub async fn changed(&mut self) -> Option<GaugeSnapshot> {
        self.snapshots.changed().await.ok()?;
        Some(self.snapshots.borrow_and_update().clone())
    }
}

/// Running gauge: actor, decay ticker and channel subscription
pub struct HypeGauge {
    config: GaugeConfig,
    mailbox: mpsc::Sender<GaugeCommand>,
    reader: GaugeReader,
    stop: watch::Sender<bool>,
    tasks: Mutex<Option<GaugeTasks>>,
    ingest_stats: Arc<IngestStats>,
}

impl HypeGauge {
    /// Start the gauge on `channel`. Must be called inside a tokio runtime.
    pub fn start<C: RealtimeChannel>(
        config: GaugeConfig,
        channel: &C,
    ) -> Result<Self, GaugeError> {
        Self::start_with_rng(config, channel, StdRng::from_entropy())
    }

    /// Same as `start` with a fixed decay RNG seed
    pub fn start_seeded<C: RealtimeChannel>(
        config: GaugeConfig,
        channel: &C,
        seed: u64,
    ) -> Result<Self, GaugeError> {
        Self::start_with_rng(config, channel, StdRng::seed_from_u64(seed))
    }

    fn start_with_rng<C: RealtimeChannel>(
        config: GaugeConfig,
        channel: &C,
        rng: StdRng,
    ) -> Result<Self, GaugeError> {
        config.validate()?;
        let subscription = channel.subscribe(&config.channel_name)?;

        let core = GaugeCore::new(&config, rng);
        let (snap_tx, snap_rx) = watch::channel(core.snapshot());
        let (mailbox, mailbox_rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (stop, stop_rx) = watch::channel(false);
        let ingest_stats = Arc::new(IngestStats::default());

        let actor = tokio::spawn(run_actor(core, mailbox_rx, snap_tx));
        let decay = tokio::spawn(run_decay_ticker(
            config.decay_interval(),
            mailbox.clone(),
            stop_rx.clone(),
        ));
        let ingest = tokio::spawn(run_ingestion(
            config.channel_name.clone(),
            subscription,
            mailbox.clone(),
            ingest_stats.clone(),
            stop_rx,
        ));

        info!(
            channel = %config.channel_name,
            capacity = config.history_capacity,
            decay_ms = config.decay_interval_ms,
            "Hype gauge started"
        );

        Ok(Self {
            config,
            mailbox,
            reader: GaugeReader { snapshots: snap_rx },
            stop,
            tasks: Mutex::new(Some(GaugeTasks {
                actor,
                decay,
                ingest,
            })),
            ingest_stats,
        })
    }

    pub fn config(&self) -> &GaugeConfig {
        &self.config
    }

    pub fn reader(&self) -> GaugeReader {
        self.reader.clone()
    }

    pub fn level(&self) -> f64 {
        self.reader.level()
    }

    pub fn score(&self) -> f64 {
        self.reader.score()
    }

    pub fn history(&self) -> Arc<[Sample]> {
        self.reader.history()
    }

    pub fn snapshot(&self) -> GaugeSnapshot {
        self.reader.snapshot()
    }

    pub fn ingest_counts(&self) -> IngestCounts {
        self.ingest_stats.counts()
    }

    /// Merge a validated reading and wait for it to apply.
    ///
    /// Returns the recorded sample, or `None` once the gauge has shut down.
    pub async fn merge(&self, payload: InboundPayload) -> Option<Sample> {
        let (ack, done) = oneshot::channel();
        self.mailbox
            .send(GaugeCommand::Merge {
                payload,
                ack: Some(ack),
            })
            .await
            .ok()?;
        done.await.ok()
    }

    /// Validate then merge a raw message. Malformed input is dropped (`None`).
    pub async fn ingest(&self, raw: &serde_json::Value) -> Option<Sample> {
        let payload = InboundPayload::parse(raw)?;
        self.merge(payload).await
    }

    /// Run one decay tick now and return the resulting level
    pub async fn decay_tick(&self) -> Option<f64> {
        let (ack, done) = oneshot::channel();
        self.mailbox
            .send(GaugeCommand::DecayTick { ack: Some(ack) })
            .await
            .ok()?;
        done.await.ok()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Stop the subscription and the ticker, then the actor.
    ///
    /// Idempotent. Later merges and ticks are no-ops returning `None`.
    pub async fn shutdown(&self) {
        let tasks = self.tasks.lock().take();
        let Some(tasks) = tasks else {
            return;
        };

        let _ = self.stop.send(true);
        let _ = tasks.ingest.await;
        let _ = tasks.decay.await;

        let _ = self.mailbox.send(GaugeCommand::Shutdown).await;
        let _ = tasks.actor.await;

        info!("Hype gauge stopped");
    }
}

impl Drop for HypeGauge {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.lock().take() {
            let _ = self.stop.send(true);
            tasks.abort_all();
        }
    }
}
