use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use hype_gauge::channel::ChannelSubscription;
use hype_gauge::{
    ChannelError, EmitOutcome, Emitter, GaugeConfig, GaugeReader, HypeGauge, InboundPayload,
    IntensityTag, LocalChannelHub, PublishOptions, RealtimeChannel,
};

const WAIT: Duration = Duration::from_secs(2);

fn quiet_config() -> GaugeConfig {
    GaugeConfig {
        decay_interval_ms: 60_000,
        cooldown_ms: 100,
        user_id: Some("local-fan".to_string()),
        ..Default::default()
    }
}

async fn next_change(reader: &mut GaugeReader) -> hype_gauge::GaugeSnapshot {
    timeout(WAIT, reader.changed())
        .await
        .expect("timed out waiting for gauge update")
        .expect("gauge stopped")
}

fn send(hub: &LocalChannelHub, data: Value) {
    hub.send("hype", data, PublishOptions::ephemeral()).unwrap();
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let hub = LocalChannelHub::new();
    let gauge = HypeGauge::start_seeded(quiet_config(), &hub, 9).unwrap();
    let mut reader = gauge.reader();
    assert_eq!(gauge.level(), 0.0);

    send(&hub, json!({ "level": 20, "isAdditive": false }));
    let snap = next_change(&mut reader).await;
    assert_eq!(snap.level, 20.0);
    assert_eq!(snap.history.len(), 1);

    send(&hub, json!({ "level": 15, "isAdditive": true }));
    let snap = next_change(&mut reader).await;
    assert_eq!(snap.level, 35.0);
    assert_eq!(snap.history.len(), 2);

    let first = gauge.decay_tick().await.unwrap();
    assert!(first < 35.0 && first >= 0.0);
    let second = gauge.decay_tick().await.unwrap();
    assert!(second < first && second >= 0.0);

    // decay is not sample-worthy
    assert_eq!(gauge.history().len(), 2);
    gauge.shutdown().await;
}

#[tokio::test]
async fn test_merge_semantics_through_channel() {
    let hub = LocalChannelHub::new();
    let gauge = HypeGauge::start(quiet_config(), &hub).unwrap();
    let mut reader = gauge.reader();

    send(&hub, json!({ "level": 40 }));
    next_change(&mut reader).await;
    send(&hub, json!({ "level": 70, "isAdditive": true, "userId": "ana", "intensity": "high" }));
    let snap = next_change(&mut reader).await;
    assert_eq!(snap.level, 100.0);

    let latest = snap.history.last().unwrap();
    assert_eq!(latest.level(), 100.0);
    assert_eq!(latest.source_id(), "ana");
    assert_eq!(latest.intensity_tag(), IntensityTag::High);

    send(&hub, json!({ "level": 90 }));
    next_change(&mut reader).await;
    send(&hub, json!({ "level": 30, "isAdditive": false }));
    let snap = next_change(&mut reader).await;
    assert_eq!(snap.level, 30.0);
    assert_eq!(snap.score(), 3.0);
}

#[tokio::test]
async fn test_malformed_messages_are_dropped() {
    let hub = LocalChannelHub::new();
    let gauge = HypeGauge::start(quiet_config(), &hub).unwrap();
    let mut reader = gauge.reader();

    send(&hub, json!({}));
    send(&hub, json!({ "level": "high" }));
    send(&hub, json!({ "isAdditive": true }));
    send(&hub, json!("level"));
    send(&hub, json!({ "level": 12 }));

    let snap = next_change(&mut reader).await;
    assert_eq!(snap.level, 12.0);
    assert_eq!(snap.history.len(), 1);

    let counts = gauge.ingest_counts();
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.dropped, 4);

    // direct ingestion applies the same validation
    assert!(gauge.ingest(&json!({ "level": null })).await.is_none());
    assert_eq!(gauge.level(), 12.0);
    assert_eq!(gauge.history().len(), 1);
}

#[tokio::test]
async fn test_history_capacity_through_gauge() {
    let hub = LocalChannelHub::new();
    let config = GaugeConfig {
        history_capacity: 10,
        ..quiet_config()
    };
    let gauge = HypeGauge::start(config, &hub).unwrap();

    for i in 0..15 {
        gauge.merge(InboundPayload::absolute(i as f64)).await.unwrap();
    }

    let history = gauge.history();
    assert_eq!(history.len(), 10);
    let levels: Vec<f64> = history.iter().map(|s| s.level()).collect();
    let expected: Vec<f64> = (5..15).map(|i| i as f64).collect();
    assert_eq!(levels, expected);
}

#[tokio::test]
async fn test_background_decay_reaches_zero() {
    let hub = LocalChannelHub::new();
    let config = GaugeConfig {
        decay_interval_ms: 20,
        ..quiet_config()
    };
    let gauge = HypeGauge::start(config, &hub).unwrap();
    let mut reader = gauge.reader();

    gauge.merge(InboundPayload::absolute(100.0)).await.unwrap();
    let mut previous = gauge.level();

    let drained = timeout(Duration::from_secs(3), async {
        loop {
            let Some(snap) = reader.changed().await else {
                return false;
            };
            assert!(snap.level <= previous, "{} rose above {}", snap.level, previous);
            assert!(snap.level >= 0.0);
            previous = snap.level;
            if snap.level == 0.0 {
                return true;
            }
        }
    })
    .await
    .expect("decay did not reach zero");

    assert!(drained);
    assert_eq!(gauge.history().len(), 1);
    assert_eq!(gauge.score(), 0.0);
    gauge.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_makes_updates_noops() {
    let hub = LocalChannelHub::new();
    let gauge = HypeGauge::start(quiet_config(), &hub).unwrap();
    gauge.merge(InboundPayload::absolute(50.0)).await.unwrap();

    gauge.shutdown().await;
    assert!(!gauge.is_running());
    assert_eq!(hub.subscriber_count("hype"), 0);

    assert!(gauge.merge(InboundPayload::absolute(10.0)).await.is_none());
    assert!(gauge.decay_tick().await.is_none());
    send(&hub, json!({ "level": 99 }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gauge.level(), 50.0);
    assert_eq!(gauge.history().len(), 1);

    // second shutdown is harmless
    gauge.shutdown().await;
}

#[tokio::test]
async fn test_drop_stops_ingestion_and_decay() {
    let hub = LocalChannelHub::new();
    let config = GaugeConfig {
        decay_interval_ms: 20,
        ..quiet_config()
    };
    let gauge = HypeGauge::start(config, &hub).unwrap();
    gauge.merge(InboundPayload::absolute(60.0)).await.unwrap();
    let mut reader = gauge.reader();
    reader.latest();

    drop(gauge);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hub.subscriber_count("hype"), 0);

    let frozen = reader.level();
    send(&hub, json!({ "level": 5 }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // neither ingestion nor the ticker moved the level after the drop
    assert_eq!(reader.level(), frozen);
    assert!(frozen > 0.0);
    assert!(timeout(WAIT, reader.changed()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_hub_close_ends_ingestion() {
    let hub = LocalChannelHub::new();
    let gauge = HypeGauge::start(quiet_config(), &hub).unwrap();
    hub.close();

    // direct merges still apply; the closed channel is not a fault
    let sample = gauge.merge(InboundPayload::absolute(25.0)).await.unwrap();
    assert_eq!(sample.level(), 25.0);
    gauge.shutdown().await;
}

#[tokio::test]
async fn test_emission_round_trips_through_ingestion() {
    let hub = Arc::new(LocalChannelHub::new());
    let gauge = HypeGauge::start(quiet_config(), &*hub).unwrap();
    let emitter = Emitter::new(&quiet_config(), gauge.reader(), hub.clone());

    gauge.merge(InboundPayload::absolute(40.0)).await.unwrap();
    let mut reader = gauge.reader();
    assert_eq!(reader.latest().level, 40.0);

    let outcome = emitter.trigger().await;
    let EmitOutcome::Published { level } = outcome else {
        panic!("unexpected outcome {:?}", outcome);
    };
    assert!((50..=70).contains(&level));

    let snap = next_change(&mut reader).await;
    assert_eq!(snap.level, level as f64);
    let latest = snap.history.last().unwrap();
    assert_eq!(latest.source_id(), "local-fan");
    assert_eq!(latest.intensity_tag(), IntensityTag::High);

    // emitted messages are not persisted on the channel
    assert!(hub.replay("hype").is_empty());
}

struct SlowChannel {
    inner: LocalChannelHub,
    delay: Duration,
}

impl RealtimeChannel for SlowChannel {
    async fn publish(
        &self,
        channel: &str,
        data: Value,
        opts: PublishOptions,
    ) -> Result<(), ChannelError> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish(channel, data, opts).await
    }

    fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError> {
        self.inner.subscribe(channel)
    }
}

struct FailingChannel {
    inner: LocalChannelHub,
}

impl RealtimeChannel for FailingChannel {
    async fn publish(
        &self,
        _channel: &str,
        _data: Value,
        _opts: PublishOptions,
    ) -> Result<(), ChannelError> {
        Err(ChannelError::Rejected("network down".to_string()))
    }

    fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError> {
        self.inner.subscribe(channel)
    }
}

#[tokio::test]
async fn test_emission_rejects_while_in_flight() {
    let channel = Arc::new(SlowChannel {
        inner: LocalChannelHub::new(),
        delay: Duration::from_millis(100),
    });
    let mut published = channel.inner.subscribe("hype").unwrap();
    let gauge = HypeGauge::start(quiet_config(), &*channel).unwrap();
    let emitter = Emitter::new(&quiet_config(), gauge.reader(), channel.clone());

    let (a, b) = tokio::join!(emitter.trigger(), emitter.trigger());
    let outcomes = [a, b];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, EmitOutcome::Published { .. }))
            .count(),
        1
    );
    assert!(outcomes.contains(&EmitOutcome::InFlight));

    // still cooling down
    assert_eq!(emitter.trigger().await, EmitOutcome::InFlight);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(matches!(emitter.trigger().await, EmitOutcome::Published { .. }));

    // exactly two messages hit the channel
    let mut count = 0;
    while let Ok(Ok(_)) = timeout(Duration::from_millis(50), published.recv()).await {
        count += 1;
    }
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_emission_failure_is_swallowed() {
    let channel = Arc::new(FailingChannel {
        inner: LocalChannelHub::new(),
    });
    let gauge = HypeGauge::start(quiet_config(), &*channel).unwrap();
    gauge.merge(InboundPayload::absolute(33.0)).await.unwrap();
    let emitter = Emitter::new(&quiet_config(), gauge.reader(), channel);

    assert_eq!(emitter.trigger().await, EmitOutcome::Failed);
    assert_eq!(gauge.level(), 33.0);
    assert_eq!(gauge.history().len(), 1);

    // the guard still cools down and releases
    assert_eq!(emitter.trigger().await, EmitOutcome::InFlight);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!emitter.is_in_flight());
}
