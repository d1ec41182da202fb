use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use super::BrokerBridge;
use crate::event::{Event, EventData, MatchId, ScoreData};
use crate::pubsub::{BrokerMessage, LocalPubSub, PubSub, Subscription};
use crate::utils::error::BrokerError;
use crate::utils::shutdown;

type Script = VecDeque<Result<BrokerMessage, BrokerError>>;

/// Broker whose subscriptions replay a fixed script, then go quiet.
struct ScriptedPubSub {
    scripts: Mutex<VecDeque<Script>>,
    subscribes: AtomicUsize,
}

impl ScriptedPubSub {
    fn new(scripts: Vec<Vec<Result<BrokerMessage, BrokerError>>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().map(VecDeque::from).collect()),
            subscribes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PubSub for ScriptedPubSub {
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<usize, BrokerError> {
        Ok(0)
    }

    async fn psubscribe(&self, _pattern: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedSubscription { script }))
    }
}

struct ScriptedSubscription {
    script: Script,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn recv(&mut self) -> Result<BrokerMessage, BrokerError> {
        match self.script.pop_front() {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }
}

fn score_payload(match_id: u64, home: u16) -> String {
    Event::new(
        MatchId::new(match_id).unwrap(),
        1,
        EventData::ScoreUpdate(ScoreData {
            home_score: home,
            away_score: 0,
        }),
    )
    .to_json()
    .unwrap()
}

fn message(channel: &str, payload: impl Into<String>) -> Result<BrokerMessage, BrokerError> {
    Ok(BrokerMessage {
        pattern: "match:*".to_string(),
        channel: channel.to_string(),
        payload: payload.into(),
    })
}

async fn next_event(rx: &mut mpsc::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("bridge did not forward an event")
        .expect("intake closed")
}

fn home_score(event: &Event) -> u16 {
    match event.data() {
        EventData::ScoreUpdate(score) => score.home_score,
        other => panic!("Expected score update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bridge_skips_malformed_and_survives_receive_error() {
    let pubsub = ScriptedPubSub::new(vec![vec![
        message("match:1", "{not json"),
        message("match:1", json!({"type": "lineup"}).to_string()),
        Err(BrokerError::Unavailable("connection reset".to_string())),
        message("match:1", score_payload(1, 3)),
    ]]);
    let (intake_tx, mut intake_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let bridge = BrokerBridge::new(pubsub.clone(), intake_tx, "match", Duration::from_millis(20));
    let handle = tokio::spawn(bridge.run(shutdown_rx));

    let event = next_event(&mut intake_rx).await;
    assert_eq!(home_score(&event), 3);
    // a transient error does not tear down the subscription
    assert_eq!(pubsub.subscribes.load(Ordering::SeqCst), 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("bridge did not stop")
        .unwrap();
}

async fn let_bridge_run() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_bridge_waits_for_backoff_after_receive_error() {
    let backoff = Duration::from_secs(1);
    let pubsub = ScriptedPubSub::new(vec![vec![
        Err(BrokerError::Unavailable("connection reset".to_string())),
        message("match:1", score_payload(1, 2)),
    ]]);
    let (intake_tx, mut intake_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = shutdown::channel();
    let started = tokio::time::Instant::now();

    let bridge = BrokerBridge::new(pubsub, intake_tx, "match", backoff);
    tokio::spawn(bridge.run(shutdown_rx));

    let_bridge_run().await;
    tokio::time::advance(Duration::from_millis(900)).await;
    let_bridge_run().await;
    assert!(intake_rx.try_recv().is_err(), "forwarded before the backoff elapsed");

    tokio::time::advance(Duration::from_millis(200)).await;
    let event = next_event(&mut intake_rx).await;
    assert_eq!(home_score(&event), 2);
    assert!(started.elapsed() >= backoff);
}

#[tokio::test]
async fn test_bridge_resubscribes_after_closed_subscription() {
    let pubsub = ScriptedPubSub::new(vec![
        vec![message("match:2", score_payload(2, 1)), Err(BrokerError::Closed)],
        vec![message("match:2", score_payload(2, 2))],
    ]);
    let (intake_tx, mut intake_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = shutdown::channel();

    let bridge = BrokerBridge::new(pubsub.clone(), intake_tx, "match", Duration::from_millis(20));
    tokio::spawn(bridge.run(shutdown_rx));

    assert_eq!(home_score(&next_event(&mut intake_rx).await), 1);
    assert_eq!(home_score(&next_event(&mut intake_rx).await), 2);
    assert_eq!(pubsub.subscribes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_bridge_preserves_receive_order() {
    let script = (0..10).map(|i| message("match:4", score_payload(4, i))).collect();
    let pubsub = ScriptedPubSub::new(vec![script]);
    let (intake_tx, mut intake_rx) = mpsc::channel(2);
    let (_shutdown_tx, shutdown_rx) = shutdown::channel();

    let bridge = BrokerBridge::new(pubsub, intake_tx, "match", Duration::from_millis(20));
    tokio::spawn(bridge.run(shutdown_rx));

    for expected in 0..10 {
        assert_eq!(home_score(&next_event(&mut intake_rx).await), expected);
    }
}

#[tokio::test]
async fn test_bridge_rejects_event_on_foreign_channel() {
    let pubsub = ScriptedPubSub::new(vec![vec![
        message("match:9", score_payload(1, 7)),
        message("match:1", score_payload(1, 8)),
    ]]);
    let (intake_tx, mut intake_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = shutdown::channel();

    let bridge = BrokerBridge::new(pubsub, intake_tx, "match", Duration::from_millis(20));
    tokio::spawn(bridge.run(shutdown_rx));

    assert_eq!(home_score(&next_event(&mut intake_rx).await), 8);
}

#[tokio::test]
async fn test_bridge_stops_when_hub_intake_is_gone() {
    let pubsub = ScriptedPubSub::new(vec![vec![message("match:1", score_payload(1, 1))]]);
    let (intake_tx, intake_rx) = mpsc::channel(8);
    drop(intake_rx);
    let (_shutdown_tx, shutdown_rx) = shutdown::channel();

    let bridge = BrokerBridge::new(pubsub, intake_tx, "match", Duration::from_millis(20));
    tokio::time::timeout(Duration::from_secs(1), bridge.run(shutdown_rx))
        .await
        .expect("bridge should stop once the intake is closed");
}

#[tokio::test]
async fn test_bridge_over_local_pubsub() {
    let pubsub = Arc::new(LocalPubSub::default());
    let (intake_tx, mut intake_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let bridge = BrokerBridge::new(pubsub.clone(), intake_tx, "match", Duration::from_millis(20));
    let handle = tokio::spawn(bridge.run(shutdown_rx));

    // wait until the bridge's pattern subscription is live
    let mut attempts = 0;
    while pubsub.publish("match:6", &score_payload(6, 4)).await.unwrap() == 0 {
        attempts += 1;
        assert!(attempts < 100, "bridge never subscribed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let event = next_event(&mut intake_rx).await;
    assert_eq!(event.match_id(), MatchId::new(6).unwrap());
    assert_eq!(home_score(&event), 4);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
