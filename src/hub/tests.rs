use std::sync::Arc;
use std::time::Duration;

use super::Hub;
use super::subscribers::MatchSubscribers;
use crate::connection::Connection;
use crate::event::{Event, EventData, MatchEventData, MatchEventKind, MatchId, ScoreData};
use crate::utils::shutdown;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn match_id(raw: u64) -> MatchId {
    MatchId::new(raw).unwrap()
}

fn goal(raw_match: u64, minute: u16) -> Event {
    Event::new(
        match_id(raw_match),
        1_725_000_000_000,
        EventData::MatchEvent(MatchEventData::new(MatchEventKind::Goal, minute)),
    )
}

fn connect(raw_match: u64, capacity: usize) -> (Arc<Connection>, mpsc::Receiver<WsMessage>) {
    Connection::new(match_id(raw_match), None, capacity)
}

fn received_json(rx: &mut mpsc::Receiver<WsMessage>) -> serde_json::Value {
    match rx.try_recv().expect("expected a queued message") {
        WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn test_subscribers_insert_and_remove() {
    let mut subscribers = MatchSubscribers::new();
    let (conn, _rx) = connect(1, 4);

    assert!(subscribers.insert(conn.clone()));
    assert!(!subscribers.insert(conn.clone()));
    assert_eq!(subscribers.len(), 1);
    assert!(subscribers.contains(conn.id()));

    assert!(subscribers.remove(conn.id()));
    assert!(!subscribers.remove(conn.id()));
    assert!(subscribers.is_empty());
}

#[test]
fn test_hub_new() {
    let hub = Hub::default();
    assert_eq!(hub.match_count(), 0);
    assert!(hub.active_matches().is_empty());
}

#[test]
fn test_register_is_idempotent() {
    let hub = Hub::default();
    let (conn, _rx) = connect(42, 4);

    assert!(hub.register(conn.clone()));
    assert!(hub.register(conn.clone()));
    assert_eq!(hub.connection_count(match_id(42)), 1);
    assert!(hub.is_registered(&conn));
}

#[test]
fn test_unregister_removes_empty_match_entry() {
    let hub = Hub::default();
    let (c1, _rx1) = connect(42, 4);
    let (c2, _rx2) = connect(42, 4);
    hub.register(c1.clone());
    hub.register(c2.clone());

    assert!(hub.unregister(&c1));
    assert_eq!(hub.connection_count(match_id(42)), 1);
    assert_eq!(hub.active_matches(), vec![match_id(42)]);

    assert!(hub.unregister(&c2));
    assert_eq!(hub.match_count(), 0);
}

#[test]
fn test_double_unregister_is_noop() {
    let hub = Hub::default();
    let (c1, mut rx) = connect(42, 4);
    hub.register(c1.clone());

    assert!(hub.unregister(&c1));
    assert!(!hub.unregister(&c1));
    assert!(c1.is_closed());
    assert_eq!(hub.match_count(), 0);
    // queue closed exactly once, receiver sees the end of the stream
    assert!(matches!(
        rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_closed_connection_cannot_register_again() {
    let hub = Hub::default();
    let (c1, _rx) = connect(42, 4);
    hub.register(c1.clone());
    hub.unregister(&c1);

    assert!(!hub.register(c1.clone()));
    assert_eq!(hub.match_count(), 0);
}

#[test]
fn test_registry_never_keeps_empty_sets() {
    let hub = Hub::default();
    let conns: Vec<_> = (0..6).map(|i| connect(1 + i % 3, 4)).collect();

    for (i, (conn, _)) in conns.iter().enumerate() {
        hub.register(conn.clone());
        if i % 2 == 0 {
            hub.unregister(conn);
            hub.unregister(conn);
        }
        for id in hub.active_matches() {
            assert!(hub.connection_count(id) > 0);
        }
    }
    for (conn, _) in &conns {
        hub.unregister(conn);
    }
    assert_eq!(hub.match_count(), 0);
}

#[test]
fn test_broadcast_without_watchers_is_noop() {
    let hub = Hub::default();
    let report = hub.broadcast(&goal(99, 1));
    assert_eq!(report.delivered, 0);
    assert_eq!(report.evicted, 0);
    assert_eq!(hub.match_count(), 0);
}

#[test]
fn test_broadcast_reaches_every_watcher_of_the_match() {
    let hub = Hub::default();
    let (c1, mut rx1) = connect(42, 4);
    let (c2, mut rx2) = connect(42, 4);
    hub.register(c1);
    hub.register(c2);

    let report = hub.broadcast(&goal(42, 10));
    assert_eq!(report.delivered, 2);

    for rx in [&mut rx1, &mut rx2] {
        let value = received_json(rx);
        assert_eq!(value["type"], "match_event");
        assert_eq!(value["match_id"], 42);
        assert_eq!(value["data"]["minute"], 10);
        assert!(rx.try_recv().is_err(), "exactly one copy per connection");
    }
}

#[test]
fn test_broadcast_is_partitioned_by_match() {
    let hub = Hub::default();
    let (c1, mut rx1) = connect(42, 4);
    let (c2, mut rx2) = connect(43, 4);
    hub.register(c1);
    hub.register(c2);

    hub.broadcast(&goal(42, 5));

    assert_eq!(received_json(&mut rx1)["match_id"], 42);
    assert!(rx2.try_recv().is_err());
}

#[test]
fn test_full_queue_is_evicted_without_blocking() {
    let hub = Hub::default();
    let (slow, mut slow_rx) = connect(42, 1);
    let (fast, mut fast_rx) = connect(42, 4);
    hub.register(slow.clone());
    hub.register(fast.clone());

    slow.try_enqueue(WsMessage::text("backlog")).unwrap();

    let report = hub.broadcast(&goal(42, 30));
    assert_eq!(report.delivered, 1);
    assert_eq!(report.evicted, 1);

    assert!(slow.was_evicted());
    assert!(slow.is_closed());
    assert!(!hub.is_registered(&slow));
    assert!(hub.is_registered(&fast));
    assert_eq!(received_json(&mut fast_rx)["data"]["minute"], 30);

    // The backlog is still drained before the queue reports closed.
    assert!(matches!(slow_rx.try_recv(), Ok(WsMessage::Text(_))));
    assert!(matches!(
        slow_rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_broadcast_preserves_order_per_connection() {
    let hub = Hub::default();
    let (c1, mut rx) = connect(7, 8);
    hub.register(c1);

    for home in 0..3 {
        hub.broadcast(&Event::new(
            match_id(7),
            home as i64,
            EventData::ScoreUpdate(ScoreData {
                home_score: home,
                away_score: 0,
            }),
        ));
    }

    for home in 0..3 {
        assert_eq!(received_json(&mut rx)["data"]["home_score"], home);
    }
}

#[tokio::test]
async fn test_run_dispatches_intake_until_shutdown() {
    let hub = Arc::new(Hub::new());
    let (c1, mut rx) = connect(42, 4);
    hub.register(c1);

    let (intake_tx, intake_rx) = Hub::intake_channel(Hub::DEFAULT_INTAKE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    let handle = tokio::spawn(hub.clone().run(intake_rx, shutdown_rx));

    intake_tx.send(goal(42, 77)).await.unwrap();
    let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("dispatch timed out")
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    assert_eq!(value["data"]["minute"], 77);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("hub did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_run_stops_when_all_intake_senders_are_dropped() {
    let hub = Arc::new(Hub::new());
    let (c1, mut rx) = connect(7, 4);
    hub.register(c1);

    let (intake_tx, intake_rx) = Hub::intake_channel(4);
    let (_shutdown_tx, shutdown_rx) = shutdown::channel();
    let bridge_side = intake_tx.clone();
    bridge_side.send(goal(7, 5)).await.unwrap();
    drop(bridge_side);
    drop(intake_tx);

    // already queued events are still dispatched before the loop ends
    tokio::time::timeout(Duration::from_secs(1), hub.clone().run(intake_rx, shutdown_rx))
        .await
        .expect("hub should stop once the intake is closed");
    assert_eq!(received_json(&mut rx)["data"]["minute"], 5);
}
