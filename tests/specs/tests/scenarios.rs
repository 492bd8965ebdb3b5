// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The six end-to-end scenarios, run against a real in-process broker over
//! loopback TCP with real client instances for each role.

use coop_broker::envelope::{ClarificationStatus, Urgency};
use coop_broker_client::ClientEvent;
use coop_specs::{clarification, consumer, next_port, producer, spawn_broker, yap};

/// One producer, one consumer: a clarification round-trips to an answer.
#[tokio::test]
async fn single_producer_single_consumer_round_trip() {
    let port = next_port();
    let shutdown = spawn_broker(port).await;

    let (c1, mut c1_events) = consumer(port, "c1").await;
    let (p1, _p1_events) = producer(port, "p1").await;

    p1.send_clarification(clarification("q1", "a?", Urgency::Low, 1000)).unwrap();

    let req = match c1_events.recv().await.unwrap() {
        ClientEvent::Clarification(req) => req,
        other => panic!("expected clarification, got {other:?}"),
    };
    assert_eq!(req.id, "q1");

    c1.send_response("q1".to_string(), "yes".to_string()).unwrap();

    let answer = tokio::time::timeout(std::time::Duration::from_millis(100), p1.await_reply("q1", 100))
        .await
        .expect("resolves within 100ms")
        .unwrap();
    assert_eq!(answer, "yes");

    shutdown.cancel();
}

/// Two producers, one consumer: the consumer sees q1 before q2, and only
/// after answering q1 does q2 arrive.
#[tokio::test]
async fn two_producers_fifo_ordering_at_one_consumer() {
    let port = next_port();
    let shutdown = spawn_broker(port).await;

    let (c1, mut c1_events) = consumer(port, "c1").await;
    let (p1, _p1_events) = producer(port, "p1").await;
    let (p2, _p2_events) = producer(port, "p2").await;

    p1.send_clarification(clarification("q1", "q1?", Urgency::Low, 1000)).unwrap();
    p2.send_clarification(clarification("q2", "q2?", Urgency::Low, 1001)).unwrap();

    let first = match c1_events.recv().await.unwrap() {
        ClientEvent::Clarification(req) => req,
        other => panic!("expected clarification, got {other:?}"),
    };
    assert_eq!(first.id, "q1");

    // q2 must not be delivered while q1 is still active.
    let pending = tokio::time::timeout(std::time::Duration::from_millis(100), c1_events.recv()).await;
    assert!(pending.is_err(), "q2 delivered before q1 was answered");

    c1.send_response("q1".to_string(), "ack".to_string()).unwrap();
    p1.await_reply("q1", 1_000).await.unwrap();

    let second = match c1_events.recv().await.unwrap() {
        ClientEvent::Clarification(req) => req,
        other => panic!("expected clarification, got {other:?}"),
    };
    assert_eq!(second.id, "q2");

    shutdown.cancel();
}

/// Two consumers with empty queues split two back-to-back clarifications,
/// one each.
#[tokio::test]
async fn two_consumers_load_balance_back_to_back_requests() {
    let port = next_port();
    let shutdown = spawn_broker(port).await;

    let (_c1, mut c1_events) = consumer(port, "c1").await;
    let (_c2, mut c2_events) = consumer(port, "c2").await;
    let (p1, _p1_events) = producer(port, "p1").await;

    p1.send_clarification(clarification("q1", "q1?", Urgency::Low, 1000)).unwrap();
    p1.send_clarification(clarification("q2", "q2?", Urgency::Low, 1001)).unwrap();

    let r1 = match c1_events.recv().await.unwrap() {
        ClientEvent::Clarification(req) => req.id,
        other => panic!("expected clarification, got {other:?}"),
    };
    let r2 = match c2_events.recv().await.unwrap() {
        ClientEvent::Clarification(req) => req.id,
        other => panic!("expected clarification, got {other:?}"),
    };
    let mut ids = vec![r1, r2];
    ids.sort();
    assert_eq!(ids, vec!["q1".to_string(), "q2".to_string()]);

    shutdown.cancel();
}

/// With no consumer registered, the producer gets an error response within
/// 200ms.
#[tokio::test]
async fn no_consumer_available_reports_error_promptly() {
    let port = next_port();
    let shutdown = spawn_broker(port).await;

    let (p1, _p1_events) = producer(port, "p1").await;
    p1.send_clarification(clarification("q1", "anyone?", Urgency::Low, 1000)).unwrap();

    let result =
        tokio::time::timeout(std::time::Duration::from_millis(200), p1.await_reply("q1", 200)).await.unwrap();
    let err = result.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("no cli clients available"), "got: {err}");

    shutdown.cancel();
}

/// Three yaps sent out of timestamp order within the debounce window arrive
/// at the consumer re-sorted by timestamp.
#[tokio::test]
async fn yaps_within_a_burst_arrive_reordered_by_timestamp() {
    let port = next_port();
    let shutdown = spawn_broker(port).await;

    let (c1, mut c1_events) = consumer(port, "c1").await;
    let (p1, _p1_events) = producer(port, "p1").await;

    p1.send_yap(yap("y1", "first", 1000)).unwrap();
    p1.send_yap(yap("y2", "second", 1005)).unwrap();
    p1.send_yap(yap("y3", "third", 1003)).unwrap();

    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(500);
    let mut order = Vec::new();
    while order.len() < 3 {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = tokio::time::timeout(remaining, c1_events.recv())
            .await
            .expect("yaps delivered within 500ms")
            .unwrap();
        if let ClientEvent::Yap(y) = event {
            order.push(y.timestamp);
        }
    }
    assert_eq!(order, vec![1000, 1003, 1005]);

    drop(c1);
    shutdown.cancel();
}

/// A producer with an outstanding request disconnects; the consumer
/// receives a synthetic timeout delivery for the same request id.
#[tokio::test]
async fn producer_disconnect_delivers_timeout_to_consumer() {
    let port = next_port();
    let shutdown = spawn_broker(port).await;

    let (c1, mut c1_events) = consumer(port, "c1").await;
    let (p1, _p1_events) = producer(port, "p1").await;

    p1.send_clarification(clarification("q1", "q1?", Urgency::Low, 1000)).unwrap();
    let req = match c1_events.recv().await.unwrap() {
        ClientEvent::Clarification(req) => req,
        other => panic!("expected clarification, got {other:?}"),
    };
    assert_eq!(req.id, "q1");
    assert_eq!(req.status, ClarificationStatus::Active);

    p1.shutdown();
    drop(p1);

    let timeout_event = loop {
        match c1_events.recv().await.unwrap() {
            ClientEvent::Clarification(req) if req.status == ClarificationStatus::Timeout => break req,
            ClientEvent::Clarification(_) => continue,
            other => panic!("unexpected event while waiting for timeout delivery: {other:?}"),
        }
    };
    assert_eq!(timeout_event.id, "q1");

    drop(c1);
    shutdown.cancel();
}
