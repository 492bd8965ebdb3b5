use super::*;
use coop_broker::BrokerConfig;
use tokio_util::sync::CancellationToken;

async fn spawn_broker(port: u16) -> CancellationToken {
    let mut config = BrokerConfig::default();
    config.port = port;
    config.heartbeat_secs = 3600;
    config.client_timeout_secs = 7200;
    let shutdown = CancellationToken::new();
    let broker_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = coop_broker::run(config, broker_shutdown).await;
    });
    // give the listener a moment to bind before the first connect attempt.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown
}

fn producer_config(port: u16, id: &str) -> ClientConfig {
    let mut config = ClientConfig::new(id, Role::Producer);
    config.port = port;
    config
}

fn consumer_config(port: u16, id: &str) -> ClientConfig {
    let mut config = ClientConfig::new(id, Role::Consumer);
    config.port = port;
    config
}

#[tokio::test]
async fn connect_registers_and_receives_sync_event() {
    let shutdown = spawn_broker(19101).await;
    let (client, mut events) = BrokerClient::new(producer_config(19101, "p1"));
    client.connect().await.unwrap();
    assert_eq!(client.state(), ClientState::Connected);
    assert!(matches!(events.recv().await.unwrap(), ClientEvent::Sync));
    shutdown.cancel();
}

#[tokio::test]
async fn connect_fails_with_connection_refused_when_nothing_listens() {
    let (client, _events) = BrokerClient::new(producer_config(19102, "p1"));
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionRefused { .. }));
}

#[tokio::test]
async fn clarification_round_trips_through_both_client_libraries() {
    let shutdown = spawn_broker(19103).await;
    let (consumer, mut consumer_events) = BrokerClient::new(consumer_config(19103, "c1"));
    consumer.connect().await.unwrap();
    let _ = consumer_events.recv().await;

    let (producer, _producer_events) = BrokerClient::new(producer_config(19103, "p1"));
    producer.connect().await.unwrap();

    producer
        .send_clarification(ClarificationInput {
            id: "r1".to_string(),
            question: "red or blue?".to_string(),
            context: None,
            urgency: coop_broker::envelope::Urgency::Low,
            timestamp: coop_broker::envelope::epoch_ms(),
        })
        .unwrap();

    let event = consumer_events.recv().await.unwrap();
    let req = match event {
        ClientEvent::Clarification(req) => req,
        other => panic!("expected a clarification event, got {other:?}"),
    };
    assert_eq!(req.id, "r1");

    consumer.send_response("r1".to_string(), "blue".to_string()).unwrap();

    let answer = producer.await_reply("r1", 1_000).await.unwrap();
    assert_eq!(answer, "blue");

    shutdown.cancel();
}

#[tokio::test]
async fn await_reply_times_out_when_no_response_arrives() {
    let shutdown = spawn_broker(19104).await;
    let (consumer, mut consumer_events) = BrokerClient::new(consumer_config(19104, "c1"));
    consumer.connect().await.unwrap();
    let _ = consumer_events.recv().await;

    let (producer, _producer_events) = BrokerClient::new(producer_config(19104, "p1"));
    producer.connect().await.unwrap();

    producer
        .send_clarification(ClarificationInput {
            id: "r1".to_string(),
            question: "anyone?".to_string(),
            context: None,
            urgency: coop_broker::envelope::Urgency::Low,
            timestamp: coop_broker::envelope::epoch_ms(),
        })
        .unwrap();

    let err = producer.await_reply("r1", 50).await.unwrap_err();
    assert!(matches!(err, ClientError::ReplyTimeout));

    shutdown.cancel();
}

#[tokio::test]
async fn send_before_connect_fails_not_connected() {
    let (client, _events) = BrokerClient::new(producer_config(19105, "p1"));
    let err = client
        .send_clarification(ClarificationInput {
            id: "r1".to_string(),
            question: "q".to_string(),
            context: None,
            urgency: coop_broker::envelope::Urgency::Low,
            timestamp: coop_broker::envelope::epoch_ms(),
        })
        .unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}
