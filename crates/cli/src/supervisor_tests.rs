use super::*;

fn config(port: u16) -> BrokerConfig {
    let mut config = BrokerConfig::default();
    config.port = port;
    config.host = "127.0.0.1".to_string();
    config
}

#[tokio::test]
async fn spawns_and_owns_when_nothing_is_listening() {
    let owner = ensure_broker(config(19401)).await.unwrap();
    assert!(matches!(owner, Ownership::Owner(_)));
    if let Ownership::Owner(handle) = owner {
        handle.stop().await;
    }
}

#[tokio::test]
async fn attaches_without_owning_when_a_broker_is_already_listening() {
    let cfg = config(19402);
    let owner = ensure_broker(cfg.clone()).await.unwrap();
    let Ownership::Owner(first) = owner else {
        panic!("expected the first caller to become the owner");
    };

    let second = ensure_broker(cfg).await.unwrap();
    assert!(matches!(second, Ownership::Attached));

    first.stop().await;
}

#[tokio::test]
async fn reuses_the_port_after_the_owner_stops() {
    let cfg = config(19403);
    let Ownership::Owner(first) = ensure_broker(cfg.clone()).await.unwrap() else {
        panic!("expected ownership");
    };
    first.stop().await;

    let second = ensure_broker(cfg).await.unwrap();
    assert!(matches!(second, Ownership::Owner(_)));
    if let Ownership::Owner(handle) = second {
        handle.stop().await;
    }
}
