use super::*;
use tokio::sync::mpsc;

fn new_session(id: &str, role: Role) -> Arc<Session> {
    let (tx, _rx) = mpsc::unbounded_channel();
    Session::new(id.to_string(), role, tx)
}

#[tokio::test]
async fn insert_then_get_round_trips() {
    let registry = Registry::new();
    registry.insert(new_session("c1", Role::Consumer)).await;
    assert!(registry.contains("c1").await);
    assert!(registry.get("c1").await.is_some());
    assert!(registry.get("missing").await.is_none());
}

#[tokio::test]
async fn consumer_sessions_excludes_producers() {
    let registry = Registry::new();
    registry.insert(new_session("p1", Role::Producer)).await;
    registry.insert(new_session("c1", Role::Consumer)).await;
    let consumers = registry.consumer_sessions().await;
    assert_eq!(consumers.len(), 1);
    assert_eq!(consumers[0].0, "c1");
}

#[tokio::test]
async fn remove_drops_session_from_lookup() {
    let registry = Registry::new();
    registry.insert(new_session("c1", Role::Consumer)).await;
    let removed = registry.remove("c1").await;
    assert!(removed.is_some());
    assert!(!registry.contains("c1").await);
}

#[tokio::test]
async fn stale_sessions_reports_sessions_past_timeout() {
    let registry = Registry::new();
    let session = new_session("c1", Role::Consumer);
    registry.insert(session.clone()).await;
    assert!(registry.stale_sessions(15).await.is_empty());
    session.touch();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let stale = registry.stale_sessions(0).await;
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].0, "c1");
}
