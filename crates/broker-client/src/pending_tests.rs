use super::*;

#[tokio::test]
async fn resolve_delivers_to_registered_slot() {
    let pending = PendingReplies::new();
    let rx = pending.register("r1".to_string());
    pending.resolve("r1", Ok("42".to_string()));
    assert_eq!(rx.await.unwrap().unwrap(), "42");
}

#[tokio::test]
async fn resolve_on_unknown_id_is_a_noop() {
    let pending = PendingReplies::new();
    pending.resolve("missing", Ok("x".to_string()));
}

#[tokio::test]
async fn reject_all_resolves_every_slot_with_the_same_error() {
    let pending = PendingReplies::new();
    let rx1 = pending.register("r1".to_string());
    let rx2 = pending.register("r2".to_string());
    pending.reject_all(ClientError::ConnectionLost);
    assert!(matches!(rx1.await.unwrap(), Err(ClientError::ConnectionLost)));
    assert!(matches!(rx2.await.unwrap(), Err(ClientError::ConnectionLost)));
}
