use super::*;

#[test]
fn default_config_has_documented_values() {
    let config = BrokerConfig::default();
    assert_eq!(config.port, 8765);
    assert_eq!(config.max_clarification_queue, 10);
    assert_eq!(config.yap_buffer_ms, 200);
    assert_eq!(config.heartbeat_secs, 5);
    assert_eq!(config.client_timeout_secs, 15);
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_timeout_not_greater_than_heartbeat() {
    let mut config = BrokerConfig::default();
    config.client_timeout_secs = config.heartbeat_secs;
    assert!(config.validate().is_err());
}

#[test]
fn rejects_zero_queue_capacity() {
    let mut config = BrokerConfig::default();
    config.max_clarification_queue = 0;
    assert!(config.validate().is_err());
}
