use super::*;

#[test]
fn backoff_delay_doubles_from_the_configured_base() {
    let config = ClientConfig::new("p1", Role::Producer);
    assert_eq!(config.backoff_delay(0).as_millis(), 1_000);
    assert_eq!(config.backoff_delay(1).as_millis(), 2_000);
    assert_eq!(config.backoff_delay(3).as_millis(), 8_000);
}

#[test]
fn default_config_has_documented_values() {
    let config = ClientConfig::new("p1", Role::Producer);
    assert_eq!(config.port, 8765);
    assert_eq!(config.heartbeat_interval_ms, 5_000);
    assert_eq!(config.reconnect_delay_ms, 1_000);
    assert_eq!(config.max_reconnect_attempts, 10);
}
