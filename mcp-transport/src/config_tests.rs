//! Unit tests for SSE transport configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use crate::TransportError;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = SseConfig::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(config.auto_initialize);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.initialization_timeout_ms, 10_000);
        assert_eq!(config.max_connections, 100);
        assert!(config.idle_timeout_secs.is_none());
        assert!(config.enable_cors);
        assert_eq!(config.max_message_size, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers() {
        let config = SseConfig {
            heartbeat_interval_ms: 1_500,
            initialization_timeout_ms: 250,
            idle_timeout_secs: Some(90),
            ..Default::default()
        };

        assert_eq!(config.heartbeat_interval(), Duration::from_millis(1_500));
        assert_eq!(config.initialization_timeout(), Duration::from_millis(250));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(SseConfig::default().idle_timeout(), None);
    }

    #[test]
    fn test_builder_methods() {
        let config = SseConfig::default()
            .with_host("0.0.0.0")
            .with_port(8080)
            .with_max_connections(2)
            .with_auto_initialize(false);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_connections, 2);
        assert!(!config.auto_initialize);
        assert_eq!(
            config.bind_address().unwrap().to_string(),
            "0.0.0.0:8080"
        );
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let cases = vec![
            SseConfig {
                heartbeat_interval_ms: 0,
                ..Default::default()
            },
            SseConfig {
                initialization_timeout_ms: 0,
                ..Default::default()
            },
            SseConfig {
                max_connections: 0,
                ..Default::default()
            },
            SseConfig {
                idle_timeout_secs: Some(0),
                ..Default::default()
            },
            SseConfig {
                max_message_size: 0,
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(TransportError::Config(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validation_rejects_bad_host() {
        let config = SseConfig::default().with_host("not a host");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid address"));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: SseConfig = serde_json::from_value(serde_json::json!({
            "port": 9000,
            "auto_initialize": false,
            "idle_timeout_secs": 300
        }))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert!(!config.auto_initialize);
        assert_eq!(config.idle_timeout_secs, Some(300));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.max_connections, 100);
    }
}
