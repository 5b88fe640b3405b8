//! Unit tests for mcp-logging lib module

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_logging_error_config() {
        let error = LoggingError::Config("Invalid log level".to_string());
        assert_eq!(error.to_string(), "Configuration error: Invalid log level");

        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("Config"));
        assert!(debug_str.contains("Invalid log level"));
    }

    #[test]
    fn test_logging_error_tracing() {
        let error = LoggingError::Tracing("subscriber already set".to_string());
        assert_eq!(error.to_string(), "Tracing error: subscriber already set");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("COMPACT".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(LoggingError::Config(_))
        ));
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_logging_config_deserialization() {
        let config: LoggingConfig =
            serde_json::from_value(serde_json::json!({"level": "debug", "format": "json"}))
                .unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_second_initialization_is_an_error() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        };
        // Whichever test installs first wins; a second install must fail cleanly.
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(LoggingError::Tracing(_))
        ));
    }
}
