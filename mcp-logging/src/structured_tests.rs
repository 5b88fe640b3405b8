//! Unit tests for structured logging

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct MockError {
        retryable: bool,
        connection: bool,
    }

    impl std::fmt::Display for MockError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "mock failure token=abc")
        }
    }

    impl std::error::Error for MockError {}

    impl ErrorClassification for MockError {
        fn error_type(&self) -> &str {
            "mock"
        }
        fn is_retryable(&self) -> bool {
            self.retryable
        }
        fn is_timeout(&self) -> bool {
            false
        }
        fn is_connection_error(&self) -> bool {
            self.connection
        }
    }

    #[test]
    fn test_context_creation() {
        let ctx = StructuredContext::new("tools/call")
            .with_tool("search_apps")
            .with_request_id(&json!("a"));

        assert_eq!(ctx.method, "tools/call");
        assert_eq!(ctx.tool_name.as_deref(), Some("search_apps"));
        assert_eq!(ctx.request_id.as_deref(), Some("a"));
        assert_eq!(ctx.correlation_id.len(), 32);
    }

    #[test]
    fn test_numeric_request_id_rendering() {
        let ctx = StructuredContext::new("tools/list").with_request_id(&json!(42));
        assert_eq!(ctx.request_id.as_deref(), Some("42"));

        let ctx = StructuredContext::new("tools/list").with_request_id(&json!(null));
        assert!(ctx.request_id.is_none());
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = StructuredContext::new("x");
        let b = StructuredContext::new("x");
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_error_class_from_error() {
        let network = MockError {
            retryable: true,
            connection: true,
        };
        assert!(matches!(
            ErrorClass::from_error(&network),
            ErrorClass::Network { timeout: false, .. }
        ));

        let server = MockError {
            retryable: true,
            connection: false,
        };
        assert!(matches!(
            ErrorClass::from_error(&server),
            ErrorClass::Server { retryable: true, .. }
        ));

        let client = MockError {
            retryable: false,
            connection: false,
        };
        assert_eq!(
            ErrorClass::from_error(&client),
            ErrorClass::Client {
                error_type: "mock".to_string(),
                retryable: false
            }
        );
    }

    #[test]
    fn test_logger_methods_do_not_panic_without_subscriber() {
        let logger = StructuredLogger::new("test");
        let ctx = StructuredContext::new("tools/call");

        logger.log_request_start(&ctx, &json!({"password": "x"}));
        logger.log_request_end::<MockError>(&ctx, None);
        logger.log_request_end(
            &ctx,
            Some(&MockError {
                retryable: false,
                connection: false,
            }),
        );
        logger.log_connection_event("conn-1", "opened", None);

        assert_eq!(logger.component(), "test");
    }

    #[derive(Clone, Default)]
    struct CapturedOutput(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_connection_span_tags_request_logs() {
        let captured = CapturedOutput::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _span = StructuredLogger::connection_span("conn-7").entered();
            let logger = StructuredLogger::new("dispatcher");
            let ctx = StructuredContext::new("tools/list");
            logger.log_request_end::<MockError>(&ctx, None);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("MCP request completed successfully"));
        assert!(output.contains("mcp_connection"));
        assert!(output.contains("connection_id=conn-7"));
    }
}
