//! Unit tests for the default error classifier

#[cfg(test)]
mod tests {
    use crate::{DefaultErrorClassifier, Error, ErrorCategory, ErrorClassifier, ErrorCode};
    use anyhow::anyhow;

    fn classify(error: anyhow::Error) -> crate::ErrorInfo {
        DefaultErrorClassifier::new().classify(&error)
    }

    #[test]
    fn test_typed_protocol_error_keeps_code() {
        let info = classify(Error::tool_not_found("reviews").into());
        assert_eq!(info.code, ErrorCode::ToolNotFound);
        assert_eq!(info.category, ErrorCategory::NotFound);
        assert!(!info.retryable);
    }

    #[test]
    fn test_rate_limit_messages() {
        for message in ["Rate limit exceeded", "HTTP 429 Too Many Requests", "request throttled"] {
            let info = classify(anyhow!(message.to_string()));
            assert_eq!(info.category, ErrorCategory::RateLimiting, "{message}");
            assert_eq!(info.code, ErrorCode::RateLimitExceeded);
            assert!(info.retryable);
        }
    }

    #[test]
    fn test_network_messages() {
        for message in ["connect ECONNREFUSED 127.0.0.1:443", "request timed out", "getaddrinfo ENOTFOUND api.example.com"] {
            let info = classify(anyhow!(message.to_string()));
            assert_eq!(info.category, ErrorCategory::Network, "{message}");
            assert!(info.retryable);
        }
    }

    #[test]
    fn test_io_errors_are_network() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let info = classify(anyhow::Error::new(io).context("fetching app details"));
        assert_eq!(info.category, ErrorCategory::Network);
        assert_eq!(info.code, ErrorCode::UpstreamUnavailable);
    }

    #[test]
    fn test_not_found_messages() {
        let info = classify(anyhow!("App not found: com.example"));
        assert_eq!(info.category, ErrorCategory::NotFound);
        assert!(!info.retryable);
    }

    #[test]
    fn test_validation_messages() {
        let info = classify(anyhow!("appId is required"));
        assert_eq!(info.category, ErrorCategory::Validation);
        assert_eq!(info.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn test_cause_chain_is_inspected() {
        let error = anyhow!("too many requests").context("fetching reviews");
        let info = classify(error);
        assert_eq!(info.category, ErrorCategory::RateLimiting);
        assert_eq!(info.message, "fetching reviews");
    }

    #[test]
    fn test_unknown_messages_are_internal() {
        let info = classify(anyhow!("something odd happened"));
        assert_eq!(info.category, ErrorCategory::Internal);
        assert_eq!(info.code, ErrorCode::InternalError);
        assert!(!info.retryable);
        assert!(info.correlation_id.is_none());
    }
}
