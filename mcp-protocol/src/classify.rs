//! Error classification into the category taxonomy
//!
//! Tool handlers and request handlers fail with `anyhow::Error`. Before such
//! a failure reaches a client it is classified into an [`ErrorInfo`], which
//! fixes its protocol code and retryable flag.

use crate::{Error, ErrorCategory, ErrorInfo};

/// Classifies arbitrary failures into the protocol error taxonomy
///
/// Injected into the dispatcher and the connection registry at construction.
pub trait ErrorClassifier: Send + Sync {
    /// Classify a failure. The returned info carries no correlation id.
    fn classify(&self, error: &anyhow::Error) -> ErrorInfo;
}

/// Message- and type-based classifier
///
/// Typed protocol errors keep their code. `std::io::Error`s are network
/// failures. Everything else is classified by matching its rendered message
/// (including the cause chain) against known fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorClassifier;

const RATE_LIMIT_HINTS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "429",
    "throttl",
    "quota exceeded",
];

const NETWORK_HINTS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection refused",
    "connection reset",
    "connection closed",
    "econnrefused",
    "econnreset",
    "enotfound",
    "etimedout",
    "unreachable",
    "dns",
    "socket hang up",
    "503",
    "502",
];

const NOT_FOUND_HINTS: &[&str] = &["not found", "404", "no such", "unknown tool", "does not exist"];

const VALIDATION_HINTS: &[&str] = &[
    "invalid",
    "required",
    "missing",
    "must be",
    "validation",
    "malformed",
    "expected",
    "400",
];

impl DefaultErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a bare message, without type information
    pub fn classify_message(&self, message: &str) -> ErrorCategory {
        let lowered = message.to_lowercase();
        let matches_any = |hints: &[&str]| hints.iter().any(|hint| lowered.contains(hint));

        if matches_any(RATE_LIMIT_HINTS) {
            ErrorCategory::RateLimiting
        } else if matches_any(NETWORK_HINTS) {
            ErrorCategory::Network
        } else if matches_any(NOT_FOUND_HINTS) {
            ErrorCategory::NotFound
        } else if matches_any(VALIDATION_HINTS) {
            ErrorCategory::Validation
        } else {
            ErrorCategory::Internal
        }
    }
}

impl ErrorClassifier for DefaultErrorClassifier {
    fn classify(&self, error: &anyhow::Error) -> ErrorInfo {
        if let Some(protocol) = error.downcast_ref::<Error>() {
            return ErrorInfo::from_code(protocol.code, protocol.message.clone());
        }

        if let Some(info) = error.downcast_ref::<ErrorInfo>() {
            return ErrorInfo {
                correlation_id: None,
                ..info.clone()
            };
        }

        let message = error.to_string();

        if error
            .chain()
            .any(|cause| cause.downcast_ref::<std::io::Error>().is_some())
        {
            return ErrorInfo::new(ErrorCategory::Network, message);
        }

        // `{:#}` renders the whole cause chain on one line
        let category = self.classify_message(&format!("{error:#}"));
        ErrorInfo::new(category, message)
    }
}
