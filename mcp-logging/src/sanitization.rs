//! Log sanitization
//!
//! Tool arguments routinely carry provider credentials (API keys, bearer
//! tokens). Everything that reaches a log line passes through a
//! [`LogSanitizer`] first.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static PASSWORD_REGEX: OnceLock<Regex> = OnceLock::new();
static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
static API_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn password_regex() -> &'static Regex {
    PASSWORD_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)(["']?)(password|passwd|pwd|pass|secret)(["']?)[\s]*[=:][\s]*["`']?([^'"`\s,}]+)"#,
        )
        .expect("Invalid password regex")
    })
}

fn token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(?:(["']?)(token)(["']?)[\s]*[=:][\s]*['"]?([a-zA-Z0-9._-]+)|(bearer)[\s]+([a-zA-Z0-9._-]+))"#)
            .expect("Invalid token regex")
    })
}

fn api_key_regex() -> &'static Regex {
    API_KEY_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)(["']?)(api[_-]?key|apikey|access[_-]?key)(["']?)[\s]*[=:][\s]*['"]?([a-zA-Z0-9._-]+)"#,
        )
        .expect("Invalid API key regex")
    })
}

/// Sanitization configuration
#[derive(Debug, Clone)]
pub struct SanitizationConfig {
    /// Enable sanitization
    pub enabled: bool,

    /// Replacement string for sensitive data
    pub replacement: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            replacement: "***".to_string(),
        }
    }
}

/// Log sanitizer for removing sensitive information
#[derive(Debug, Clone, Default)]
pub struct LogSanitizer {
    config: SanitizationConfig,
}

impl LogSanitizer {
    pub fn new() -> Self {
        Self::with_config(SanitizationConfig::default())
    }

    pub fn with_config(config: SanitizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SanitizationConfig {
        &self.config
    }

    /// Redact credential-looking `key=value` pairs and bearer tokens in free text
    pub fn sanitize(&self, message: &str) -> String {
        if !self.config.enabled {
            return message.to_string();
        }

        let replacement = self.config.replacement.as_str();
        let mut sanitized = message.to_string();

        for regex in [password_regex(), api_key_regex()] {
            sanitized = regex
                .replace_all(&sanitized, |caps: &regex::Captures| {
                    let full_match = &caps[0];
                    full_match.replace(&caps[4], replacement)
                })
                .to_string();
        }

        sanitized = token_regex()
            .replace_all(&sanitized, |caps: &regex::Captures| {
                let full_match = &caps[0];
                // Either the `token=value` or the `bearer value` alternative matched
                let value = caps.get(4).or_else(|| caps.get(6));
                match value {
                    Some(value) => full_match.replace(value.as_str(), replacement),
                    None => full_match.to_string(),
                }
            })
            .to_string();

        sanitized
    }

    /// Sanitize an error message for logging
    pub fn sanitize_error(&self, error: &dyn std::error::Error) -> String {
        self.sanitize(&error.to_string())
    }

    /// Redact sensitive fields of a structured value, recursively
    pub fn sanitize_value(&self, value: &Value) -> Value {
        if !self.config.enabled {
            return value.clone();
        }

        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, val)| {
                        let sanitized = if is_sensitive_field(key) {
                            Value::String(self.config.replacement.clone())
                        } else {
                            self.sanitize_value(val)
                        };
                        (key.clone(), sanitized)
                    })
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_value(v)).collect())
            }
            Value::String(text) => Value::String(self.sanitize(text)),
            other => other.clone(),
        }
    }
}

/// Check if a field name indicates sensitive data
fn is_sensitive_field(field: &str) -> bool {
    let lower = field.to_lowercase();
    matches!(lower.as_str(), "key" | "pwd" | "pass")
        || lower.contains("password")
        || lower.contains("passwd")
        || lower.contains("secret")
        || lower.contains("token")
        || lower.contains("api_key")
        || lower.contains("apikey")
        || lower.contains("auth")
        || lower.contains("credential")
        || lower.contains("private_key")
        || lower.contains("bearer")
}
