//! Generation collaborator errors

use thiserror::Error;

/// Errors from a step generator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// No API key in the environment, or generation disabled
    #[error("{provider}: Not configured (no API key)")]
    NotConfigured { provider: String },

    /// 401/403 - key invalid or lacking permissions
    #[error("{provider}: Unauthorized ({status})")]
    Unauthorized { provider: String, status: u16 },

    /// 429 Rate Limited
    #[error("{provider}: Rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Network or timeout error
    #[error("{provider}: Network error - {message}")]
    Network { provider: String, message: String },

    /// Other HTTP errors
    #[error("{provider}: HTTP {status} - {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// The reply did not contain data of the requested shape
    #[error("{provider}: Invalid response - {message}")]
    InvalidResponse { provider: String, message: String },

    /// The reply parsed but carried no usable content
    #[error("{provider}: Empty response")]
    Empty { provider: String },
}

impl GenerationError {
    pub fn not_configured(provider: impl Into<String>) -> Self {
        GenerationError::NotConfigured {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GenerationError::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn http(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        GenerationError::Http {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GenerationError::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn empty(provider: impl Into<String>) -> Self {
        GenerationError::Empty {
            provider: provider.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        match self {
            GenerationError::NotConfigured { provider }
            | GenerationError::Unauthorized { provider, .. }
            | GenerationError::RateLimited { provider, .. }
            | GenerationError::Network { provider, .. }
            | GenerationError::Http { provider, .. }
            | GenerationError::InvalidResponse { provider, .. }
            | GenerationError::Empty { provider } => provider,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, GenerationError::Unauthorized { .. })
    }

    /// Worth retrying: rate limits, network failures and 5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::RateLimited { .. } | GenerationError::Network { .. } => true,
            GenerationError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(" - retry after {secs}s"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::network("anthropic", "timeout").is_transient());
        assert!(GenerationError::http("anthropic", 529, "overloaded").is_transient());
        assert!(!GenerationError::http("anthropic", 400, "bad request").is_transient());
        assert!(!GenerationError::not_configured("anthropic").is_transient());
        assert!(!GenerationError::invalid("anthropic", "no json").is_transient());
    }

    #[test]
    fn test_auth_error() {
        let err = GenerationError::Unauthorized {
            provider: "anthropic".to_string(),
            status: 401,
        };
        assert!(err.is_auth_error());
        assert!(!err.is_transient());
        assert_eq!(err.provider_name(), "anthropic");
    }

    #[test]
    fn test_display() {
        let err = GenerationError::RateLimited {
            provider: "anthropic".to_string(),
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "anthropic: Rate limited - retry after 30s");

        let err = GenerationError::RateLimited {
            provider: "anthropic".to_string(),
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "anthropic: Rate limited");

        let err = GenerationError::not_configured("anthropic");
        assert_eq!(err.to_string(), "anthropic: Not configured (no API key)");
    }
}
