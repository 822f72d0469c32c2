//! Error types for finpulse operations.
//!
//! Every fallible operation in the pipeline returns [`PulseResult`]. Errors carry a
//! structured [`ErrorCode`] so the server layer can map them without string matching.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for finpulse operations.
pub type PulseResult<T> = Result<T, PulseError>;

/// Main error type for all finpulse operations.
#[derive(Error, Debug)]
pub enum PulseError {
    /// Input validation failed (malformed event payload, bad feedback rating, ...).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Entity not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        entity_id: Option<String>,
    },

    /// Reasoning collaborator call failed.
    #[error("Reasoning error: {message}")]
    Reasoning {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Expiring key/value store operation failed.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error or timeout.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rate limit exceeded by a collaborator.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        retry_after: Option<u64>,
    },

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidFormat,
    ValInvalidRating,

    // Entities (ENT_xxx)
    EntInterventionNotFound,

    // Reasoning (RSN_xxx)
    RsnConnectionFailed,
    RsnGenerationFailed,
    RsnInvalidResponse,
    RsnTimeout,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Cache (KV_xxx)
    KvConnectionFailed,
    KvOperationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Rate Limit (RATE_xxx)
    RateLimitExceeded,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidFormat => "VAL_003",
            ErrorCode::ValInvalidRating => "VAL_004",
            ErrorCode::EntInterventionNotFound => "ENT_001",
            ErrorCode::RsnConnectionFailed => "RSN_001",
            ErrorCode::RsnGenerationFailed => "RSN_002",
            ErrorCode::RsnInvalidResponse => "RSN_003",
            ErrorCode::RsnTimeout => "RSN_004",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::KvConnectionFailed => "KV_001",
            ErrorCode::KvOperationFailed => "KV_002",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::RateLimitExceeded => "RATE_001",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl PulseError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a not found error for an intervention.
    pub fn intervention_not_found(intervention_id: impl Into<String>) -> Self {
        let id = intervention_id.into();
        Self::NotFound {
            message: format!("Intervention with id '{}' not found", id),
            code: ErrorCode::EntInterventionNotFound,
            entity_id: Some(id),
        }
    }

    /// Create a reasoning collaborator error.
    pub fn reasoning(message: impl Into<String>) -> Self {
        Self::Reasoning {
            message: message.into(),
            code: ErrorCode::RsnGenerationFailed,
            source: None,
        }
    }

    /// Create a reasoning timeout error.
    pub fn reasoning_timeout(after_ms: u128) -> Self {
        Self::Reasoning {
            message: format!("Reasoning call timed out after {}ms", after_ms),
            code: ErrorCode::RsnTimeout,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a parse error for a missing required field.
    pub fn missing_field(field: &str) -> Self {
        Self::Parse {
            message: format!("Missing required field '{}'", field),
            code: ErrorCode::ParseMissingField,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a cache (expiring store) error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            code: ErrorCode::KvOperationFailed,
            source: None,
        }
    }

    /// Create a cache error for a store that could not be reached.
    pub fn cache_connection(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            code: ErrorCode::KvConnectionFailed,
            source: None,
        }
    }

    /// Create an API/network error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateLimitExceeded,
            retry_after: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Reasoning { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Cache { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the failure came from a collaborator that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Reasoning { .. } | Self::Network { .. } | Self::RateLimit { .. } | Self::Cache { .. }
        )
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("Please check the identifier and ensure it exists"),
            Self::RateLimit { .. } => Some("Please wait before making more requests"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Reasoning { .. } => Some("Please check your reasoning provider configuration"),
            _ => None,
        }
    }

    /// Convert from an HTTP status code returned by a collaborator.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::Reasoning {
                message: body.to_string(),
                code: ErrorCode::RsnInvalidResponse,
                source: None,
            },
            401 | 403 => Self::Configuration(format!("Collaborator rejected credentials: {}", body)),
            429 => Self::RateLimit {
                message: body.to_string(),
                code: ErrorCode::RateLimitExceeded,
                retry_after: None,
            },
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<rusqlite::Error> for PulseError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
