//! Error types shared across the analytics and admin clients.
//!
//! Validation failures (`ValidationError`, `InvalidPeriodError`) are raised at
//! construction time and never caught internally. Remote failures are wrapped
//! in `AnalyticsError` or `AdminApiError` with the original error kept as the
//! source.

use thiserror::Error;

/// Boxed error used as the `source` of wrapped remote failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Problems with the service account credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("Google Analytics credentials file not found at path: {0}")]
    FileNotFound(String),
    #[error("Google Analytics credentials file is not readable at path: {0}")]
    FileNotReadable(String),
    #[error("Failed to read Google Analytics credentials file at path: {0}")]
    FailedToRead(String),
    #[error("Google Analytics credentials file contains invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Google Analytics credentials file is missing required field: {0}")]
    MissingRequiredField(String),
    #[error(
        "Google Analytics credentials file has an invalid format. Please ensure you are using a service account credentials JSON file."
    )]
    InvalidFormat,
}

/// Failures raised by a remote API transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    /// Network or client construction error
    #[error("HTTP error: {0}")]
    Http(String),
    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
    /// Token acquisition failed
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Report execution failure. The remote error is kept as the source.
#[derive(Debug, Error)]
#[error("{message}: {source}")]
pub struct AnalyticsError {
    message: String,
    property_id: String,
    #[source]
    source: BoxError,
}

impl AnalyticsError {
    pub fn report(
        message: impl Into<String>,
        property_id: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        AnalyticsError {
            message: message.into(),
            property_id: property_id.into(),
            source: source.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn property_id(&self) -> &str {
        &self.property_id
    }
}

/// Admin API failure. The dimension variants are the specialised cases that
/// carry the offending parameter name.
#[derive(Debug, Error)]
pub enum AdminApiError {
    #[error("{message}: {source}")]
    Call {
        message: String,
        property_id: Option<String>,
        #[source]
        source: BoxError,
    },
    #[error("Custom dimension with parameterName \"{parameter_name}\" already exists")]
    DimensionAlreadyExists {
        parameter_name: String,
        property_id: Option<String>,
    },
    #[error("Custom dimension with parameterName \"{parameter_name}\" not found")]
    DimensionNotFound {
        parameter_name: String,
        property_id: Option<String>,
    },
}

impl AdminApiError {
    pub fn call(
        message: impl Into<String>,
        property_id: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        AdminApiError::Call {
            message: message.into(),
            property_id: Some(property_id.into()),
            source: source.into(),
        }
    }

    pub fn property_id(&self) -> Option<&str> {
        match self {
            AdminApiError::Call { property_id, .. }
            | AdminApiError::DimensionAlreadyExists { property_id, .. }
            | AdminApiError::DimensionNotFound { property_id, .. } => property_id.as_deref(),
        }
    }

    /// Parameter name for the dimension-specific variants.
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            AdminApiError::DimensionAlreadyExists { parameter_name, .. }
            | AdminApiError::DimensionNotFound { parameter_name, .. } => Some(parameter_name),
            _ => None,
        }
    }
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    errors: Vec<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, errors: Vec<String>) -> Self {
        ValidationError {
            message: message.into(),
            errors,
        }
    }

    /// Individual violation messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Start date cannot be after end date")]
pub struct InvalidPeriodError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Analytics client with key \"{key}\" does not exist in the registry.")]
pub struct ClientNotFoundError {
    pub key: String,
}

/// A metric value that does not parse as the number its header declares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot cast \"{value}\" to {type_tag}")]
pub struct TypeCastError {
    pub value: String,
    pub type_tag: String,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(String),
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Store(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Malformed filter definition handed to the custom report builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Filter definition must be an object")]
    NotAnObject,
    #[error("Filter group \"{0}\" must be a list of filter definitions")]
    InvalidGroup(String),
    #[error("Leaf filter is missing \"{0}\"")]
    MissingField(String),
    #[error("Unknown string match type: {0}")]
    UnknownMatchType(String),
    #[error("Invalid orderBy entry: {0}")]
    InvalidOrderBy(String),
}
