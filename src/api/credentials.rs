use crate::error::CredentialsError;
use serde::Deserialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::error;

/// Fields every service account key file must carry.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "type",
    "project_id",
    "private_key_id",
    "private_key",
    "client_email",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Parsed service account key file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Resolves relative paths against the current working directory.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Loads and validates a service account credentials file.
///
/// Checks, in order: the file exists, it can be opened, it can be read, it is
/// JSON, it has every field in [`REQUIRED_FIELDS`], and its `type` is
/// `service_account`.
///
/// # Errors
/// Returns the `CredentialsError` for the first check that fails.
pub fn load_service_account(path: &Path) -> Result<ServiceAccountKey, CredentialsError> {
    let path = resolve_path(path);
    let shown = path.display().to_string();

    if !path.exists() {
        error!(path = %shown, "Google Analytics credentials file not found");
        return Err(CredentialsError::FileNotFound(shown));
    }

    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            error!(path = %shown, "Google Analytics credentials file not readable");
            return Err(CredentialsError::FileNotReadable(shown));
        }
        Err(e) => {
            error!(path = %shown, error = %e, "Failed to read Google Analytics credentials file");
            return Err(CredentialsError::FailedToRead(shown));
        }
    };

    let mut contents = String::new();
    if let Err(e) = file.read_to_string(&mut contents) {
        error!(path = %shown, error = %e, "Failed to read Google Analytics credentials file");
        return Err(CredentialsError::FailedToRead(shown));
    }

    parse_service_account(&contents).map_err(|e| {
        error!(path = %shown, error = %e, "Invalid Google Analytics credentials file");
        e
    })
}

/// Validates credentials JSON already in memory.
pub fn parse_service_account(contents: &str) -> Result<ServiceAccountKey, CredentialsError> {
    let json: serde_json::Value =
        serde_json::from_str(contents).map_err(|e| CredentialsError::InvalidJson(e.to_string()))?;

    for field in REQUIRED_FIELDS {
        if json.get(field).map_or(true, serde_json::Value::is_null) {
            return Err(CredentialsError::MissingRequiredField(field.to_string()));
        }
    }

    if json.get("type").and_then(serde_json::Value::as_str) != Some("service_account") {
        return Err(CredentialsError::InvalidFormat);
    }

    serde_json::from_value(json).map_err(|_| CredentialsError::InvalidFormat)
}
