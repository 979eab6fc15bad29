use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Reason a record log was found to have reset underneath a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// The file's inode changed (log rotation).
    Rotated,
    /// The file shrank in place (truncation).
    Truncated,
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetReason::Rotated => write!(f, "rotated"),
            ResetReason::Truncated => write!(f, "truncated"),
        }
    }
}

/// Error domain shared across the LATTICE core, responder, probe engine,
/// and analyzer crates. Per-packet drops (timeout/tag-mismatch/rate-limit)
/// are intentionally *not* represented as hard failures here: the probe
/// and responder loops count and log them directly rather than returning
/// an `Err`. This enum covers the errors that do need to propagate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("config invalid: {} field error(s)", .field_errors.len())]
    ConfigFields { field_errors: Vec<String> },

    #[error("secret missing or too short (need >= 16 bytes)")]
    SecretMissing,

    #[error("bind failed for path/endpoint {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("send failed for path/endpoint {0}: {1}")]
    SendFailed(String, std::io::Error),

    #[error("log file missing: {0}")]
    LogMissing(String),

    #[error("log reset detected: {0}")]
    LogReset(ResetReason),

    #[error("calibration invalid: {0}")]
    CalibrationInvalid(String),

    #[error("a calibration task is already running")]
    CalibrationRunning,

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigInvalid(e.to_string())
    }
}

impl Error {
    pub fn config_fields(field_errors: Vec<String>) -> Self {
        Self::ConfigFields { field_errors }
    }
}
