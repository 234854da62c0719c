use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Enhancement server returned {status} for {url}")]
    HttpStatusError {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("TOML error: {message}")]
    TomlError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration for {field} = '{value}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Runtime error: {message}")]
    RuntimeError { message: String },

    #[error("Enhancement cancelled")]
    Cancelled,
}

impl EnhanceError {
    /// 設定錯誤在送出請求前就能被偵測到
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EnhanceError::MissingConfigError { .. } | EnhanceError::InvalidConfigValueError { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EnhanceError>;
