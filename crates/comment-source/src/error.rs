use thiserror::Error;

/// Errors raised by a remote comment source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The API answered with a non-zero business code (throttling, risk control, ...).
    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },
    /// The API answered with a non-success HTTP status.
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl SourceError {
    /// Bilibili code for "request blocked by risk control".
    pub const CODE_RISK_CONTROL: i64 = -352;
    /// Bilibili code for "request intercepted / too frequent".
    pub const CODE_THROTTLED: i64 = -412;

    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Whether another account may succeed where this one failed.
    ///
    /// API-level rejections and HTTP status failures are tied to the account
    /// (or its quota) and rotate to the next credential. Transport and decoding
    /// failures are not account-specific and propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Status(_))
    }

    /// Whether the remote side signalled throttling explicitly.
    pub fn is_throttled(&self) -> bool {
        match self {
            Self::Api { code, .. } => {
                *code == Self::CODE_THROTTLED || *code == Self::CODE_RISK_CONTROL
            }
            Self::Status(status) => *status == 412 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
