#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request was aborted")]
    Aborted,
    #[error("network request failed: {message}")]
    Network { message: String },
    #[error("HTTP {status}")]
    Status { status: u16 },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("site config is not valid JSON: {message}")]
    Decode { message: String },
    #[error("site config field `{field}` must not be empty")]
    EmptyField { field: &'static str },
    #[error("site config field `{field}` must be greater than zero")]
    ZeroField { field: &'static str },
}
