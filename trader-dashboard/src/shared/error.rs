use thiserror::Error;
use tracing::warn;

/// Failure of a single request/response read call.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {code} {reason}")]
    Status { code: u16, reason: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidUrl(value.to_string())
    }
}

/// Invalid dashboard configuration.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid url: {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("unsupported backend url scheme: {0} (expected http or https)")]
    UnsupportedScheme(String),
}

/// Degrade a failed read call to the empty value of its type.
///
/// Each read in a batch fails on its own: the error is logged and replaced
/// with `T::default()` so the other sections still render.
pub trait OrDefault<T> {
    fn or_default_logged(self, call: &'static str) -> T;
}

impl<T> OrDefault<T> for Result<T, FetchError>
where
    T: Default,
{
    fn or_default_logged(self, call: &'static str) -> T {
        match self {
            Ok(value) => value,
            Err(error) => {
                warn!(call, %error, "read call failed, rendering empty value");
                T::default()
            }
        }
    }
}
