//! Domain errors surfaced to the user.
//!
//! Plumbing failures (I/O, config) travel as `anyhow::Error`; the variants
//! here are the ones that pick a user-facing message.

use thiserror::Error;

pub type TallyResult<T> = Result<T, TallyError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("{0}")]
    Validation(String),

    #[error("stored task list is not valid JSON: {0}")]
    StorageParse(String),

    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Transport(String),

    #[error("Invalid response format: {0}")]
    Format(String),
}

impl TallyError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_))
    }

    /// Picks the banner text for a failed remote call, falling back to
    /// `default_message` when nothing more specific applies.
    pub fn user_message(&self, default_message: &str) -> String {
        match self {
            Self::Transport(_) => "Network error: Unable to connect to API. \
                                   Please check your internet connection."
                .to_string(),
            Self::Http { status: 404 } => {
                "API endpoint not found. Please try again later.".to_string()
            }
            Self::Http { status: 500 } => {
                "Server error: API is temporarily unavailable. Please try again later."
                    .to_string()
            }
            Self::Http { status: 429 } => {
                "Too many requests. Please wait a moment before trying again.".to_string()
            }
            Self::Http { status: 403 } => {
                "Access denied. Please check your API permissions.".to_string()
            }
            Self::Format(_) => {
                "API returned invalid data format. Please try again later.".to_string()
            }
            Self::Validation(message) => message.clone(),
            Self::Http { .. } | Self::StorageParse(_) => default_message.to_string(),
        }
    }
}

impl From<reqwest::Error> for TallyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}
