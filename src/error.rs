//! User-facing failures
//!
//! Anything that is not a [`UserWarning`] is fatal and travels as a plain
//! `anyhow::Error` to the host.

use thiserror::Error;

/// An abort whose message is shown to the operator verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UserWarning {
    message: String,
}

impl UserWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn missing_argument(name: &str) -> Self {
        Self::new(format!("Missing required argument: {}", name))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Find the user-facing part of an error chain, if any
pub fn user_warning(err: &anyhow::Error) -> Option<&UserWarning> {
    err.downcast_ref::<UserWarning>()
}
