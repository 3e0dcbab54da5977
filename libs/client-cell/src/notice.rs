use serde::Serialize;

use crate::error::ClientError;

pub const FALLBACK_ERROR: &str = "Ocorreu um erro. Tente novamente.";

/// Toast shown after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Notice::Success(text.into())
    }

    pub fn text(&self) -> &str {
        match self {
            Notice::Success(text) | Notice::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl From<&ClientError> for Notice {
    fn from(err: &ClientError) -> Self {
        let text = match err {
            ClientError::Api { message: Some(message), .. } if !message.trim().is_empty() => message.clone(),
            ClientError::Validation(message) => message.clone(),
            ClientError::ProfileNotSelected | ClientError::NotLoggedIn => err.to_string(),
            _ => FALLBACK_ERROR.to_string(),
        };
        Notice::Error(text)
    }
}
