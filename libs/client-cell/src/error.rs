use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Selecione um perfil antes de entrar")]
    ProfileNotSelected,

    #[error("Sessão não iniciada")]
    NotLoggedIn,

    #[error("{0}")]
    Validation(String),

    /// Non-2xx answer; `message` is the server's `message` field, if any.
    #[error("API error ({status}): {message:?}")]
    Api { status: u16, message: Option<String> },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<shared_models::error::AppError> for ClientError {
    fn from(err: shared_models::error::AppError) -> Self {
        ClientError::Validation(err.message().to_string())
    }
}
