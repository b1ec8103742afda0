#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[cfg(feature = "http")]
    #[error("API error ({status}) on {path}: {detail}")]
    Api {
        path: String,
        status: u16,
        detail: String,
    },
}
