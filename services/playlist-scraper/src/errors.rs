//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion
//! for errors the scraper uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("authentication expired: {0} (refresh CHOSIC_NONCE)")]
    AuthExpired(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl ScraperError {
    /// Errors that end a playlist run early but leave collected records valid
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ScraperError::AuthExpired(_))
    }
}

impl From<reqwest::Error> for ScraperError {
    fn from(e: reqwest::Error) -> Self { ScraperError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ScraperError {
    fn from(e: serde_json::Error) -> Self { ScraperError::Parse(e.to_string()) }
}

impl From<tempfile::PersistError> for ScraperError {
    fn from(e: tempfile::PersistError) -> Self { ScraperError::Io(e.error) }
}
