//! Error kinds for the scrape pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The target page could not be loaded. Fatal for that URL only.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Browser launch or DevTools protocol failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// No consent control could be activated. Logged, never propagated out of the pipeline.
    #[error("Consent dismiss failed: {0}")]
    ConsentDismiss(String),

    /// Network or API failure talking to the language model
    #[error("External model error: {0}")]
    ExternalModel(String),

    /// Model reply not in the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ScrapeError {
    pub fn navigation(url: &str, reason: impl std::fmt::Display) -> Self {
        ScrapeError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn browser(reason: impl std::fmt::Display) -> Self {
        ScrapeError::Browser(reason.to_string())
    }

    pub fn model(reason: impl std::fmt::Display) -> Self {
        ScrapeError::ExternalModel(reason.to_string())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        ScrapeError::Config(msg.into())
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::ExternalModel(err.to_string())
    }
}
