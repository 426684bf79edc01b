//! Error taxonomy shared by the fetch-info and download paths.

use thiserror::Error;

/// Everything that can go wrong between pressing a button and the status label.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Rejected on the UI thread before any background work starts
    #[error("{0}")]
    Validation(String),
    /// Metadata extraction failed (network, unsupported site, private video, ...)
    #[error("failed to fetch video info: {0}")]
    Extraction(String),
    /// The download itself failed after formats were listed
    #[error("download failed: {0}")]
    Download(String),
    /// A format descriptor came back without a usable selector
    #[error("invalid format data: {0}")]
    InvalidFormatData(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Text placed in the status label when this error reaches the UI.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Extraction(msg)
            | AppError::Download(msg)
            | AppError::InvalidFormatData(msg) => format!("Error: {msg}"),
        }
    }
}
