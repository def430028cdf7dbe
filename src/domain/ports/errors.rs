use thiserror::Error;

/// Page extraction errors
///
/// None of these reach the session. A page that closed mid-extraction drops
/// the navigation; any other failure contributes zero observations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Page was closed before extraction finished")]
    PageClosed,

    #[error("Extraction failed: {0}")]
    Failed(String),
}
