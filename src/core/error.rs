use thiserror::Error;

/// Failures a ratio request can end in.
///
/// The variant, not the message, decides how a caller reports it: the first
/// two are caller mistakes, the rest are data or provider problems.
#[derive(Debug, Error)]
pub enum RatioError {
    #[error("start_date and ticker are required")]
    MissingParameters,
    #[error("start_date must be a date in YYYY-MM-DD format, got: {0}")]
    InvalidStartDate(String),
    #[error("Finance data could not be fetched")]
    DataUnavailable,
    #[error("{0:#}")]
    Upstream(anyhow::Error),
}

impl RatioError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RatioError::MissingParameters | RatioError::InvalidStartDate(_)
        )
    }
}
