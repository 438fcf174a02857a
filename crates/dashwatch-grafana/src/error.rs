use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Invalid Grafana URL: {0}")]
    InvalidUrl(String),

    #[error("Request to Grafana API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(
        "Unexpected status code returned from Grafana API (got: {status}, expected: 200, msg: {message})"
    )]
    UnexpectedStatus { status: u16, message: String },
}

impl DashboardError {
    /// HTTP status of a rejected request, if the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
