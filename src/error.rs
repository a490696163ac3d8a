use thiserror::Error;

/// Failures from the content repository, shared by all read/write paths.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("content repository unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("content repository returned an unreadable response: {0}")]
    Decode(reqwest::Error),
    #[error("content repository rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RepoError {
    /// True when the repository refused the request for credential reasons.
    pub fn is_auth(&self) -> bool {
        matches!(self, RepoError::Rejected { status: 401 | 403, .. })
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("name and comment text must not be empty")]
    InvalidInput,
    #[error("a submission is already in progress")]
    InFlight,
    #[error("comment was not posted, verify the write API key is configured: {0}")]
    WriteRejected(RepoError),
    #[error("comment was not posted: {0}")]
    Create(RepoError),
    #[error("comment was posted but the comment list could not be refreshed: {0}")]
    Refresh(RepoError),
}
