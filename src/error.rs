use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Invalid coordinate ({latitude}, {longitude}): {reason}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        reason: &'static str,
    },

    #[error("Invalid precision {0}, expected 0..=8")]
    InvalidPrecision(u8),

    #[error("Unknown user {0}")]
    UnknownUser(i64),

    #[error("Invalid search policy: {0}")]
    InvalidSearchPolicy(String),

    #[error("Invalid seed data: {0}")]
    InvalidSeedData(String),

    #[error("Play count of {subject} for user {user_id} would overflow")]
    PlayCountOverflow { user_id: i64, subject: String },

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl StreamError {
    /// Validation failures are terminal; storage failures leave no partial state
    /// behind, so the caller may retry them as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::Storage(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            StreamError::InvalidSubject(_) => "invalid_subject",
            StreamError::InvalidCoordinate { .. } => "invalid_coordinate",
            StreamError::InvalidPrecision(_) => "invalid_precision",
            StreamError::UnknownUser(_) => "unknown_user",
            StreamError::InvalidSearchPolicy(_) => "invalid_search_policy",
            StreamError::InvalidSeedData(_) => "invalid_seed_data",
            StreamError::PlayCountOverflow { .. } => "play_count_overflow",
            StreamError::Storage(_) => "storage_unavailable",
        }
    }

    pub fn is_validation(&self) -> bool {
        !self.is_retryable()
    }
}

pub type StreamResult<T> = std::result::Result<T, StreamError>;
