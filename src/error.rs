use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Seats unavailable: {conflicting_seats:?}")]
    Availability { conflicting_seats: Vec<Uuid> },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Deadline passed: {0}")]
    Expired(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl BookingError {
    /// Conflicting seat ids carried by an availability failure, if any.
    pub fn conflicting_seats(&self) -> &[Uuid] {
        match self {
            BookingError::Availability { conflicting_seats } => conflicting_seats,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
