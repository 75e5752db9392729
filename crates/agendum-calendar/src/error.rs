use thiserror::Error;

/// Failure modes of the calendar backend. `AuthRequired` is a distinct
/// condition everywhere so callers can prompt re-authentication instead of
/// showing a generic error.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("authentication required")]
    AuthRequired,

    #[error("invalid event data: {0}")]
    Invalid(String),

    #[error("google calendar api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl CalendarError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, CalendarError::AuthRequired)
    }
}
