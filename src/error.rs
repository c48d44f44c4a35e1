//! Error types for a single poll cycle.
//!
//! Every failure is recovered at the scheduler boundary and reported to the
//! error sink once. The `Display` output of these types is the message the
//! sink shows to the user.

use thiserror::Error;

// ---

/// Failures while talking to the monitoring endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    // ---
    /// Connection refused, timeout, DNS failure or any other transport problem.
    #[error("Error while loading response: {0}")]
    Transport(String),

    /// The endpoint answered with something other than `200 OK`.
    #[error("Response status code should be 200 but got {0}")]
    BadStatus(u16),

    /// Body was not JSON, or did not match the expected entry schema.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Failures while turning a reading into display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    // ---
    /// Template references a `{field}` the rendered state does not provide.
    #[error("Unknown template field '{0}'")]
    UnknownField(String),

    /// Configuration value that cannot be applied, e.g. an unknown unit.
    #[error("{0}")]
    InvalidConfiguration(String),

    /// Unbalanced `{` / `}` in a template.
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),
}

/// Anything that can abort a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Flat classification of a [`PollError`], handy for sinks and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    BadStatus,
    MalformedResponse,
    UnknownField,
    InvalidConfiguration,
    MalformedTemplate,
}

impl PollError {
    pub fn kind(&self) -> ErrorKind {
        // ---
        match self {
            PollError::Fetch(FetchError::Transport(_)) => ErrorKind::Transport,
            PollError::Fetch(FetchError::BadStatus(_)) => ErrorKind::BadStatus,
            PollError::Fetch(FetchError::MalformedResponse(_)) => ErrorKind::MalformedResponse,
            PollError::Render(RenderError::UnknownField(_)) => ErrorKind::UnknownField,
            PollError::Render(RenderError::InvalidConfiguration(_)) => {
                ErrorKind::InvalidConfiguration
            }
            PollError::Render(RenderError::MalformedTemplate(_)) => ErrorKind::MalformedTemplate,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        // ---
        assert_eq!(
            FetchError::BadStatus(500).to_string(),
            "Response status code should be 200 but got 500"
        );
        assert_eq!(
            RenderError::InvalidConfiguration("Wrong measurement units".into()).to_string(),
            "Wrong measurement units"
        );
        assert_eq!(
            RenderError::UnknownField("bogus".into()).to_string(),
            "Unknown template field 'bogus'"
        );
    }

    #[test]
    fn test_poll_error_is_transparent() {
        // ---
        let err: PollError = FetchError::BadStatus(404).into();
        assert_eq!(err.to_string(), FetchError::BadStatus(404).to_string());
        assert_eq!(err.kind(), ErrorKind::BadStatus);

        let err: PollError = RenderError::UnknownField("x".into()).into();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
    }
}
