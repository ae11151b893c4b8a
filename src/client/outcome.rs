use super::{context::SESSION_EXPIRED_MESSAGE, error::ClientError, gate::Route};

/// ViewOutcome
///
/// What a view action tells its screen to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    /// Done; show the confirmation.
    Success(String),
    /// Stay on the screen and show the message next to the form.
    InlineError(String),
    /// Leave the screen. Carries the notice for the destination, if any.
    Redirect { to: Route, message: Option<String> },
    /// Another action of this view is still in flight; nothing was sent.
    Busy,
    /// The response outlived its session and was ignored.
    Discarded,
}

impl ViewOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ViewOutcome::Success(_))
    }

    pub fn login_redirect() -> Self {
        ViewOutcome::Redirect {
            to: Route::Login,
            message: Some(SESSION_EXPIRED_MESSAGE.to_string()),
        }
    }
}

impl From<&ClientError> for ViewOutcome {
    fn from(error: &ClientError) -> Self {
        match error {
            ClientError::SessionExpired => ViewOutcome::login_redirect(),
            ClientError::Superseded => ViewOutcome::Discarded,
            ClientError::Busy => ViewOutcome::Busy,
            other => ViewOutcome::InlineError(other.user_message()),
        }
    }
}
