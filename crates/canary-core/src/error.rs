/// Every failure a core operation can report to its caller.
///
/// `SomethingWentWrong` carries the underlying store or internal error for
/// logging, but its `Display` never includes it.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("not allowed")]
    NotAllowed,
    #[error("not found")]
    NotFound,
    #[error("registration is disabled")]
    RegistrationDisabled,
    #[error("username is already registered")]
    UsernameAlreadyRegistered,
    #[error("something went wrong")]
    SomethingWentWrong(anyhow::Error),
}

impl CoreError {
    /// Internal detail behind `SomethingWentWrong`, for logs only.
    pub fn detail(&self) -> Option<&anyhow::Error> {
        match self {
            Self::SomethingWentWrong(e) => Some(e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(e: anyhow::Error) -> Self {
        Self::SomethingWentWrong(e)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
