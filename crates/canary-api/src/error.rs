use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use canary_core::CoreError;
use tracing::{debug, error};

/// Handler failure. Responses carry only a status code; details go to the log.
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    BadRequest(&'static str),
}

impl ApiError {
    /// Missing and foreign canaries share 404 so ids can't be enumerated.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(CoreError::InvalidCredentials | CoreError::InvalidToken) => StatusCode::UNAUTHORIZED,
            Self::Core(CoreError::NotAllowed | CoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::Core(CoreError::RegistrationDisabled) => StatusCode::FORBIDDEN,
            Self::Core(CoreError::UsernameAlreadyRegistered) => StatusCode::CONFLICT,
            Self::Core(CoreError::SomethingWentWrong(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Core(e) => match e.detail() {
                Some(detail) => error!("Request failed: {:#}", detail),
                None => debug!("Request rejected: {}", e),
            },
            Self::BadRequest(reason) => debug!("Bad request: {}", reason),
        }
        self.status().into_response()
    }
}

/// Run a store-bound core call off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> canary_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Core(CoreError::from(anyhow::Error::new(e)))
        })?
        .map_err(ApiError::from)
}
