use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use canary_core::CanaryCore;
use canary_types::api::{LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest};

use crate::error::{ApiError, blocking};
use crate::middleware::BearerToken;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub core: CanaryCore,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("username and password are required"));
    }

    blocking(move || state.core.sessions().register(&req.username, &req.password)).await?;

    Ok(StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = blocking(move || state.core.sessions().login(&req.username, &req.password)).await?;

    Ok(Json(LoginResponse { token }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password is required"));
    }

    blocking(move || state.core.sessions().reset_password(&token, &req.password)).await?;

    Ok(StatusCode::OK)
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || state.core.sessions().delete_user(&token)).await?;

    Ok(StatusCode::NO_CONTENT)
}
