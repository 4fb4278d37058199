use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, Uri},
    response::IntoResponse,
};
use uuid::Uuid;

use canary_types::CanaryType;
use canary_types::api::{
    CanariesResponse, CanaryResponse, CanaryWithHistory, DeleteByNameQuery, DeleteByNameResponse,
    NewCanaryRequest, TriggerRecord, UpdateCanaryRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::BearerToken;

fn validate(name: &str, kind: CanaryType, redirect: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::BadRequest("canary name is required"));
    }
    if kind == CanaryType::Redirect {
        if redirect.is_empty() {
            return Err(ApiError::BadRequest("redirect canaries need a target"));
        }
        if !is_redirect_target(redirect) {
            return Err(ApiError::BadRequest("redirect target must be an absolute http(s) url"));
        }
    }
    Ok(())
}

/// The target ends up verbatim in a Location header.
fn is_redirect_target(target: &str) -> bool {
    if HeaderValue::from_str(target).is_err() {
        return false;
    }
    match target.parse::<Uri>() {
        Ok(uri) => {
            matches!(uri.scheme_str(), Some("http" | "https")) && uri.host().is_some()
        }
        Err(_) => false,
    }
}

pub async fn new_canary(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(req): Json<NewCanaryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req.name, req.kind, &req.redirect)?;

    let canary = blocking(move || {
        state
            .core
            .canaries()
            .add(&token, &req.name, req.kind, &req.redirect)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CanaryResponse::from(canary))))
}

/// All of the caller's canaries, each with its trigger history.
pub async fn get_canaries(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    let canaries = blocking(move || {
        let service = state.core.canaries();
        let mut canaries = Vec::new();
        for canary in service.list(&token)? {
            let history = service
                .history(&token, canary.id)?
                .into_iter()
                .map(TriggerRecord::from)
                .collect();
            canaries.push(CanaryWithHistory {
                canary: canary.into(),
                history,
            });
        }
        Ok(canaries)
    })
    .await?;

    Ok(Json(CanariesResponse { canaries }))
}

pub async fn get_canary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    let canary = blocking(move || state.core.canaries().get(&token, id)).await?;

    Ok(Json(CanaryResponse::from(canary)))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    let events = blocking(move || state.core.canaries().history(&token, id)).await?;

    let history: Vec<TriggerRecord> = events.into_iter().map(TriggerRecord::from).collect();
    Ok(Json(history))
}

pub async fn update_canary(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(req): Json<UpdateCanaryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req.name, req.kind, &req.redirect)?;

    blocking(move || {
        state
            .core
            .canaries()
            .update(&token, req.id, &req.name, req.kind, &req.redirect)
    })
    .await?;

    Ok(StatusCode::OK)
}

pub async fn delete_canary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || state.core.canaries().delete_by_id(&token, id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_canaries_by_name(
    State(state): State<AppState>,
    Query(query): Query<DeleteByNameQuery>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = blocking(move || state.core.canaries().delete_by_name(&token, &query.name)).await?;

    Ok(Json(DeleteByNameResponse { deleted }))
}

pub async fn wipe_canary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || state.core.canaries().wipe(&token, id)).await?;

    Ok(StatusCode::NO_CONTENT)
}
