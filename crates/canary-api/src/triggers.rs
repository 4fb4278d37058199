use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use uuid::Uuid;

use canary_core::{CoreError, TriggerMetadata, Triggered};
use canary_types::CanaryType;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// A 1x1 cyan PNG.
const PIXEL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+P+/HgAFhAJ/wlseKgAAAABJRU5ErkJggg==";

const DECOY_TEXT: &str = "This is a test page.";

/// GET /trigger/{id}, public. Records the hit, then serves the decoy.
pub async fn trigger(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    // A malformed id is just another unknown canary
    let id = Uuid::parse_str(&id).map_err(|_| CoreError::NotFound)?;

    let metadata = TriggerMetadata {
        ip: req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default(),
        user_agent: header_text(req.headers(), header::USER_AGENT),
        accept_language: header_text(req.headers(), header::ACCEPT_LANGUAGE),
    };

    let triggered = blocking(move || state.core.triggers().trigger(id, &metadata)).await?;

    render(triggered)
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn render(triggered: Triggered) -> Result<Response, ApiError> {
    let response = match triggered.kind {
        CanaryType::Image => {
            let pixel = B64
                .decode(PIXEL_PNG)
                .map_err(|e| CoreError::from(anyhow::anyhow!("Corrupt pixel constant: {}", e)))?;
            ([(header::CONTENT_TYPE, "image/png")], pixel).into_response()
        }
        CanaryType::Text => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], DECOY_TEXT).into_response(),
        CanaryType::Redirect => {
            let location = HeaderValue::from_str(&triggered.redirect).map_err(|e| {
                CoreError::from(anyhow::anyhow!("Unusable redirect target '{}': {}", triggered.redirect, e))
            })?;
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
    };
    Ok(response)
}
