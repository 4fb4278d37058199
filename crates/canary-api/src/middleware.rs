use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

/// The raw bearer token of the current request. Whether it is valid is
/// decided by the core, not here.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Extract the bearer token from the Authorization header.
pub async fn require_auth(
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let TypedHeader(Authorization(bearer)) = auth.ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut()
        .insert(BearerToken(bearer.token().to_string()));
    Ok(next.run(req).await)
}
