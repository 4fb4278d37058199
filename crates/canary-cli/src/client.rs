use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use canary_types::CanaryType;
use canary_types::api::{
    CanariesResponse, CanaryResponse, CanaryWithHistory, DeleteByNameResponse, LoginRequest,
    LoginResponse, NewCanaryRequest, RegisterRequest, ResetPasswordRequest, TriggerRecord,
    UpdateCanaryRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("you need to log in first")]
    NotLoggedIn,
    #[error("invalid credentials or expired session")]
    Unauthorized,
    #[error("canary not found")]
    NotFound,
    #[error("registration is disabled on this server")]
    RegistrationDisabled,
    #[error("username already registered")]
    UsernameTaken,
    #[error("the server rejected the request")]
    BadRequest,
    #[error("something went wrong on the server ({0})")]
    Server(StatusCode),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

struct Session {
    username: String,
    token: String,
}

/// Thin wrapper over the HTTP API that remembers the current session.
pub struct CanaryClient {
    http: Client,
    base: String,
    session: Option<Session>,
}

impl CanaryClient {
    pub fn new(base: &str) -> Self {
        Self {
            http: Client::new(),
            base: base.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.username.as_str())
    }

    pub fn trigger_url(&self, id: Uuid) -> String {
        format!("{}/trigger/{}", self.base, id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let session = self.session.as_ref().ok_or(ClientError::NotLoggedIn)?;
        Ok(builder.bearer_auth(&session.token))
    }

    // -- Account --

    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        send(self.http.post(self.url("/register")).json(&body)).await?;
        Ok(())
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = json(self.http.post(self.url("/login")).json(&body)).await?;
        self.session = Some(Session {
            username: username.to_string(),
            token: resp.token,
        });
        Ok(())
    }

    pub async fn reset_password(&self, password: &str) -> Result<()> {
        let body = ResetPasswordRequest {
            password: password.to_string(),
        };
        send(self.authed(self.http.post(self.url("/reset")))?.json(&body)).await?;
        Ok(())
    }

    /// Deletes the account and forgets the session.
    pub async fn delete_me(&mut self) -> Result<()> {
        send(self.authed(self.http.delete(self.url("/user")))?).await?;
        self.session = None;
        Ok(())
    }

    // -- Canaries --

    pub async fn new_canary(&self, name: &str, kind: CanaryType, redirect: &str) -> Result<CanaryResponse> {
        let body = NewCanaryRequest {
            name: name.to_string(),
            kind,
            redirect: redirect.to_string(),
        };
        json(self.authed(self.http.post(self.url("/canary/new")))?.json(&body)).await
    }

    pub async fn update_canary(&self, id: Uuid, name: &str, kind: CanaryType, redirect: &str) -> Result<()> {
        let body = UpdateCanaryRequest {
            id,
            name: name.to_string(),
            kind,
            redirect: redirect.to_string(),
        };
        send(self.authed(self.http.post(self.url("/canary/update")))?.json(&body)).await?;
        Ok(())
    }

    pub async fn delete_canary(&self, id: Uuid) -> Result<()> {
        let path = format!("/canary/{}", id);
        send(self.authed(self.http.delete(self.url(&path)))?).await?;
        Ok(())
    }

    pub async fn delete_by_name(&self, name: &str) -> Result<usize> {
        let req = self
            .authed(self.http.delete(self.url("/canary")))?
            .query(&[("name", name)]);
        let resp: DeleteByNameResponse = json(req).await?;
        Ok(resp.deleted)
    }

    pub async fn wipe(&self, id: Uuid) -> Result<()> {
        let path = format!("/canary/{}/wipe", id);
        send(self.authed(self.http.post(self.url(&path)))?).await?;
        Ok(())
    }

    pub async fn canary(&self, id: Uuid) -> Result<CanaryResponse> {
        let path = format!("/canary/{}", id);
        json(self.authed(self.http.get(self.url(&path)))?).await
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<TriggerRecord>> {
        let path = format!("/canary/{}/history", id);
        json(self.authed(self.http.get(self.url(&path)))?).await
    }

    pub async fn list(&self) -> Result<Vec<CanaryWithHistory>> {
        let resp: CanariesResponse = json(self.authed(self.http.get(self.url("/canary")))?).await?;
        Ok(resp.canaries)
    }
}

async fn send(builder: RequestBuilder) -> Result<Response> {
    let resp = builder.send().await?;
    match status_error(resp.status()) {
        Some(err) => Err(err),
        None => Ok(resp),
    }
}

async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
    Ok(send(builder).await?.json().await?)
}

fn status_error(status: StatusCode) -> Option<ClientError> {
    if status.is_success() || status.is_redirection() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::FORBIDDEN => ClientError::RegistrationDisabled,
        StatusCode::CONFLICT => ClientError::UsernameTaken,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::BadRequest,
        other => ClientError::Server(other),
    })
}
