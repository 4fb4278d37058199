use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use canary_db::{Database, parse_timestamp};
use canary_types::User;
use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::convert::user_from_row;
use crate::error::{CoreError, Result};
use crate::password::Passwords;
use crate::secret::TokenSecret;
use crate::sweeper::{Sweeper, is_expired};

const ADMIN_PASSWORD_LEN: usize = 15;

/// Registration, login and the token → user choke point.
///
/// Owns the token secret and the expiry sweeper; both are torn down by
/// `shutdown`.
pub struct SessionManager {
    db: Arc<Database>,
    secret: TokenSecret,
    passwords: Passwords,
    expiration: Duration,
    registration_enabled: bool,
    sweeper: Mutex<Option<Sweeper>>,
}

impl SessionManager {
    /// Spawns the sweeper, so a tokio runtime must be running.
    pub fn new(db: Arc<Database>, settings: &Settings) -> anyhow::Result<Self> {
        let passwords = Passwords::new(settings.password_cost)?;
        let sweeper = Sweeper::spawn(db.clone(), settings.token_expiration, settings.sweep_interval);

        Ok(Self {
            db,
            secret: TokenSecret::generate(),
            passwords,
            expiration: settings.token_expiration,
            registration_enabled: settings.registration_enabled,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        if !self.registration_enabled {
            return Err(CoreError::RegistrationDisabled);
        }
        self.create_user(username, password)?;
        info!("Registered user '{}'", username);
        Ok(())
    }

    /// Creates `username` with a random password unless it already exists,
    /// ignoring the registration switch. Returns the password when created.
    pub fn bootstrap_admin(&self, username: &str) -> Result<Option<String>> {
        if self.db.get_user(username)?.is_some() {
            return Ok(None);
        }

        let password: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ADMIN_PASSWORD_LEN)
            .map(char::from)
            .collect();
        self.create_user(username, &password)?;
        Ok(Some(password))
    }

    fn create_user(&self, username: &str, password: &str) -> Result<()> {
        if self.db.get_user(username)?.is_some() {
            return Err(CoreError::UsernameAlreadyRegistered);
        }
        let hash = self.passwords.hash(password)?;
        self.db.create_user(username, &hash, Utc::now())?;
        Ok(())
    }

    /// Returns a fresh bearer token. No token is stored on failure.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self
            .db
            .get_user(username)?
            .ok_or(CoreError::InvalidCredentials)?;

        if !self.passwords.verify(password, &user.password) {
            debug!("Rejected login for '{}'", username);
            return Err(CoreError::InvalidCredentials);
        }

        let nonce = Uuid::new_v4().to_string();
        let token = self.secret.derive_token(&nonce, &user.username)?;
        self.db.insert_token(&token, &user.username, Utc::now())?;

        info!("User '{}' logged in", user.username);
        Ok(token)
    }

    /// Resolves a bearer token to its user. Does not extend the token's life:
    /// expiry counts from issuance.
    pub fn resolve_token(&self, token: &str) -> Result<User> {
        if token.is_empty() {
            return Err(CoreError::InvalidToken);
        }

        let row = self.db.get_token(token)?.ok_or(CoreError::InvalidToken)?;

        // The sweeper may not have caught up yet
        let last_active = parse_timestamp(&row.last_active).map_err(|_| CoreError::InvalidToken)?;
        if is_expired(last_active, Utc::now(), self.expiration) {
            return Err(CoreError::InvalidToken);
        }

        let user = self.db.get_user(&row.owner)?.ok_or(CoreError::InvalidToken)?;
        Ok(user_from_row(user)?)
    }

    /// Other tokens of the user stay valid until they expire.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let user = self.resolve_token(token)?;
        let hash = self.passwords.hash(new_password)?;
        if !self.db.update_password(&user.username, &hash)? {
            return Err(CoreError::InvalidToken);
        }
        info!("Password reset for '{}'", user.username);
        Ok(())
    }

    /// Deletes the caller's account with its trigger events, canaries and
    /// tokens. The store runs the cascade as one transaction, so on any
    /// failure the user row and everything it owns survive untouched.
    pub fn delete_user(&self, token: &str) -> Result<()> {
        let user = self.resolve_token(token)?;

        if !self.db.delete_user_cascade(&user.username)? {
            return Err(anyhow!("User '{}' vanished during deletion", user.username).into());
        }

        info!("Deleted user '{}' and revoked their tokens", user.username);
        Ok(())
    }

    /// Stops the sweeper, waits for it to exit, then wipes the token secret.
    /// Logins fail afterwards. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().await.take();
        match sweeper {
            Some(sweeper) => sweeper.shutdown().await,
            None => warn!("Session manager already shut down"),
        }
        self.secret.wipe();
    }
}
