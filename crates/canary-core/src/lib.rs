//! Session lifecycle and ownership checks for canary tripwires.
//!
//! [`CanaryCore`] wires the pieces together around one shared store handle:
//! - [`SessionManager`] - registration, login, token resolution, account deletion
//! - [`sweeper::Sweeper`] - background purge of expired tokens
//! - [`CanaryService`] - canary CRUD and history behind the ownership gate
//! - [`TriggerIngestor`] - unauthenticated trigger recording

pub mod canaries;
pub mod config;
mod convert;
pub mod error;
pub mod password;
pub mod secret;
pub mod sessions;
pub mod sweeper;
pub mod triggers;

use std::sync::Arc;

use canary_db::Database;

pub use canaries::CanaryService;
pub use config::{DEFAULT_TOKEN_EXPIRATION, SWEEP_INTERVAL, Settings};
pub use error::{CoreError, Result};
pub use password::PasswordCost;
pub use sessions::SessionManager;
pub use triggers::{TriggerIngestor, TriggerMetadata, Triggered};

pub struct CanaryCore {
    db: Arc<Database>,
    sessions: SessionManager,
}

impl CanaryCore {
    /// Starts the token sweeper, so this must run inside a tokio runtime.
    pub fn new(db: Arc<Database>, settings: &Settings) -> anyhow::Result<Self> {
        let sessions = SessionManager::new(db.clone(), settings)?;
        Ok(Self { db, sessions })
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn canaries(&self) -> CanaryService<'_> {
        CanaryService::new(&self.db, &self.sessions)
    }

    pub fn triggers(&self) -> TriggerIngestor<'_> {
        TriggerIngestor::new(&self.db)
    }

    /// Returns once the sweeper has exited. The store handle is only safe to
    /// close after this.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
