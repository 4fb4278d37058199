use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use canary_db::{Database, parse_timestamp};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Background task that purges tokens older than the expiration window.
///
/// Exactly one runs per `SessionManager`. `shutdown` returns only after the
/// loop has exited, so the store handle is never released mid-sweep.
pub struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Must be called from within a tokio runtime.
    pub fn spawn(db: Arc<Database>, expiration: Duration, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweep_loop(db, expiration, interval, cancel.clone()));
        Self { cancel, handle }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Token sweeper task failed: {}", e);
        }
    }
}

async fn run_sweep_loop(
    db: Arc<Database>,
    expiration: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    debug!("Token sweeper started (every {:?}, expiry {:?})", interval, expiration);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let sweep_db = db.clone();
        let swept = tokio::task::spawn_blocking(move || {
            sweep_expired_tokens(&sweep_db, expiration, Utc::now())
        })
        .await;

        match swept {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweeper: removed {} expired tokens", count);
                }
            }
            Ok(Err(e)) => warn!("Sweeper error: {:#}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    debug!("Token sweeper stopped");
}

/// One sweep: scan every token and delete those whose age has reached
/// `expiration`. Unreadable timestamps count as expired.
pub fn sweep_expired_tokens(db: &Database, expiration: Duration, now: DateTime<Utc>) -> Result<usize> {
    let mut removed = 0;
    for token in db.list_tokens()? {
        let expired = match parse_timestamp(&token.last_active) {
            Ok(last_active) => is_expired(last_active, now, expiration),
            Err(e) => {
                warn!("Sweeper: dropping token with {}", e);
                true
            }
        };
        if expired && db.delete_token(&token.id)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Tokens stamped in the future (clock skew) are never expired.
pub(crate) fn is_expired(last_active: DateTime<Utc>, now: DateTime<Utc>, expiration: Duration) -> bool {
    (now - last_active)
        .to_std()
        .map(|age| age >= expiration)
        .unwrap_or(false)
}
