use std::time::Duration;

use crate::password::PasswordCost;

/// How long a token lives after issuance.
pub const DEFAULT_TOKEN_EXPIRATION: Duration = Duration::from_secs(60 * 60);

/// Pause between two sweeps of the token table.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(2);

/// Construction-time settings for the core components.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token_expiration: Duration,
    pub registration_enabled: bool,
    pub sweep_interval: Duration,
    pub password_cost: PasswordCost,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_expiration: DEFAULT_TOKEN_EXPIRATION,
            registration_enabled: true,
            sweep_interval: SWEEP_INTERVAL,
            password_cost: PasswordCost::default(),
        }
    }
}
