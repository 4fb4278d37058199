//! Database row types. These map directly to SQLite rows.
//! Distinct from canary-types models to keep the DB layer independent.

pub struct UserRow {
    pub username: String,
    /// Argon2 PHC string, never the raw password
    pub password: String,
    pub created_at: String,
}

pub struct CanaryRow {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub kind: String,
    pub redirect: String,
    pub created_at: String,
}

pub struct TokenRow {
    pub id: String,
    pub owner: String,
    pub last_active: String,
}

pub struct TriggerEventRow {
    pub id: i64,
    pub canary_id: String,
    pub timestamp: String,
    pub ip: String,
    pub user_agent: String,
    pub accept_language: String,
}
