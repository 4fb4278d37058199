use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            username    TEXT PRIMARY KEY,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS canaries (
            id          TEXT PRIMARY KEY,
            owner       TEXT NOT NULL REFERENCES users(username),
            name        TEXT NOT NULL,
            kind        TEXT NOT NULL,
            redirect    TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_canaries_owner
            ON canaries(owner, name);

        CREATE TABLE IF NOT EXISTS tokens (
            id          TEXT PRIMARY KEY,
            owner       TEXT NOT NULL REFERENCES users(username),
            last_active TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tokens_owner
            ON tokens(owner);

        -- Events must be wiped before their canary can be deleted
        CREATE TABLE IF NOT EXISTS trigger_events (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            canary_id       TEXT NOT NULL REFERENCES canaries(id),
            timestamp       TEXT NOT NULL,
            ip              TEXT NOT NULL,
            user_agent      TEXT NOT NULL,
            accept_language TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trigger_events_canary
            ON trigger_events(canary_id, timestamp);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
