pub mod auth;
pub mod canaries;
pub mod error;
pub mod middleware;
pub mod router;
pub mod triggers;

pub use auth::{AppState, AppStateInner};
pub use router::router;
