/// Shared data model for the canary server, its HTTP boundary and the CLI.
/// Row types for the store live in canary-db; these are the public shapes.
pub mod api;
pub mod models;

pub use models::{Canary, CanaryType, TriggerEvent, User};
