//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod listing;
pub mod mutation;
pub mod query;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use listing::{list_actions, list_archives, list_providers};
pub use mutation::{mutation_handler, MutationParams};
pub use query::{read_handler, ReadParams};
