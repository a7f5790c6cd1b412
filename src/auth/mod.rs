use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

/// `/api/auth` and `/api/admin` route trees.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/auth", handlers::auth_routes())
        .nest("/api/admin", handlers::admin_routes(state.keys.clone()))
}
