pub mod forms;
pub mod handlers;
pub mod repo;
pub mod repo_types;


use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
