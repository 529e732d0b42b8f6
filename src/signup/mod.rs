use crate::state::AppState;
use axum::Router;

mod digest;
mod dto;
pub mod handlers;
pub mod repo;
mod validate;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::signup_routes())
}
