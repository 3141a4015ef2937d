// API module - HTTP endpoints

pub mod auth;
pub mod chamada;
pub mod check_in;
pub mod health;
pub mod middleware;
pub mod presenca;
pub mod users;

use axum::Router;

use middleware::state::AppState;

/// All routes, without the tracing and CORS layers added in `main`
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(chamada::router())
        .merge(presenca::router())
        .merge(check_in::router())
        .merge(users::router())
        .merge(health::router())
}
