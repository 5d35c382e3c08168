pub mod health;
pub mod opensees;

use axum::Router;

use crate::state::AppState;

/// All routes, mounted at the root.
///
/// ```text
/// GET  /                       -> liveness
/// GET  /health                 -> engine health
/// POST /run-opensees/          -> run an uploaded script file
/// POST /run-opensees-script/   -> run inline script text
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(opensees::router())
}
