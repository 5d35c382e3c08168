//! Route definitions for script execution endpoints.

use axum::routing::post;
use axum::Router;

use crate::handlers::opensees;
use crate::state::AppState;

/// Script execution routes. Each is also reachable without the trailing
/// slash.
///
/// ```text
/// POST /run-opensees/          -> run_uploaded_script (multipart `file`)
/// POST /run-opensees-script/   -> run_inline_script   (JSON `script_content`)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run-opensees/", post(opensees::run_uploaded_script))
        .route("/run-opensees", post(opensees::run_uploaded_script))
        .route("/run-opensees-script/", post(opensees::run_inline_script))
        .route("/run-opensees-script", post(opensees::run_inline_script))
}
