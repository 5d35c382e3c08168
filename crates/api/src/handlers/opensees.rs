//! Handlers for running OpenSees scripts.
//!
//! Both endpoints build a [`ScriptPayload`] and hand it to the
//! [`JobCoordinator`](crate::scripting::coordinator::JobCoordinator); the
//! engine outcome is returned as-is. An engine timeout is a normal `200`
//! response with `success: false` and `timed_out: true`.

use std::path::Path;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use opensees_core::error::CoreError;
use opensees_core::scripting::executor::{ExecutionOutcome, ScriptPayload};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field that carries the uploaded script.
pub const FILE_FIELD: &str = "file";

/// Upload extensions accepted by `/run-opensees/` (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &["tcl", "txt"];

/// Request body for `/run-opensees-script/`.
#[derive(Debug, Deserialize)]
pub struct RunScriptRequest {
    pub script_content: String,
}

/// Result of one script run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub return_code: i32,
    /// Original upload name; absent for inline scripts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl RunResponse {
    fn from_outcome(outcome: ExecutionOutcome, filename: Option<String>) -> Self {
        Self {
            success: outcome.success,
            return_code: outcome.exit_code,
            duration_ms: outcome.duration_ms(),
            filename,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            timed_out: outcome.timed_out,
        }
    }
}

/// POST /run-opensees/
///
/// Run the script uploaded in multipart field `file`. The content is read as
/// text whatever its extension; the extension only gates acceptance.
pub async fn run_uploaded_script(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<RunResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| {
        AppError::BadRequest(format!("No file uploaded: expected multipart field '{FILE_FIELD}'"))
    })?;

    let mut payload = ScriptPayload::new(String::from_utf8_lossy(&data));
    if let Some(name) = &filename {
        validate_extension(name)?;
        payload = payload.with_filename(name.clone());
    }

    let outcome = state.coordinator.execute(payload).await?;
    Ok(Json(RunResponse::from_outcome(outcome, filename)))
}

/// POST /run-opensees-script/
///
/// Run inline script text from a JSON body.
pub async fn run_inline_script(
    State(state): State<AppState>,
    body: Result<Json<RunScriptRequest>, JsonRejection>,
) -> AppResult<Json<RunResponse>> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let outcome = state
        .coordinator
        .execute(ScriptPayload::new(request.script_content))
        .await?;
    Ok(Json(RunResponse::from_outcome(outcome, None)))
}

fn validate_extension(filename: &str) -> AppResult<()> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "Only .tcl or .txt files are accepted, got '{filename}'"
        ))
        .into()),
    }
}
