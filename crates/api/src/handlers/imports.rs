//! Handlers for the bulk importer.
//!
//! Provides endpoints for upload preview (multipart), paste preview,
//! mapping validation, commit start, chunk processing, status polling,
//! and session discard.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use enrolldesk_core::error::CoreError;
use enrolldesk_core::import::{
    allowed_strategies, fallback_strategy, validate_mapping, ColumnMapping, ImportOptions,
    MappingError, MatchStrategy, PREVIEW_TIMEOUT_SECS,
};
use enrolldesk_core::progress::{ImportPhase, ImportProgress, ImportResult};
use enrolldesk_core::tabular::{self, ParsedTable};
use enrolldesk_db::repositories::{CallListRepo, GroupRepo};

use crate::error::{AppError, AppResult};
use crate::imports::engine::{self, EngineError};
use crate::imports::preview::{build_preview, ImportPreviewResponse};
use crate::imports::session::{CommitPlan, Destination, ImportSession, SessionSnapshot};
use crate::imports::target::{PgTarget, TargetError};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Destination selection shared by the upload and paste endpoints.
/// Exactly one of the two ids must be present.
#[derive(Debug, Default, Deserialize)]
pub struct DestinationParams {
    pub call_list_id: Option<i64>,
    pub group_id: Option<i64>,
}

/// Request body for the paste-preview endpoint.
#[derive(Debug, Deserialize)]
pub struct PasteRequest {
    pub text: String,
    #[serde(flatten)]
    pub destination: DestinationParams,
}

/// Request body for mapping validation.
#[derive(Debug, Deserialize)]
pub struct ValidateMappingRequest {
    pub column_mapping: ColumnMapping,
    pub match_by: MatchStrategy,
}

/// Response for mapping validation: the strategies the mapping allows
/// plus the deterministic choice after a mapping change.
#[derive(Debug, Serialize)]
pub struct MappingValidationResponse {
    pub allowed_strategies: Vec<MatchStrategy>,
    pub effective_strategy: MatchStrategy,
}

/// Request body for commit start. Both option flags are required so no
/// ambient default can change import behaviour.
#[derive(Debug, Deserialize)]
pub struct StartCommitRequest {
    pub column_mapping: ColumnMapping,
    pub match_by: MatchStrategy,
    pub create_new_students: bool,
    pub skip_duplicates: bool,
}

/// Request body for chunk processing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProcessChunkRequest {
    /// Requested rows for this call; the server clamps to its own cap.
    pub chunk_size: Option<usize>,
}

/// Status payload shared by commit start, chunk processing, and polling.
#[derive(Debug, Serialize)]
pub struct ImportStatusResponse {
    pub import_id: Uuid,
    pub status: ImportPhase,
    pub progress: ImportProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ImportResult>,
}

impl ImportStatusResponse {
    fn new(import_id: Uuid, snapshot: SessionSnapshot) -> Self {
        Self {
            import_id,
            status: snapshot.progress.phase,
            progress: snapshot.progress,
            result: snapshot.result,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Verify the destination exists and turn the params into a [`Destination`].
async fn resolve_destination(
    state: &AppState,
    params: &DestinationParams,
) -> AppResult<Destination> {
    match (params.call_list_id, params.group_id) {
        (Some(id), None) => {
            CallListRepo::find_by_id(&state.pool, id)
                .await?
                .ok_or_else(|| {
                    AppError::Core(CoreError::NotFound {
                        entity: "CallList",
                        id: id.to_string(),
                    })
                })?;
            Ok(Destination::CallList(id))
        }
        (None, Some(id)) => {
            GroupRepo::find_by_id(&state.pool, id)
                .await?
                .ok_or_else(|| {
                    AppError::Core(CoreError::NotFound {
                        entity: "StudentGroup",
                        id: id.to_string(),
                    })
                })?;
            Ok(Destination::Group(id))
        }
        _ => Err(AppError::BadRequest(
            "exactly one of call_list_id or group_id is required".to_string(),
        )),
    }
}

async fn ensure_session(state: &AppState, id: Uuid) -> AppResult<Arc<ImportSession>> {
    state.import_sessions.get(id).await.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "ImportSession",
            id: id.to_string(),
        })
    })
}

/// Every header named by the mapping must exist in the uploaded file.
fn ensure_mapped_headers_exist(mapping: &ColumnMapping, headers: &[String]) -> AppResult<()> {
    let mapped = mapping
        .name
        .iter()
        .chain(mapping.email.iter())
        .chain(mapping.phones.iter())
        .chain(mapping.tags.iter())
        .chain(mapping.notes.iter());

    for header in mapped {
        if !headers.contains(header) {
            return Err(AppError::BadRequest(format!(
                "mapped column '{header}' does not exist in the upload"
            )));
        }
    }
    Ok(())
}

/// Decode an upload off the async runtime, bounded by the preview
/// wall-clock budget.
async fn parse_upload(bytes: Vec<u8>, filename: String) -> AppResult<ParsedTable> {
    let decode = tokio::task::spawn_blocking(move || tabular::parse(&bytes, &filename));

    let table = tokio::time::timeout(Duration::from_secs(PREVIEW_TIMEOUT_SECS), decode)
        .await
        .map_err(|_| {
            AppError::Timeout("Processing took too long, try a smaller file".to_string())
        })?
        .map_err(|e| AppError::InternalError(format!("upload decode task failed: {e}")))??;

    Ok(table)
}

/// Cache the parsed table as a session and assemble its preview.
async fn finish_preview(
    state: &AppState,
    destination: Destination,
    table: ParsedTable,
) -> AppResult<(StatusCode, Json<DataResponse<ImportPreviewResponse>>)> {
    let session = state
        .import_sessions
        .insert(ImportSession::new(destination, table))
        .await;

    let target = PgTarget::new(&state.pool, destination);
    let preview = build_preview(&session, &target)
        .await
        .map_err(target_error)?;

    tracing::info!(
        import_id = %session.id,
        total_rows = preview.total_rows,
        destination = ?destination,
        "Import preview created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: preview })))
}

fn target_error(err: TargetError) -> AppError {
    AppError::InternalError(err.to_string())
}

fn engine_error(err: EngineError) -> AppError {
    match err {
        EngineError::NotStarted => AppError::Core(CoreError::Conflict(err.to_string())),
        EngineError::ChunkCallLimit(_) | EngineError::Storage(_) => {
            AppError::InternalError(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/imports/preview?call_list_id= | ?group_id=
///
/// Accept a multipart CSV/XLSX upload (field `file`), parse it within
/// the preview budget, cache a session, and return the preview.
pub async fn preview_upload(
    State(state): State<AppState>,
    Query(params): Query<DestinationParams>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<ImportPreviewResponse>>)> {
    let destination = resolve_destination(&state, &params).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        AppError::BadRequest("multipart field 'file' is required".to_string())
    })?;

    let table = parse_upload(bytes, filename).await?;
    finish_preview(&state, destination, table).await
}

/// POST /api/v1/imports/paste
///
/// Same pipeline as upload preview, but over pasted delimited text.
pub async fn preview_paste(
    State(state): State<AppState>,
    Json(req): Json<PasteRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ImportPreviewResponse>>)> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("pasted text cannot be empty".to_string()));
    }
    let destination = resolve_destination(&state, &req.destination).await?;
    let table = tabular::parse_pasted(&req.text)?;
    finish_preview(&state, destination, table).await
}

/// POST /api/v1/imports/{id}/validate-mapping
///
/// Recompute the allowed strategy set for an edited mapping and report
/// the deterministic effective strategy.
pub async fn validate_import_mapping(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ValidateMappingRequest>,
) -> AppResult<Json<DataResponse<MappingValidationResponse>>> {
    let session = ensure_session(&state, id).await?;
    ensure_mapped_headers_exist(&req.column_mapping, &session.headers)?;
    if req.column_mapping.name.is_none() {
        return Err(MappingError::MissingRequiredField.into());
    }

    Ok(Json(DataResponse {
        data: MappingValidationResponse {
            allowed_strategies: allowed_strategies(&req.column_mapping),
            effective_strategy: fallback_strategy(&req.column_mapping, req.match_by),
        },
    }))
}

/// POST /api/v1/imports/{id}/commit
///
/// Confirm the mapping, strategy, and options; the session moves to
/// `PROCESSING` and is ready for chunk calls.
pub async fn start_commit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartCommitRequest>,
) -> AppResult<Json<DataResponse<ImportStatusResponse>>> {
    let session = ensure_session(&state, id).await?;
    ensure_mapped_headers_exist(&req.column_mapping, &session.headers)?;
    validate_mapping(&req.column_mapping, req.match_by)?;

    let plan = CommitPlan {
        mapping: req.column_mapping,
        strategy: req.match_by,
        options: ImportOptions {
            create_new_students: req.create_new_students,
            skip_duplicates: req.skip_duplicates,
        },
    };
    let snapshot = session.begin_commit(plan).await?;

    tracing::info!(
        import_id = %session.id,
        total_rows = session.total_rows(),
        match_by = %req.match_by,
        create_new_students = req.create_new_students,
        skip_duplicates = req.skip_duplicates,
        "Import commit started"
    );

    Ok(Json(DataResponse {
        data: ImportStatusResponse::new(session.id, snapshot),
    }))
}

/// POST /api/v1/imports/{id}/process
///
/// Process the next chunk of unprocessed rows. Safe to call after
/// completion; terminal sessions replay their final result.
pub async fn process_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProcessChunkRequest>,
) -> AppResult<Json<DataResponse<ImportStatusResponse>>> {
    let session = ensure_session(&state, id).await?;
    let target = PgTarget::new(&state.pool, session.destination);

    let snapshot = engine::process_chunk(&session, &target, req.chunk_size)
        .await
        .map_err(engine_error)?;

    Ok(Json(DataResponse {
        data: ImportStatusResponse::new(session.id, snapshot),
    }))
}

/// GET /api/v1/imports/{id}
///
/// Current progress snapshot, with the result once terminal.
pub async fn get_import_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ImportStatusResponse>>> {
    let session = ensure_session(&state, id).await?;
    let snapshot = session.snapshot().await;
    Ok(Json(DataResponse {
        data: ImportStatusResponse::new(session.id, snapshot),
    }))
}

/// DELETE /api/v1/imports/{id}
///
/// Drop the session from memory. Students and memberships already
/// committed stay in place; stopping an import is a pause, not an undo.
pub async fn discard_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.import_sessions.remove(id).await {
        tracing::info!(import_id = %id, "Import session discarded");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "ImportSession",
            id: id.to_string(),
        }))
    }
}
