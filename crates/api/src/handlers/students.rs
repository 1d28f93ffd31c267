//! Handlers for the `/students` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use enrolldesk_core::error::CoreError;
use enrolldesk_core::types::DbId;
use enrolldesk_db::models::student::{CreateStudent, Student, UpdateStudent};
use enrolldesk_db::repositories::StudentRepo;

use crate::error::{AppError, AppResult};
use crate::query::{clamp_limit, clamp_offset, SearchParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/students
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateStudent>,
) -> AppResult<(StatusCode, Json<DataResponse<Student>>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "name is required".to_string(),
        )));
    }
    let student = StudentRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: student })))
}

/// GET /api/v1/students?q=&limit=&offset=
///
/// `q` filters by case-insensitive substring of name or email. This is
/// browse-only search; import matching uses exact lookups.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<DataResponse<Vec<Student>>>> {
    let limit = clamp_limit(params.limit);
    let offset = clamp_offset(params.offset);
    let students = StudentRepo::list(&state.pool, params.q.as_deref(), limit, offset).await?;
    Ok(Json(DataResponse { data: students }))
}

/// GET /api/v1/students/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Student>>> {
    let student = StudentRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Student",
                id: id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: student }))
}

/// PUT /api/v1/students/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateStudent>,
) -> AppResult<Json<DataResponse<Student>>> {
    let student = StudentRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Student",
                id: id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: student }))
}

/// DELETE /api/v1/students/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if StudentRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Student",
            id: id.to_string(),
        }))
    }
}
