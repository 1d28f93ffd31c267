//! Handlers for the `/groups` (batches) resource and its enrollments.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use enrolldesk_core::error::CoreError;
use enrolldesk_core::types::DbId;
use enrolldesk_db::models::group::{CreateGroup, StudentGroup, UpdateGroup};
use enrolldesk_db::models::student::Student;
use enrolldesk_db::repositories::{GroupRepo, StudentRepo};

use crate::error::{AppError, AppResult};
use crate::query::{clamp_limit, clamp_offset, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for enrolling a student.
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub student_id: DbId,
}

/// Result of an enrollment change.
#[derive(Debug, Serialize)]
pub struct EnrollmentChange {
    /// `false` when the student was already enrolled (idempotent).
    pub enrolled: bool,
}

async fn ensure_group_exists(state: &AppState, id: DbId) -> AppResult<StudentGroup> {
    GroupRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "StudentGroup",
                id: id.to_string(),
            })
        })
}

/// POST /api/v1/groups
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateGroup>,
) -> AppResult<(StatusCode, Json<DataResponse<StudentGroup>>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "name is required".to_string(),
        )));
    }
    let group = GroupRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: group })))
}

/// GET /api/v1/groups?limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<StudentGroup>>>> {
    let groups = GroupRepo::list(
        &state.pool,
        clamp_limit(params.limit),
        clamp_offset(params.offset),
    )
    .await?;
    Ok(Json(DataResponse { data: groups }))
}

/// GET /api/v1/groups/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<StudentGroup>>> {
    let group = ensure_group_exists(&state, id).await?;
    Ok(Json(DataResponse { data: group }))
}

/// PUT /api/v1/groups/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateGroup>,
) -> AppResult<Json<DataResponse<StudentGroup>>> {
    let group = GroupRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "StudentGroup",
                id: id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: group }))
}

/// DELETE /api/v1/groups/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if GroupRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "StudentGroup",
            id: id.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// GET /api/v1/groups/{id}/students?limit=&offset=
pub async fn list_enrolled(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<Student>>>> {
    ensure_group_exists(&state, id).await?;
    let students = GroupRepo::list_enrolled(
        &state.pool,
        id,
        clamp_limit(params.limit),
        clamp_offset(params.offset),
    )
    .await?;
    Ok(Json(DataResponse { data: students }))
}

/// POST /api/v1/groups/{id}/students
pub async fn enroll(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<EnrollRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<EnrollmentChange>>)> {
    ensure_group_exists(&state, id).await?;
    StudentRepo::find_by_id(&state.pool, input.student_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Student",
                id: input.student_id.to_string(),
            })
        })?;

    let enrolled = GroupRepo::enroll(&state.pool, id, input.student_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: EnrollmentChange { enrolled },
        }),
    ))
}

/// DELETE /api/v1/groups/{id}/students/{student_id}
pub async fn withdraw(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    ensure_group_exists(&state, id).await?;
    if GroupRepo::withdraw(&state.pool, id, student_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Student",
            id: student_id.to_string(),
        }))
    }
}
