//! Handlers for the `/call-lists` resource and its memberships.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use enrolldesk_core::error::CoreError;
use enrolldesk_core::types::DbId;
use enrolldesk_db::models::call_list::{CallList, CreateCallList, UpdateCallList};
use enrolldesk_db::models::student::Student;
use enrolldesk_db::repositories::{CallListRepo, StudentRepo};

use crate::error::{AppError, AppResult};
use crate::query::{clamp_limit, clamp_offset, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for adding a member.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub student_id: DbId,
}

/// Result of a membership change.
#[derive(Debug, Serialize)]
pub struct MembershipChange {
    /// `false` when the student was already on the list (adds are
    /// idempotent).
    pub added: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ensure_list_exists(state: &AppState, id: DbId) -> AppResult<CallList> {
    CallListRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "CallList",
                id: id.to_string(),
            })
        })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/call-lists
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateCallList>,
) -> AppResult<(StatusCode, Json<DataResponse<CallList>>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "name is required".to_string(),
        )));
    }
    let list = CallListRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: list })))
}

/// GET /api/v1/call-lists?limit=&offset=
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<CallList>>>> {
    let lists = CallListRepo::list(
        &state.pool,
        clamp_limit(params.limit),
        clamp_offset(params.offset),
    )
    .await?;
    Ok(Json(DataResponse { data: lists }))
}

/// GET /api/v1/call-lists/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CallList>>> {
    let list = ensure_list_exists(&state, id).await?;
    Ok(Json(DataResponse { data: list }))
}

/// PUT /api/v1/call-lists/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCallList>,
) -> AppResult<Json<DataResponse<CallList>>> {
    let list = CallListRepo::update(&state.pool, id, &input)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "CallList",
                id: id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: list }))
}

/// DELETE /api/v1/call-lists/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if CallListRepo::delete(&state.pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "CallList",
            id: id.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// GET /api/v1/call-lists/{id}/members?limit=&offset=
pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<Student>>>> {
    ensure_list_exists(&state, id).await?;
    let members = CallListRepo::list_members(
        &state.pool,
        id,
        clamp_limit(params.limit),
        clamp_offset(params.offset),
    )
    .await?;
    Ok(Json(DataResponse { data: members }))
}

/// POST /api/v1/call-lists/{id}/members
pub async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<MembershipChange>>)> {
    ensure_list_exists(&state, id).await?;
    StudentRepo::find_by_id(&state.pool, input.student_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Student",
                id: input.student_id.to_string(),
            })
        })?;

    let added = CallListRepo::add_member(&state.pool, id, input.student_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: MembershipChange { added },
        }),
    ))
}

/// DELETE /api/v1/call-lists/{id}/members/{student_id}
pub async fn remove_member(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    ensure_list_exists(&state, id).await?;
    if CallListRepo::remove_member(&state.pool, id, student_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Student",
            id: student_id.to_string(),
        }))
    }
}
