//! Route definitions for student groups (batches) and enrollments.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::groups;
use crate::state::AppState;

/// Routes mounted at `/groups`.
///
/// ```text
/// GET    /                               -> list
/// POST   /                               -> create
/// GET    /{id}                           -> get_by_id
/// PUT    /{id}                           -> update
/// DELETE /{id}                           -> delete
/// GET    /{id}/students                  -> list_enrolled
/// POST   /{id}/students                  -> enroll
/// DELETE /{id}/students/{student_id}     -> withdraw
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(groups::list).post(groups::create))
        .route(
            "/{id}",
            get(groups::get_by_id)
                .put(groups::update)
                .delete(groups::delete),
        )
        .route(
            "/{id}/students",
            get(groups::list_enrolled).post(groups::enroll),
        )
        .route("/{id}/students/{student_id}", delete(groups::withdraw))
}
