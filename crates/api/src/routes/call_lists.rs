//! Route definitions for call lists and their memberships.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::call_lists;
use crate::state::AppState;

/// Routes mounted at `/call-lists`.
///
/// ```text
/// GET    /                              -> list
/// POST   /                              -> create
/// GET    /{id}                          -> get_by_id
/// PUT    /{id}                          -> update
/// DELETE /{id}                          -> delete
/// GET    /{id}/members                  -> list_members
/// POST   /{id}/members                  -> add_member
/// DELETE /{id}/members/{student_id}     -> remove_member
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(call_lists::list).post(call_lists::create))
        .route(
            "/{id}",
            get(call_lists::get_by_id)
                .put(call_lists::update)
                .delete(call_lists::delete),
        )
        .route(
            "/{id}/members",
            get(call_lists::list_members).post(call_lists::add_member),
        )
        .route(
            "/{id}/members/{student_id}",
            delete(call_lists::remove_member),
        )
}
