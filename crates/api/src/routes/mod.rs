pub mod call_lists;
pub mod groups;
pub mod health;
pub mod imports;
pub mod students;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /students                                 list, create
/// /students/{id}                            get, update, delete
///
/// /call-lists                               list, create
/// /call-lists/{id}                          get, update, delete
/// /call-lists/{id}/members                  list, add (POST)
/// /call-lists/{id}/members/{student_id}     remove (DELETE)
///
/// /groups                                   list, create
/// /groups/{id}                              get, update, delete
/// /groups/{id}/students                     list, enroll (POST)
/// /groups/{id}/students/{student_id}        withdraw (DELETE)
///
/// /imports/preview                          upload preview (multipart)
/// /imports/paste                            paste preview
/// /imports/{id}                             status (GET), discard (DELETE)
/// /imports/{id}/validate-mapping            mapping validation
/// /imports/{id}/commit                      commit start
/// /imports/{id}/process                     process next chunk
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/students", students::router())
        .nest("/call-lists", call_lists::router())
        .nest("/groups", groups::router())
        .nest("/imports", imports::router())
}
