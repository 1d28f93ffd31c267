//! Route definitions for the bulk importer.
//!
//! Mounted at `/imports`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::imports;
use crate::state::AppState;

/// Routes mounted at `/imports`.
///
/// ```text
/// POST   /preview                 -> preview_upload (multipart)
/// POST   /paste                   -> preview_paste
/// GET    /{id}                    -> get_import_status
/// DELETE /{id}                    -> discard_import
/// POST   /{id}/validate-mapping   -> validate_import_mapping
/// POST   /{id}/commit             -> start_commit
/// POST   /{id}/process            -> process_chunk
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/preview", post(imports::preview_upload))
        .route("/paste", post(imports::preview_paste))
        .route(
            "/{id}",
            get(imports::get_import_status).delete(imports::discard_import),
        )
        .route(
            "/{id}/validate-mapping",
            post(imports::validate_import_mapping),
        )
        .route("/{id}/commit", post(imports::start_commit))
        .route("/{id}/process", post(imports::process_chunk))
}
