//! Shared response envelope for API handlers.
//!
//! Every endpoint returns `{ "data": ... }`. Using [`DataResponse`]
//! rather than ad-hoc `serde_json::json!` keeps the envelope typed and
//! uniform across handlers.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
