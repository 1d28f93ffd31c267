//! Call list entity and DTOs.

use enrolldesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `call_lists` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CallList {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a call list.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCallList {
    pub name: String,
    pub description: Option<String>,
}

/// DTO for patching a call list.
///
/// Membership rows in `call_list_members` are managed through
/// [`crate::repositories::CallListRepo`] and surface as [`super::student::Student`]
/// lists, so they carry no model struct of their own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCallList {
    pub name: Option<String>,
    pub description: Option<String>,
}
