//! Student entity and DTOs.

use enrolldesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `students` table.
///
/// The normalized phone columns are maintained by the repository and
/// never leave the database layer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a student.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStudent {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

/// DTO for patching a student. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStudent {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub alt_phone: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}
