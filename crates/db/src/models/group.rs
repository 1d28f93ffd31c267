//! Student group (batch) entity and DTOs.

use enrolldesk_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `student_groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentGroup {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
}

/// DTO for patching a group.
///
/// Enrollment rows in `group_enrollments` are managed through
/// [`crate::repositories::GroupRepo`] and surface as [`super::student::Student`]
/// lists, so they carry no model struct of their own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
}
