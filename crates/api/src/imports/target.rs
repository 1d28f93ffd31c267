//! The seam between the commit engine and the datastore.
//!
//! [`ImportTarget`] is the only way the engine touches storage, which
//! keeps the chunk/outcome logic testable against an in-memory
//! implementation. [`PgTarget`] is the production implementation backed
//! by the repositories; it splits failures into row-level rejections
//! (constraint violations) and fatal unavailability.

use async_trait::async_trait;

use enrolldesk_core::import::RowValues;
use enrolldesk_core::types::DbId;
use enrolldesk_db::models::student::CreateStudent;
use enrolldesk_db::repositories::{CallListRepo, GroupRepo, StudentRepo};
use enrolldesk_db::DbPool;

use super::session::Destination;

/// A student resolved in (or created against) the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStudent {
    pub id: DbId,
}

/// Storage failures as seen by the engine.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// A row-level rejection (constraint violation and the like). The
    /// row records an error and the chunk continues.
    #[error("{0}")]
    Rejected(String),

    /// The datastore is unreachable. Fatal to the session.
    #[error("{0}")]
    Unavailable(String),
}

/// Resolution and attachment operations against one destination.
///
/// `contains` must hit the datastore fresh on every call: destination
/// membership may change between preview and commit, or between rows of
/// concurrent imports, and this check is the sole double-add guard.
#[async_trait]
pub trait ImportTarget: Send + Sync {
    /// Exact case-insensitive email match.
    async fn find_by_email(&self, email: &str) -> Result<Option<ResolvedStudent>, TargetError>;

    /// Digits-only phone equality. `normalized` is already normalized.
    async fn find_by_phone(&self, normalized: &str)
        -> Result<Option<ResolvedStudent>, TargetError>;

    /// Exact case-insensitive name match (never substring).
    async fn find_by_name(&self, name: &str) -> Result<Option<ResolvedStudent>, TargetError>;

    /// Create a student from the row's mapped values.
    async fn create_student(&self, values: &RowValues) -> Result<ResolvedStudent, TargetError>;

    /// Whether the student is already in the destination.
    async fn contains(&self, student_id: DbId) -> Result<bool, TargetError>;

    /// Attach the student to the destination. Idempotent: `Ok(true)`
    /// when a new membership row landed, `Ok(false)` when it already
    /// existed.
    async fn attach(&self, student_id: DbId) -> Result<bool, TargetError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// [`ImportTarget`] backed by the repositories.
pub struct PgTarget<'a> {
    pool: &'a DbPool,
    destination: Destination,
}

impl<'a> PgTarget<'a> {
    pub fn new(pool: &'a DbPool, destination: Destination) -> Self {
        Self { pool, destination }
    }
}

/// Database-reported errors (constraints) stay row-level; everything
/// else means the store itself is in trouble.
fn classify_write_error(err: sqlx::Error) -> TargetError {
    match &err {
        sqlx::Error::Database(db_err) => TargetError::Rejected(db_err.message().to_string()),
        _ => TargetError::Unavailable(err.to_string()),
    }
}

fn lookup_error(err: sqlx::Error) -> TargetError {
    TargetError::Unavailable(err.to_string())
}

#[async_trait]
impl ImportTarget for PgTarget<'_> {
    async fn find_by_email(&self, email: &str) -> Result<Option<ResolvedStudent>, TargetError> {
        StudentRepo::find_by_email(self.pool, email)
            .await
            .map(|student| student.map(|s| ResolvedStudent { id: s.id }))
            .map_err(lookup_error)
    }

    async fn find_by_phone(
        &self,
        normalized: &str,
    ) -> Result<Option<ResolvedStudent>, TargetError> {
        StudentRepo::find_by_phone(self.pool, normalized)
            .await
            .map(|student| student.map(|s| ResolvedStudent { id: s.id }))
            .map_err(lookup_error)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ResolvedStudent>, TargetError> {
        StudentRepo::find_by_name(self.pool, name)
            .await
            .map(|student| student.map(|s| ResolvedStudent { id: s.id }))
            .map_err(lookup_error)
    }

    async fn create_student(&self, values: &RowValues) -> Result<ResolvedStudent, TargetError> {
        let input = CreateStudent {
            name: values.name.clone(),
            email: values.email.clone(),
            phone: values.phones.first().cloned(),
            alt_phone: values.phones.get(1).cloned(),
            tags: values.tags.clone(),
            notes: values.notes.clone(),
        };
        StudentRepo::create(self.pool, &input)
            .await
            .map(|s| ResolvedStudent { id: s.id })
            .map_err(classify_write_error)
    }

    async fn contains(&self, student_id: DbId) -> Result<bool, TargetError> {
        match self.destination {
            Destination::CallList(list_id) => {
                CallListRepo::is_member(self.pool, list_id, student_id)
                    .await
                    .map_err(lookup_error)
            }
            Destination::Group(group_id) => {
                GroupRepo::is_enrolled(self.pool, group_id, student_id)
                    .await
                    .map_err(lookup_error)
            }
        }
    }

    async fn attach(&self, student_id: DbId) -> Result<bool, TargetError> {
        match self.destination {
            Destination::CallList(list_id) => {
                CallListRepo::add_member(self.pool, list_id, student_id)
                    .await
                    .map_err(classify_write_error)
            }
            Destination::Group(group_id) => GroupRepo::enroll(self.pool, group_id, student_id)
                .await
                .map_err(classify_write_error),
        }
    }
}
