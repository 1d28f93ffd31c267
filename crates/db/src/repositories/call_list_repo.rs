//! Repository for call lists and their memberships.

use enrolldesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::call_list::{CallList, CreateCallList, UpdateCallList};
use crate::models::student::Student;

/// Column list for `call_lists`.
const LIST_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Column list for `students` prefixed for joins.
const MEMBER_STUDENT_COLUMNS: &str =
    "s.id, s.name, s.email, s.phone, s.alt_phone, s.tags, s.notes, s.created_at, s.updated_at";

/// Provides CRUD and membership operations for call lists.
pub struct CallListRepo;

impl CallListRepo {
    pub async fn create(pool: &PgPool, input: &CreateCallList) -> Result<CallList, sqlx::Error> {
        let sql = format!(
            "INSERT INTO call_lists (name, description) VALUES ($1, $2) RETURNING {LIST_COLUMNS}"
        );
        sqlx::query_as::<_, CallList>(&sql)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<CallList>, sqlx::Error> {
        let sql = format!("SELECT {LIST_COLUMNS} FROM call_lists WHERE id = $1");
        sqlx::query_as::<_, CallList>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<CallList>, sqlx::Error> {
        let sql = format!("SELECT {LIST_COLUMNS} FROM call_lists ORDER BY id LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, CallList>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCallList,
    ) -> Result<Option<CallList>, sqlx::Error> {
        let sql = format!(
            "UPDATE call_lists SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                updated_at = now() \
             WHERE id = $1 RETURNING {LIST_COLUMNS}"
        );
        sqlx::query_as::<_, CallList>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM call_lists WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Membership ───────────────────────────────────────────────────

    /// Add a student to the list. Idempotent: returns `true` when a new
    /// membership row was inserted, `false` when the student was
    /// already on the list.
    pub async fn add_member(
        pool: &PgPool,
        call_list_id: DbId,
        student_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO call_list_members (call_list_id, student_id) \
             VALUES ($1, $2) \
             ON CONFLICT (call_list_id, student_id) DO NOTHING",
        )
        .bind(call_list_id)
        .bind(student_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fresh membership check; called per row at commit time.
    pub async fn is_member(
        pool: &PgPool,
        call_list_id: DbId,
        student_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                SELECT 1 FROM call_list_members \
                WHERE call_list_id = $1 AND student_id = $2)",
        )
        .bind(call_list_id)
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// List the students on a call list in membership order.
    pub async fn list_members(
        pool: &PgPool,
        call_list_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Student>, sqlx::Error> {
        let sql = format!(
            "SELECT {MEMBER_STUDENT_COLUMNS} FROM call_list_members m \
             JOIN students s ON s.id = m.student_id \
             WHERE m.call_list_id = $1 \
             ORDER BY m.id LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(call_list_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn remove_member(
        pool: &PgPool,
        call_list_id: DbId,
        student_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM call_list_members WHERE call_list_id = $1 AND student_id = $2",
        )
        .bind(call_list_id)
        .bind(student_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn member_count(pool: &PgPool, call_list_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM call_list_members WHERE call_list_id = $1")
                .bind(call_list_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}
