//! Repository for student groups (batches) and their enrollments.

use enrolldesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::group::{CreateGroup, StudentGroup, UpdateGroup};
use crate::models::student::Student;

/// Column list for `student_groups`.
const GROUP_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Column list for `students` prefixed for joins.
const ENROLLED_STUDENT_COLUMNS: &str =
    "s.id, s.name, s.email, s.phone, s.alt_phone, s.tags, s.notes, s.created_at, s.updated_at";

/// Provides CRUD and enrollment operations for student groups.
pub struct GroupRepo;

impl GroupRepo {
    pub async fn create(pool: &PgPool, input: &CreateGroup) -> Result<StudentGroup, sqlx::Error> {
        let sql = format!(
            "INSERT INTO student_groups (name, description) VALUES ($1, $2) \
             RETURNING {GROUP_COLUMNS}"
        );
        sqlx::query_as::<_, StudentGroup>(&sql)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<StudentGroup>, sqlx::Error> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM student_groups WHERE id = $1");
        sqlx::query_as::<_, StudentGroup>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StudentGroup>, sqlx::Error> {
        let sql =
            format!("SELECT {GROUP_COLUMNS} FROM student_groups ORDER BY id LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, StudentGroup>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateGroup,
    ) -> Result<Option<StudentGroup>, sqlx::Error> {
        let sql = format!(
            "UPDATE student_groups SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                updated_at = now() \
             WHERE id = $1 RETURNING {GROUP_COLUMNS}"
        );
        sqlx::query_as::<_, StudentGroup>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM student_groups WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Enrollment ───────────────────────────────────────────────────

    /// Enroll a student. Idempotent: `true` when a new enrollment row
    /// was inserted, `false` when the student was already enrolled.
    pub async fn enroll(
        pool: &PgPool,
        group_id: DbId,
        student_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO group_enrollments (group_id, student_id) \
             VALUES ($1, $2) \
             ON CONFLICT (group_id, student_id) DO NOTHING",
        )
        .bind(group_id)
        .bind(student_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fresh enrollment check; called per row at commit time.
    pub async fn is_enrolled(
        pool: &PgPool,
        group_id: DbId,
        student_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                SELECT 1 FROM group_enrollments \
                WHERE group_id = $1 AND student_id = $2)",
        )
        .bind(group_id)
        .bind(student_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// List the students enrolled in a group in enrollment order.
    pub async fn list_enrolled(
        pool: &PgPool,
        group_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Student>, sqlx::Error> {
        let sql = format!(
            "SELECT {ENROLLED_STUDENT_COLUMNS} FROM group_enrollments e \
             JOIN students s ON s.id = e.student_id \
             WHERE e.group_id = $1 \
             ORDER BY e.id LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(group_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn withdraw(
        pool: &PgPool,
        group_id: DbId,
        student_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM group_enrollments WHERE group_id = $1 AND student_id = $2")
                .bind(group_id)
                .bind(student_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
