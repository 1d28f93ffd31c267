//! Repository for students.
//!
//! Commit-time matching uses the exact lookups (`find_by_email`,
//! `find_by_phone`, `find_by_name`); the substring search exists only
//! for the ad-hoc list endpoint and must never be used for matching.

use enrolldesk_core::import::normalize_phone;
use enrolldesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::student::{CreateStudent, Student, UpdateStudent};

/// Column list for `students`.
const STUDENT_COLUMNS: &str =
    "id, name, email, phone, alt_phone, tags, notes, created_at, updated_at";

/// Provides CRUD and matching lookups for students.
pub struct StudentRepo;

impl StudentRepo {
    /// Insert a student, maintaining the normalized phone columns.
    pub async fn create(pool: &PgPool, input: &CreateStudent) -> Result<Student, sqlx::Error> {
        let sql = format!(
            "INSERT INTO students \
                (name, email, phone, alt_phone, phone_normalized, alt_phone_normalized, tags, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {STUDENT_COLUMNS}"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.alt_phone)
            .bind(input.phone.as_deref().map(normalize_phone))
            .bind(input.alt_phone.as_deref().map(normalize_phone))
            .bind(&input.tags)
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    /// Find a student by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Student>, sqlx::Error> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1");
        sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List students, optionally filtered by a case-insensitive
    /// substring of name or email.
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Student>, sqlx::Error> {
        match search.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                let pattern = format!("%{query}%");
                let sql = format!(
                    "SELECT {STUDENT_COLUMNS} FROM students \
                     WHERE name ILIKE $1 OR email ILIKE $1 \
                     ORDER BY id LIMIT $2 OFFSET $3"
                );
                sqlx::query_as::<_, Student>(&sql)
                    .bind(pattern)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {STUDENT_COLUMNS} FROM students ORDER BY id LIMIT $1 OFFSET $2"
                );
                sqlx::query_as::<_, Student>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// Patch a student; absent fields keep their current value.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateStudent,
    ) -> Result<Option<Student>, sqlx::Error> {
        let sql = format!(
            "UPDATE students SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                phone = COALESCE($4, phone), \
                alt_phone = COALESCE($5, alt_phone), \
                phone_normalized = COALESCE($6, phone_normalized), \
                alt_phone_normalized = COALESCE($7, alt_phone_normalized), \
                tags = COALESCE($8, tags), \
                notes = COALESCE($9, notes), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {STUDENT_COLUMNS}"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.alt_phone)
            .bind(input.phone.as_deref().map(normalize_phone))
            .bind(input.alt_phone.as_deref().map(normalize_phone))
            .bind(&input.tags)
            .bind(&input.notes)
            .fetch_optional(pool)
            .await
    }

    /// Delete a student. Returns `true` when a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Exact case-insensitive email match; earliest row wins when the
    /// datastore carries duplicates.
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<Student>, sqlx::Error> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students \
             WHERE LOWER(email) = LOWER($1) ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Normalized phone equality across the primary and alternate
    /// columns. `normalized` must already be digits-only.
    pub async fn find_by_phone(
        pool: &PgPool,
        normalized: &str,
    ) -> Result<Option<Student>, sqlx::Error> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students \
             WHERE phone_normalized = $1 OR alt_phone_normalized = $1 \
             ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(normalized)
            .fetch_optional(pool)
            .await
    }

    /// Exact case-insensitive name match (not substring).
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Student>, sqlx::Error> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students \
             WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Student>(&sql)
            .bind(name)
            .fetch_optional(pool)
            .await
    }
}
