//! Shared test support: an in-memory [`ImportTarget`] plus table and
//! plan builders used by the import pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use enrolldesk_api::imports::session::CommitPlan;
use enrolldesk_api::imports::target::{ImportTarget, ResolvedStudent, TargetError};
use enrolldesk_core::import::{
    normalize_phone, ColumnMapping, ImportOptions, MatchStrategy, RowValues,
};
use enrolldesk_core::tabular::ParsedTable;
use enrolldesk_core::types::DbId;

/// A student row in the in-memory store.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phones: Vec<String>,
}

/// In-memory [`ImportTarget`]: a student directory plus one destination
/// membership set, with switches for failure injection.
#[derive(Default)]
pub struct MemoryTarget {
    students: Mutex<Vec<StudentRecord>>,
    members: Mutex<HashSet<DbId>>,
    next_id: AtomicI64,
    /// When set, every storage call reports unavailability.
    pub unavailable: AtomicBool,
    /// When set, student creation is rejected like a constraint violation.
    pub reject_creates: AtomicBool,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Seed an existing student; returns its id.
    pub fn seed_student(&self, name: &str, email: Option<&str>, phones: &[&str]) -> DbId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.students.lock().unwrap().push(StudentRecord {
            id,
            name: name.to_string(),
            email: email.map(str::to_string),
            phones: phones.iter().map(|p| p.to_string()).collect(),
        });
        id
    }

    /// Pre-attach a student to the destination.
    pub fn seed_member(&self, id: DbId) {
        self.members.lock().unwrap().insert(id);
    }

    pub fn student_count(&self) -> usize {
        self.students.lock().unwrap().len()
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    pub fn is_member(&self, id: DbId) -> bool {
        self.members.lock().unwrap().contains(&id)
    }

    fn guard(&self) -> Result<(), TargetError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(TargetError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ImportTarget for MemoryTarget {
    async fn find_by_email(&self, email: &str) -> Result<Option<ResolvedStudent>, TargetError> {
        self.guard()?;
        let students = self.students.lock().unwrap();
        Ok(students
            .iter()
            .find(|s| {
                s.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .map(|s| ResolvedStudent { id: s.id }))
    }

    async fn find_by_phone(
        &self,
        normalized: &str,
    ) -> Result<Option<ResolvedStudent>, TargetError> {
        self.guard()?;
        let students = self.students.lock().unwrap();
        Ok(students
            .iter()
            .find(|s| s.phones.iter().any(|p| normalize_phone(p) == normalized))
            .map(|s| ResolvedStudent { id: s.id }))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ResolvedStudent>, TargetError> {
        self.guard()?;
        let students = self.students.lock().unwrap();
        Ok(students
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| ResolvedStudent { id: s.id }))
    }

    async fn create_student(&self, values: &RowValues) -> Result<ResolvedStudent, TargetError> {
        self.guard()?;
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(TargetError::Rejected(
                "value violates check constraint \"students_name_check\"".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.students.lock().unwrap().push(StudentRecord {
            id,
            name: values.name.clone(),
            email: values.email.clone(),
            phones: values.phones.clone(),
        });
        Ok(ResolvedStudent { id })
    }

    async fn contains(&self, student_id: DbId) -> Result<bool, TargetError> {
        self.guard()?;
        Ok(self.members.lock().unwrap().contains(&student_id))
    }

    async fn attach(&self, student_id: DbId) -> Result<bool, TargetError> {
        self.guard()?;
        Ok(self.members.lock().unwrap().insert(student_id))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build a parsed table from string literals.
pub fn table(headers: &[&str], rows: &[&[&str]]) -> ParsedTable {
    let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rows = rows
        .iter()
        .map(|cells| {
            headers
                .iter()
                .cloned()
                .zip(cells.iter().map(|c| c.to_string()))
                .collect::<HashMap<String, String>>()
        })
        .collect();
    ParsedTable { headers, rows }
}

/// Build a table of `n` rows with a single `Name` column.
pub fn names_table(n: usize) -> ParsedTable {
    let headers = vec!["Name".to_string()];
    let rows = (0..n)
        .map(|i| HashMap::from([("Name".to_string(), format!("Student {i}"))]))
        .collect();
    ParsedTable { headers, rows }
}

/// Build a mapping from `(field key, header)` pairs.
pub fn mapping(entries: &[(&str, &str)]) -> ColumnMapping {
    let map: HashMap<String, String> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ColumnMapping::try_from(map).unwrap()
}

/// Build a commit plan.
pub fn plan(
    mapping: ColumnMapping,
    strategy: MatchStrategy,
    create_new_students: bool,
    skip_duplicates: bool,
) -> CommitPlan {
    CommitPlan {
        mapping,
        strategy,
        options: ImportOptions {
            create_new_students,
            skip_duplicates,
        },
    }
}
