//! In-memory import sessions.
//!
//! The server-side session is the single source of truth for an import:
//! clients only cache snapshots and re-poll by import id. Sessions hold
//! the parsed rows immutably; all mutable state sits behind a
//! `tokio::sync::RwLock` and is only written once per chunk, so readers
//! always observe a pre- or post-chunk snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use enrolldesk_core::error::CoreError;
use enrolldesk_core::import::{ColumnMapping, ImportOptions, MatchStrategy};
use enrolldesk_core::progress::{
    ChunkStats, ImportPhase, ImportProgress, ImportResult, RowError,
};
use enrolldesk_core::tabular::ParsedTable;
use enrolldesk_core::types::{DbId, Timestamp};

/// How long a session that never reached commit start may linger before
/// the retention task drops it.
pub const ABANDONED_SESSION_TTL_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// The collection resolved students get attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Destination {
    CallList(DbId),
    Group(DbId),
}

impl Destination {
    /// Entity name used in not-found errors.
    pub fn entity(&self) -> &'static str {
        match self {
            Self::CallList(_) => "CallList",
            Self::Group(_) => "StudentGroup",
        }
    }

    pub fn id(&self) -> DbId {
        match self {
            Self::CallList(id) | Self::Group(id) => *id,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The mapping, strategy, and options confirmed at commit start.
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub mapping: ColumnMapping,
    pub strategy: MatchStrategy,
    pub options: ImportOptions,
}

#[derive(Debug)]
struct SessionState {
    plan: Option<CommitPlan>,
    progress: ImportProgress,
    row_errors: Vec<RowError>,
    result: Option<ImportResult>,
    chunk_calls: u32,
}

/// A consistent point-in-time view of a session's mutable state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub progress: ImportProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ImportResult>,
}

/// One in-flight or finished import.
///
/// The parsed table is immutable for the session's lifetime; rows are
/// addressed by index and `progress.processed_rows` is the sole cursor.
pub struct ImportSession {
    pub id: Uuid,
    pub destination: Destination,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
    pub created_at: Timestamp,
    /// Serializes chunk processing so concurrent calls for the same
    /// import id resume from `processed_rows` instead of double-counting.
    pub(crate) chunk_lock: tokio::sync::Mutex<()>,
    state: RwLock<SessionState>,
}

impl ImportSession {
    /// Cache a parsed table under a fresh import id.
    pub fn new(destination: Destination, table: ParsedTable) -> Self {
        let now = Utc::now();
        let total = table.rows.len();
        Self {
            id: Uuid::new_v4(),
            destination,
            headers: table.headers,
            rows: table.rows,
            created_at: now,
            chunk_lock: tokio::sync::Mutex::new(()),
            state: RwLock::new(SessionState {
                plan: None,
                progress: ImportProgress::new(total, now),
                row_errors: Vec::new(),
                result: None,
                chunk_calls: 0,
            }),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Current progress and (if terminal) result.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            progress: state.progress.clone(),
            result: state.result.clone(),
        }
    }

    pub async fn plan(&self) -> Option<CommitPlan> {
        self.state.read().await.plan.clone()
    }

    /// Confirm the mapping and options, moving `READY -> PROCESSING`
    /// (or straight to `COMPLETED` for an empty table). Rejected with a
    /// conflict once commit has already started.
    pub async fn begin_commit(&self, plan: CommitPlan) -> Result<SessionSnapshot, CoreError> {
        let mut state = self.state.write().await;
        if state.progress.phase != ImportPhase::Ready {
            return Err(CoreError::Conflict(
                "import commit has already been started".to_string(),
            ));
        }

        let now = Utc::now();
        state.plan = Some(plan);
        if self.rows.is_empty() {
            state.progress.transition(ImportPhase::Completed, now);
            state.result = Some(ImportResult::completed(state.progress.stats(), Vec::new()));
        } else {
            state.progress.transition(ImportPhase::Processing, now);
        }

        Ok(SessionSnapshot {
            progress: state.progress.clone(),
            result: state.result.clone(),
        })
    }

    /// Count a chunk call against the safety cap, returning the new total.
    pub(crate) async fn bump_chunk_calls(&self) -> u32 {
        let mut state = self.state.write().await;
        state.chunk_calls += 1;
        state.chunk_calls
    }

    /// Fold a finished chunk into the session in one write, completing
    /// the session when the last row lands.
    pub(crate) async fn commit_chunk(
        &self,
        stats: ChunkStats,
        new_errors: Vec<RowError>,
    ) -> SessionSnapshot {
        let mut state = self.state.write().await;
        let now = Utc::now();
        state.progress.apply_chunk(&stats, now);
        state.row_errors.extend(new_errors);

        if state.progress.is_done() && state.progress.phase == ImportPhase::Processing {
            state.progress.transition(ImportPhase::Completed, now);
            state.result = Some(ImportResult::completed(
                state.progress.stats(),
                state.row_errors.clone(),
            ));
        }

        SessionSnapshot {
            progress: state.progress.clone(),
            result: state.result.clone(),
        }
    }

    /// Record an orchestrator-level fault. Already-terminal sessions are
    /// left untouched.
    pub(crate) async fn fail(&self, message: impl Into<String>) -> SessionSnapshot {
        let mut state = self.state.write().await;
        let now = Utc::now();
        if !state.progress.phase.is_terminal() {
            state.progress.transition(ImportPhase::Failed, now);
            state.result = Some(ImportResult::failed(
                message,
                state.progress.stats(),
                state.row_errors.clone(),
            ));
        }
        SessionSnapshot {
            progress: state.progress.clone(),
            result: state.result.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Process-wide registry of import sessions, keyed by import id.
///
/// Designed to be wrapped in `Arc` and shared via `AppState`.
#[derive(Default)]
pub struct ImportSessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<ImportSession>>>,
}

impl ImportSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and hand back the shared handle.
    pub async fn insert(&self, session: ImportSession) -> Arc<ImportSession> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<ImportSession>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop a session. Returns `false` when the id is unknown. Work
    /// already committed to the datastore is not undone.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove terminal sessions older than `retention` and sessions
    /// abandoned before commit start for [`ABANDONED_SESSION_TTL_HOURS`].
    /// Returns how many were dropped.
    pub async fn purge_expired(&self, retention: chrono::Duration) -> usize {
        let now = Utc::now();
        let abandoned_cutoff = now - chrono::Duration::hours(ABANDONED_SESSION_TTL_HOURS);

        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();
        for (id, session) in sessions.iter() {
            let state = session.state.read().await;
            let terminal_expired =
                state.progress.phase.is_terminal() && state.progress.updated_at + retention < now;
            let abandoned = session.created_at < abandoned_cutoff;
            if terminal_expired || abandoned {
                expired.push(*id);
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        expired.len()
    }
}
