//! Import progress state machine and result types.
//!
//! Phases move strictly forward (`READY -> PROCESSING -> COMPLETED |
//! FAILED`); counters only grow; `processed_rows` never exceeds
//! `total_rows`. The commit engine folds one [`ChunkStats`] into
//! [`ImportProgress`] per chunk so readers always observe a pre- or
//! post-chunk snapshot, never a half-applied one.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle phase of an import session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportPhase {
    Ready,
    Processing,
    Completed,
    Failed,
}

impl ImportPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a phase string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["READY", "PROCESSING", "COMPLETED", "FAILED"];

    /// Terminal phases never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> to` is a legal forward transition.
    pub fn can_transition(&self, to: ImportPhase) -> bool {
        matches!(
            (self, to),
            (Self::Ready, Self::Processing)
                | (Self::Ready, Self::Completed)
                | (Self::Ready, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Progress counters
// ---------------------------------------------------------------------------

/// Running counters for one import session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub matched: usize,
    pub created: usize,
    /// Rows that put a new membership row into the destination.
    pub added: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub updated_at: Timestamp,
}

impl ImportProgress {
    pub fn new(total_rows: usize, now: Timestamp) -> Self {
        Self {
            phase: ImportPhase::Ready,
            total_rows,
            processed_rows: 0,
            matched: 0,
            created: 0,
            added: 0,
            duplicates: 0,
            errors: 0,
            updated_at: now,
        }
    }

    /// Fold one chunk's outcome counts into the running totals.
    /// `processed_rows` is clamped so it can never pass `total_rows`.
    pub fn apply_chunk(&mut self, stats: &ChunkStats, now: Timestamp) {
        self.processed_rows = (self.processed_rows + stats.processed).min(self.total_rows);
        self.matched += stats.matched;
        self.created += stats.created;
        self.added += stats.added;
        self.duplicates += stats.duplicates;
        self.errors += stats.errors;
        self.updated_at = now;
    }

    /// Attempt a phase transition; illegal transitions are ignored and
    /// reported as `false`.
    pub fn transition(&mut self, to: ImportPhase, now: Timestamp) -> bool {
        if self.phase.can_transition(to) {
            self.phase = to;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    pub fn is_done(&self) -> bool {
        self.processed_rows >= self.total_rows
    }

    pub fn stats(&self) -> ImportStats {
        ImportStats {
            matched: self.matched,
            created: self.created,
            added: self.added,
            duplicates: self.duplicates,
            errors: self.errors,
        }
    }
}

/// Outcome counts for a single processed chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkStats {
    pub processed: usize,
    pub matched: usize,
    pub created: usize,
    pub added: usize,
    pub duplicates: usize,
    pub errors: usize,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// One row-level failure, reported in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Zero-based data-row index (the first row after the header is 0).
    pub row: usize,
    pub message: String,
}

/// Final outcome counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub matched: usize,
    pub created: usize,
    pub added: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// The summary returned once a session reaches a terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub message: String,
    pub stats: ImportStats,
    pub errors: Vec<RowError>,
}

impl ImportResult {
    /// Build the completion result with user-facing wording: full
    /// success when nothing errored, partial success when some rows
    /// were added anyway, failure when nothing made it in.
    pub fn completed(stats: ImportStats, errors: Vec<RowError>) -> Self {
        let message = if stats.errors == 0 {
            format!(
                "Import complete: {} added ({} matched, {} created), {} duplicates skipped",
                stats.added, stats.matched, stats.created, stats.duplicates
            )
        } else if stats.added > 0 {
            format!(
                "Import finished with errors: {} added, {} rows failed",
                stats.added, stats.errors
            )
        } else {
            format!("Import failed: no rows added, {} rows failed", stats.errors)
        };
        Self {
            message,
            stats,
            errors,
        }
    }

    /// Build the result for an orchestrator-level fault.
    pub fn failed(message: impl Into<String>, stats: ImportStats, errors: Vec<RowError>) -> Self {
        Self {
            message: message.into(),
            stats,
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn phase_round_trip() {
        for s in ImportPhase::ALL {
            assert_eq!(ImportPhase::from_str(s).unwrap().as_str(), *s);
        }
        assert!(ImportPhase::from_str("PAUSED").is_none());
    }

    #[test]
    fn phase_only_moves_forward() {
        use ImportPhase::*;
        assert!(Ready.can_transition(Processing));
        assert!(Ready.can_transition(Completed));
        assert!(Processing.can_transition(Completed));
        assert!(Processing.can_transition(Failed));

        assert!(!Processing.can_transition(Ready));
        assert!(!Completed.can_transition(Processing));
        assert!(!Completed.can_transition(Failed));
        assert!(!Failed.can_transition(Completed));
    }

    #[test]
    fn illegal_transition_is_ignored() {
        let now = Utc::now();
        let mut progress = ImportProgress::new(3, now);
        assert!(progress.transition(ImportPhase::Processing, now));
        assert!(!progress.transition(ImportPhase::Ready, now));
        assert_eq!(progress.phase, ImportPhase::Processing);
    }

    #[test]
    fn apply_chunk_accumulates_and_clamps() {
        let now = Utc::now();
        let mut progress = ImportProgress::new(5, now);
        progress.apply_chunk(
            &ChunkStats {
                processed: 3,
                matched: 1,
                created: 1,
                added: 2,
                duplicates: 0,
                errors: 1,

            },
            now,
        );
        assert_eq!(progress.processed_rows, 3);

        // A buggy oversized chunk cannot push processed past total.
        progress.apply_chunk(
            &ChunkStats {
                processed: 10,
                ..Default::default()
            },
            now,
        );
        assert_eq!(progress.processed_rows, 5);
        assert_eq!(progress.matched + progress.created + progress.duplicates + progress.errors, 3);
    }

    #[test]
    fn completed_wording_by_outcome() {
        let clean = ImportResult::completed(
            ImportStats {
                matched: 2,
                created: 1,
                added: 3,
                duplicates: 0,
                errors: 0,
            },
            vec![],
        );
        assert!(clean.message.starts_with("Import complete"));

        let partial = ImportResult::completed(
            ImportStats {
                added: 1,
                errors: 2,
                ..Default::default()
            },
            vec![RowError {
                row: 1,
                message: "Missing name".into(),
            }],
        );
        assert!(partial.message.contains("with errors"));

        let failed = ImportResult::completed(
            ImportStats {
                errors: 4,
                ..Default::default()
            },
            vec![],
        );
        assert!(failed.message.starts_with("Import failed"));
    }
}
