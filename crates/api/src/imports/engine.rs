//! The chunked commit orchestrator.
//!
//! Each [`process_chunk`] call advances one session by at most
//! [`MAX_CHUNK_ROWS`] rows, strictly in file order, resuming from
//! `processed_rows`. Row failures are data (recorded and counted),
//! never aborts; only storage unavailability or the chunk-call safety
//! cap fails the session.

use enrolldesk_core::import::{
    extract_row, is_valid_email, normalize_phone, MatchStrategy, RowValues, DEFAULT_CHUNK_ROWS,
    MAX_CHUNK_CALLS, MAX_CHUNK_ROWS,
};
use enrolldesk_core::progress::{ChunkStats, RowError};

use super::session::{CommitPlan, ImportSession, SessionSnapshot};
use super::target::{ImportTarget, ResolvedStudent, TargetError};

/// Faults that end or refuse chunk processing. Row-level problems never
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("import commit has not been started")]
    NotStarted,

    #[error("import aborted after {0} chunk calls without completing")]
    ChunkCallLimit(u32),

    #[error("storage unavailable: {0}")]
    Storage(String),
}

/// What happened to one row.
#[derive(Debug)]
enum Disposition {
    Matched { newly_added: bool },
    Created,
    Duplicate,
    Error(String),
}

/// Process up to `chunk_size` unprocessed rows (clamped to
/// [`MAX_CHUNK_ROWS`]) and return the post-chunk snapshot.
///
/// Terminal sessions replay their final snapshot without side effects,
/// so polling after completion is free and safe.
pub async fn process_chunk(
    session: &ImportSession,
    target: &dyn ImportTarget,
    chunk_size: Option<usize>,
) -> Result<SessionSnapshot, EngineError> {
    // One chunk at a time per session; a second caller waits here and
    // then resumes from the updated cursor.
    let _guard = session.chunk_lock.lock().await;

    let snapshot = session.snapshot().await;
    if snapshot.progress.phase.is_terminal() {
        return Ok(snapshot);
    }
    let plan = session.plan().await.ok_or(EngineError::NotStarted)?;

    let calls = session.bump_chunk_calls().await;
    if calls > MAX_CHUNK_CALLS {
        let message = format!("chunk call limit of {MAX_CHUNK_CALLS} exceeded");
        session.fail(message).await;
        return Err(EngineError::ChunkCallLimit(calls));
    }

    let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_ROWS).clamp(1, MAX_CHUNK_ROWS);
    let start = snapshot.progress.processed_rows;
    let end = (start + chunk_size).min(session.rows.len());

    let mut stats = ChunkStats::default();
    let mut new_errors = Vec::new();

    for index in start..end {
        let values = extract_row(&plan.mapping, &session.rows[index]);
        match dispose_row(&values, &plan, target).await {
            Ok(disposition) => {
                stats.processed += 1;
                match disposition {
                    Disposition::Matched { newly_added } => {
                        stats.matched += 1;
                        if newly_added {
                            stats.added += 1;
                        }
                    }
                    Disposition::Created => {
                        stats.created += 1;
                        stats.added += 1;
                    }
                    Disposition::Duplicate => stats.duplicates += 1,
                    Disposition::Error(message) => {
                        stats.errors += 1;
                        new_errors.push(RowError {
                            row: index,
                            message,
                        });
                    }
                }
            }
            Err(fault) => {
                // Keep what this chunk already accomplished, then fail.
                session.commit_chunk(stats, new_errors).await;
                let message = fault.to_string();
                session.fail(format!("storage unavailable: {message}")).await;
                tracing::error!(
                    import_id = %session.id,
                    row = index,
                    error = %message,
                    "Import chunk aborted by storage fault",
                );
                return Err(EngineError::Storage(message));
            }
        }
    }

    let snapshot = session.commit_chunk(stats, new_errors).await;
    tracing::debug!(
        import_id = %session.id,
        processed = snapshot.progress.processed_rows,
        total = snapshot.progress.total_rows,
        phase = %snapshot.progress.phase,
        "Import chunk committed",
    );
    Ok(snapshot)
}

/// Classify one row. Returns `Err` only for fatal storage faults.
async fn dispose_row(
    values: &RowValues,
    plan: &CommitPlan,
    target: &dyn ImportTarget,
) -> Result<Disposition, TargetError> {
    if values.name.is_empty() {
        return Ok(Disposition::Error("Missing name".to_string()));
    }
    if let Some(email) = &values.email {
        if !is_valid_email(email) {
            return Ok(Disposition::Error("Invalid email format".to_string()));
        }
    }

    match resolve(values, plan.strategy, target).await? {
        Some(student) => {
            // Membership is re-checked fresh each row; another import
            // may have attached this student since preview.
            let already_present = target.contains(student.id).await?;
            if already_present && plan.options.skip_duplicates {
                return Ok(Disposition::Duplicate);
            }
            match target.attach(student.id).await {
                Ok(newly_added) => Ok(Disposition::Matched { newly_added }),
                Err(TargetError::Rejected(message)) => Ok(Disposition::Error(message)),
                Err(fatal) => Err(fatal),
            }
        }
        None if plan.options.create_new_students => {
            let student = match target.create_student(values).await {
                Ok(student) => student,
                Err(TargetError::Rejected(message)) => {
                    return Ok(Disposition::Error(message));
                }
                Err(fatal) => return Err(fatal),
            };
            match target.attach(student.id).await {
                Ok(_) => Ok(Disposition::Created),
                Err(TargetError::Rejected(message)) => Ok(Disposition::Error(message)),
                Err(fatal) => Err(fatal),
            }
        }
        None => Ok(Disposition::Error(
            "No match found and creation disabled".to_string(),
        )),
    }
}

/// Resolve a row against existing students using the chosen strategy.
///
/// Email matches exactly (case-insensitive), phones by normalized
/// equality across slots in order, names by case-insensitive exact
/// match. `email_or_phone` tries email first.
pub(crate) async fn resolve(
    values: &RowValues,
    strategy: MatchStrategy,
    target: &dyn ImportTarget,
) -> Result<Option<ResolvedStudent>, TargetError> {
    match strategy {
        MatchStrategy::Name => target.find_by_name(&values.name).await,
        MatchStrategy::Email => match &values.email {
            Some(email) => target.find_by_email(email).await,
            None => Ok(None),
        },
        MatchStrategy::Phone => resolve_by_phone(values, target).await,
        MatchStrategy::EmailOrPhone => {
            if let Some(email) = &values.email {
                if let Some(student) = target.find_by_email(email).await? {
                    return Ok(Some(student));
                }
            }
            resolve_by_phone(values, target).await
        }
    }
}

async fn resolve_by_phone(
    values: &RowValues,
    target: &dyn ImportTarget,
) -> Result<Option<ResolvedStudent>, TargetError> {
    for phone in &values.phones {
        let normalized = normalize_phone(phone);
        if normalized.is_empty() {
            continue;
        }
        if let Some(student) = target.find_by_phone(&normalized).await? {
            return Ok(Some(student));
        }
    }
    Ok(None)
}
