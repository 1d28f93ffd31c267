//! Commit engine tests against an in-memory import target.
//!
//! These exercise the full chunked commit contract: per-row outcome
//! classification, chunk clamping and resumption, terminal idempotence,
//! duplicate policies, and orchestrator faults. No database is needed.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;

use common::{mapping, names_table, plan, table, MemoryTarget};
use enrolldesk_api::imports::engine::{self, EngineError};
use enrolldesk_api::imports::session::{CommitPlan, Destination, ImportSession, SessionSnapshot};
use enrolldesk_core::error::CoreError;
use enrolldesk_core::import::MatchStrategy;
use enrolldesk_core::progress::ImportPhase;
use enrolldesk_core::tabular::{self, ParsedTable};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn started_session(table: ParsedTable, commit_plan: CommitPlan) -> ImportSession {
    let session = ImportSession::new(Destination::CallList(1), table);
    session.begin_commit(commit_plan).await.unwrap();
    session
}

async fn run_to_completion(session: &ImportSession, target: &MemoryTarget) -> SessionSnapshot {
    loop {
        let snapshot = engine::process_chunk(session, target, None).await.unwrap();
        if snapshot.progress.phase.is_terminal() {
            return snapshot;
        }
    }
}

// ---------------------------------------------------------------------------
// Per-row outcomes
// ---------------------------------------------------------------------------

/// The canonical three-row file: one clean create, one blank name, one
/// malformed email.
#[tokio::test]
async fn email_match_commit_counts_creates_and_errors() {
    let parsed = tabular::parse(
        b"Name,Email\nAda,ada@x.com\n,bob@x.com\nCara,bad-email",
        "students.csv",
    )
    .unwrap();
    let target = MemoryTarget::new();
    let session = started_session(
        parsed,
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            true,
            true,
        ),
    )
    .await;

    let snapshot = engine::process_chunk(&session, &target, Some(250))
        .await
        .unwrap();

    assert_eq!(snapshot.progress.phase, ImportPhase::Completed);
    let result = snapshot.result.expect("completed session has a result");
    assert_eq!(result.stats.created, 1);
    assert_eq!(result.stats.errors, 2);
    assert_eq!(result.stats.added, 1);
    assert_eq!(target.member_count(), 1);
    assert_eq!(target.student_count(), 1);

    // Row errors carry file-order indexes and the exact messages.
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].row, 1);
    assert_eq!(result.errors[0].message, "Missing name");
    assert_eq!(result.errors[1].row, 2);
    assert_eq!(result.errors[1].message, "Invalid email format");
}

#[tokio::test]
async fn blank_name_rows_are_never_attached() {
    let target = MemoryTarget::new();
    let session = started_session(
        table(
            &["Name", "Email"],
            &[&["", "orphan@x.com"], &["", "stray@x.com"]],
        ),
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            true,
            false,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;

    assert_eq!(snapshot.progress.errors, 2);
    assert_eq!(target.member_count(), 0);
    assert_eq!(target.student_count(), 0);
}

#[tokio::test]
async fn no_match_with_creation_disabled_is_an_error() {
    let target = MemoryTarget::new();
    let session = started_session(
        table(&["Name", "Email"], &[&["Ada", "ada@x.com"]]),
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            false,
            true,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;
    let result = snapshot.result.unwrap();

    assert_eq!(result.stats.created, 0);
    assert_eq!(result.stats.errors, 1);
    assert_eq!(
        result.errors[0].message,
        "No match found and creation disabled"
    );
    assert_eq!(target.student_count(), 0);
}

#[tokio::test]
async fn matched_student_is_attached_once() {
    let target = MemoryTarget::new();
    let ada = target.seed_student("Ada Lovelace", Some("ada@x.com"), &[]);

    let session = started_session(
        table(&["Name", "Email"], &[&["Ada L", "ada@x.com"]]),
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            false,
            true,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;
    let result = snapshot.result.unwrap();

    assert_eq!(result.stats.matched, 1);
    assert_eq!(result.stats.added, 1);
    assert!(target.is_member(ada));
    assert_eq!(target.student_count(), 1);
}

#[tokio::test]
async fn duplicate_skipped_when_skip_duplicates_set() {
    let target = MemoryTarget::new();
    let ada = target.seed_student("Ada", Some("ada@x.com"), &[]);
    target.seed_member(ada);

    let session = started_session(
        table(&["Name", "Email"], &[&["Ada", "ada@x.com"]]),
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            false,
            true,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;
    let result = snapshot.result.unwrap();

    assert_eq!(result.stats.duplicates, 1);
    assert_eq!(result.stats.matched, 0);
    assert_eq!(result.stats.added, 0);
    assert_eq!(target.member_count(), 1);
}

/// With skip_duplicates off, an already-present student counts as
/// matched and the re-attach is a no-op upsert: no second membership
/// row, nothing counted in `added`.
#[tokio::test]
async fn duplicate_reattach_is_idempotent_when_skip_disabled() {
    let target = MemoryTarget::new();
    let ada = target.seed_student("Ada", Some("ada@x.com"), &[]);
    target.seed_member(ada);

    let session = started_session(
        table(&["Name", "Email"], &[&["Ada", "ada@x.com"]]),
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            false,
            false,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;
    let result = snapshot.result.unwrap();

    assert_eq!(result.stats.matched, 1);
    assert_eq!(result.stats.duplicates, 0);
    assert_eq!(result.stats.added, 0);
    assert_eq!(target.member_count(), 1);
}

#[tokio::test]
async fn rejected_creates_become_row_errors_not_aborts() {
    let target = MemoryTarget::new();
    target.reject_creates.store(true, Ordering::SeqCst);

    let session = started_session(
        table(&["Name"], &[&["Ada"], &["Bob"]]),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;
    let result = snapshot.result.unwrap();

    // Both rows failed, but the session still completed.
    assert_eq!(snapshot.progress.phase, ImportPhase::Completed);
    assert_eq!(result.stats.errors, 2);
    assert!(result.errors[0].message.contains("students_name_check"));
    assert_eq!(target.member_count(), 0);
}

// ---------------------------------------------------------------------------
// Matching semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn phone_matching_uses_normalized_equality() {
    let target = MemoryTarget::new();
    let ada = target.seed_student("Ada", None, &["+1 (555) 010-1000"]);

    let session = started_session(
        table(&["Name", "Cell"], &[&["Ada", "1 555 010 1000"]]),
        plan(
            mapping(&[("name", "Name"), ("phone.0", "Cell")]),
            MatchStrategy::Phone,
            false,
            true,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;

    assert_eq!(snapshot.progress.matched, 1);
    assert!(target.is_member(ada));
}

#[tokio::test]
async fn name_matching_is_case_insensitive_exact() {
    let target = MemoryTarget::new();
    let ada = target.seed_student("ada lovelace", None, &[]);

    let session = started_session(
        table(&["Name"], &[&["ADA LOVELACE"]]),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            false,
            true,
        ),
    )
    .await;

    let snapshot = run_to_completion(&session, &target).await;
    assert_eq!(snapshot.progress.matched, 1);
    assert!(target.is_member(ada));
}

#[tokio::test]
async fn email_or_phone_prefers_the_email_hit() {
    let target = MemoryTarget::new();
    let by_email = target.seed_student("Ada", Some("ada@x.com"), &[]);
    let by_phone = target.seed_student("Imposter", None, &["5550101000"]);

    let session = started_session(
        table(
            &["Name", "Email", "Phone"],
            &[&["Ada", "ada@x.com", "555-010-1000"]],
        ),
        plan(
            mapping(&[("name", "Name"), ("email", "Email"), ("phone.0", "Phone")]),
            MatchStrategy::EmailOrPhone,
            false,
            true,
        ),
    )
    .await;

    run_to_completion(&session, &target).await;

    assert!(target.is_member(by_email));
    assert!(!target.is_member(by_phone));
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_chunk_requests_are_clamped() {
    let target = MemoryTarget::new();
    let session = started_session(
        names_table(500),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ),
    )
    .await;

    // A 10000-row request still processes at most 250 rows.
    let snapshot = engine::process_chunk(&session, &target, Some(10_000))
        .await
        .unwrap();
    assert_eq!(snapshot.progress.processed_rows, 250);
    assert_eq!(snapshot.progress.phase, ImportPhase::Processing);

    let snapshot = engine::process_chunk(&session, &target, Some(10_000))
        .await
        .unwrap();
    assert_eq!(snapshot.progress.processed_rows, 500);
    assert_eq!(snapshot.progress.phase, ImportPhase::Completed);
    assert_eq!(target.member_count(), 500);
}

#[tokio::test]
async fn varying_chunk_sizes_cover_every_row_exactly_once() {
    let target = MemoryTarget::new();
    let total = 103;
    let session = started_session(
        names_table(total),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ),
    )
    .await;

    let sizes = [7usize, 50, 1, 13, 250, 9];
    let mut cursor = 0;
    let mut delta_sum = 0;
    for size in sizes.iter().cycle() {
        let snapshot = engine::process_chunk(&session, &target, Some(*size))
            .await
            .unwrap();
        let processed = snapshot.progress.processed_rows;
        assert!(processed >= cursor, "progress must be monotonic");
        delta_sum += processed - cursor;
        cursor = processed;
        if snapshot.progress.phase.is_terminal() {
            break;
        }
    }

    assert_eq!(delta_sum, total);
    assert_eq!(target.member_count(), total);
    assert_eq!(target.student_count(), total);
}

#[tokio::test]
async fn processing_after_completion_is_a_no_op() {
    let target = MemoryTarget::new();
    let session = started_session(
        table(&["Name"], &[&["Ada"], &["Bob"]]),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ),
    )
    .await;

    let done = run_to_completion(&session, &target).await;
    let replay = engine::process_chunk(&session, &target, Some(250))
        .await
        .unwrap();

    assert_eq!(replay.progress.phase, ImportPhase::Completed);
    assert_eq!(replay.progress.processed_rows, done.progress.processed_rows);
    assert_eq!(
        replay.result.as_ref().unwrap().message,
        done.result.as_ref().unwrap().message
    );
    assert_eq!(target.member_count(), 2);
    assert_eq!(target.student_count(), 2);
}

#[tokio::test]
async fn reimport_with_skip_duplicates_adds_nothing() {
    let target = MemoryTarget::new();
    let source = table(
        &["Name", "Email"],
        &[&["Ada", "ada@x.com"], &["Bob", "bob@x.com"]],
    );
    let make_plan = || {
        plan(
            mapping(&[("name", "Name"), ("email", "Email")]),
            MatchStrategy::Email,
            true,
            true,
        )
    };

    let first = started_session(source.clone(), make_plan()).await;
    let snapshot = run_to_completion(&first, &target).await;
    assert_eq!(snapshot.progress.created, 2);
    assert_eq!(target.member_count(), 2);

    // Same file, same destination: every row is a duplicate.
    let second = started_session(source, make_plan()).await;
    let snapshot = run_to_completion(&second, &target).await;
    let result = snapshot.result.unwrap();

    assert_eq!(result.stats.duplicates, 2);
    assert_eq!(result.stats.created, 0);
    assert_eq!(result.stats.added, 0);
    assert_eq!(target.member_count(), 2);
    assert_eq!(target.student_count(), 2);
}

// ---------------------------------------------------------------------------
// Lifecycle and faults
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunk_before_commit_start_is_refused() {
    let target = MemoryTarget::new();
    let session = ImportSession::new(Destination::CallList(1), names_table(3));

    let err = engine::process_chunk(&session, &target, None)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::NotStarted);
}

#[tokio::test]
async fn commit_start_is_single_shot() {
    let session = ImportSession::new(Destination::CallList(1), names_table(3));
    let make_plan = || {
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        )
    };

    session.begin_commit(make_plan()).await.unwrap();
    let err = session.begin_commit(make_plan()).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[tokio::test]
async fn empty_table_completes_at_commit_start() {
    let target = MemoryTarget::new();
    let session = ImportSession::new(Destination::CallList(1), table(&["Name"], &[]));

    let snapshot = session
        .begin_commit(plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ))
        .await
        .unwrap();

    assert_eq!(snapshot.progress.phase, ImportPhase::Completed);
    assert!(snapshot.result.is_some());

    // Chunk calls just replay the result.
    let replay = engine::process_chunk(&session, &target, None).await.unwrap();
    assert_eq!(replay.progress.phase, ImportPhase::Completed);
}

#[tokio::test]
async fn storage_fault_fails_the_session() {
    let target = MemoryTarget::new();
    let session = started_session(
        names_table(5),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ),
    )
    .await;

    target.unavailable.store(true, Ordering::SeqCst);
    let err = engine::process_chunk(&session, &target, None)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Storage(_));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.progress.phase, ImportPhase::Failed);
    let result = snapshot.result.unwrap();
    assert!(result.message.contains("storage unavailable"));

    // Failed is terminal; recovery of the store does not resurrect it.
    target.unavailable.store(false, Ordering::SeqCst);
    let replay = engine::process_chunk(&session, &target, None).await.unwrap();
    assert_eq!(replay.progress.phase, ImportPhase::Failed);
}

#[tokio::test]
async fn chunk_call_safety_cap_fails_the_session() {
    let target = MemoryTarget::new();
    // One more row than the cap can cover at one row per call.
    let session = started_session(
        names_table(2001),
        plan(
            mapping(&[("name", "Name")]),
            MatchStrategy::Name,
            true,
            true,
        ),
    )
    .await;

    let mut limit_hit = false;
    for _ in 0..2001 {
        match engine::process_chunk(&session, &target, Some(1)).await {
            Ok(_) => {}
            Err(EngineError::ChunkCallLimit(_)) => {
                limit_hit = true;
                break;
            }
            Err(other) => panic!("unexpected engine error: {other}"),
        }
    }

    assert!(limit_hit);
    assert_eq!(session.snapshot().await.progress.phase, ImportPhase::Failed);
}
