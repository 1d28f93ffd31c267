//! Preview builder tests: suggestion wiring, row sampling, and the
//! matching-stats projection, all against the in-memory target.

mod common;

use common::{mapping, table, MemoryTarget};
use enrolldesk_api::imports::preview::{build_preview, project_matching_stats};
use enrolldesk_api::imports::session::{Destination, ImportSession};
use enrolldesk_core::import::PREVIEW_ROW_CAP;
use enrolldesk_core::progress::ImportPhase;
use enrolldesk_core::tabular::ParsedTable;

fn wide_table(rows: usize) -> ParsedTable {
    let row_values: Vec<Vec<String>> = (0..rows)
        .map(|i| {
            vec![
                format!("Student {i}"),
                format!("s{i}@school.test"),
                format!("555-010-{i:04}"),
                String::new(),
            ]
        })
        .collect();

    let headers = vec![
        "Student Name".to_string(),
        "E-mail".to_string(),
        "Phone 1".to_string(),
        "Remarks".to_string(),
    ];
    let rows = row_values
        .into_iter()
        .map(|cells| headers.iter().cloned().zip(cells).collect())
        .collect();
    ParsedTable { headers, rows }
}

#[tokio::test]
async fn preview_samples_rows_and_suggests_mapping() {
    let target = MemoryTarget::new();
    let session = ImportSession::new(Destination::CallList(1), wide_table(12));

    let preview = build_preview(&session, &target).await.unwrap();

    assert_eq!(preview.total_rows, 12);
    assert_eq!(preview.preview_rows.len(), PREVIEW_ROW_CAP);
    assert_eq!(preview.headers.len(), 4);

    assert_eq!(preview.suggestions.name.as_deref(), Some("Student Name"));
    assert_eq!(preview.suggestions.email.as_deref(), Some("E-mail"));
    assert_eq!(preview.suggestions.phones, vec!["Phone 1"]);
    assert_eq!(preview.suggestions.notes.as_deref(), Some("Remarks"));

    // Name, email, and phone are all mapped, so every strategy is open.
    assert_eq!(preview.allowed_strategies.len(), 4);
}

#[tokio::test]
async fn small_table_previews_every_row() {
    let target = MemoryTarget::new();
    let session = ImportSession::new(Destination::CallList(1), wide_table(3));

    let preview = build_preview(&session, &target).await.unwrap();

    assert_eq!(preview.total_rows, 3);
    assert_eq!(preview.preview_rows.len(), 3);
}

#[tokio::test]
async fn matching_stats_classify_match_create_and_skip() {
    let target = MemoryTarget::new();
    let member = target.seed_student("Ada", Some("ada@x.com"), &[]);
    target.seed_member(member);
    target.seed_student("Bob", Some("bob@x.com"), &[]);

    let rows = table(
        &["Name", "Email"],
        &[
            &["Ada", "ada@x.com"],   // resolved, already attached
            &["Bob", "bob@x.com"],   // resolved, not attached
            &["Cara", "cara@x.com"], // unknown
            &["", "ghost@x.com"],    // blank name: excluded
        ],
    );
    let columns = mapping(&[("name", "Name"), ("email", "Email")]);

    let stats = project_matching_stats(&rows.rows, &columns, &target)
        .await
        .unwrap();

    assert_eq!(stats.will_skip, 1);
    assert_eq!(stats.will_match, 1);
    assert_eq!(stats.will_create, 1);
}

#[tokio::test]
async fn matching_stats_probe_uses_the_most_specific_strategy() {
    let target = MemoryTarget::new();
    // Resolvable by phone only; the projection must pick email_or_phone
    // when both columns are mapped, so this row still counts as a match.
    target.seed_student("Ada", None, &["5550101000"]);

    let rows = table(
        &["Name", "Email", "Phone"],
        &[&["Ada", "new-address@x.com", "555 010 1000"]],
    );
    let columns = mapping(&[("name", "Name"), ("email", "Email"), ("phone.0", "Phone")]);

    let stats = project_matching_stats(&rows.rows, &columns, &target)
        .await
        .unwrap();

    assert_eq!(stats.will_match, 1);
    assert_eq!(stats.will_create, 0);
}

#[tokio::test]
async fn preview_mutates_nothing() {
    let target = MemoryTarget::new();
    let existing = target.seed_student("Ada", Some("ada@x.com"), &[]);
    target.seed_member(existing);

    let session = ImportSession::new(Destination::CallList(1), wide_table(10));
    build_preview(&session, &target).await.unwrap();

    assert_eq!(target.student_count(), 1);
    assert_eq!(target.member_count(), 1);
    // The session itself stays READY until commit start.
    assert_eq!(session.snapshot().await.progress.phase, ImportPhase::Ready);
}
