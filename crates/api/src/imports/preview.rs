//! Import preview assembly.
//!
//! A preview is a non-mutating dry pass over the parsed table: headers,
//! a bounded row sample, suggested column mapping, the strategies that
//! mapping allows, and projected match statistics from probing the
//! destination store. The projection is an estimate only; commit always
//! re-resolves fresh.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use enrolldesk_core::import::{
    allowed_strategies, extract_row, fallback_strategy, suggest_mapping, ColumnMapping,
    MatchStrategy, PREVIEW_ROW_CAP,
};

use super::engine::resolve;
use super::session::ImportSession;
use super::target::{ImportTarget, TargetError};

/// Projected outcome counts under the suggested mapping.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MatchingStats {
    pub will_match: usize,
    pub will_create: usize,
    pub will_skip: usize,
}

/// The preview returned after an upload or paste.
#[derive(Debug, Serialize)]
pub struct ImportPreviewResponse {
    pub import_id: Uuid,
    pub headers: Vec<String>,
    pub preview_rows: Vec<HashMap<String, String>>,
    pub total_rows: usize,
    pub suggestions: ColumnMapping,
    pub allowed_strategies: Vec<MatchStrategy>,
    pub matching_stats: MatchingStats,
}

/// Assemble the preview for a freshly cached session.
pub async fn build_preview(
    session: &ImportSession,
    target: &dyn ImportTarget,
) -> Result<ImportPreviewResponse, TargetError> {
    let suggestions = suggest_mapping(&session.headers);
    let matching_stats = project_matching_stats(&session.rows, &suggestions, target).await?;

    Ok(ImportPreviewResponse {
        import_id: session.id,
        headers: session.headers.clone(),
        preview_rows: session.rows.iter().take(PREVIEW_ROW_CAP).cloned().collect(),
        total_rows: session.rows.len(),
        allowed_strategies: allowed_strategies(&suggestions),
        suggestions,
        matching_stats,
    })
}

/// Probe the destination store per row and classify into
/// match/create/skip counts.
///
/// Uses the most specific strategy the mapping allows, mirroring what a
/// user who keeps the suggestions gets at commit. Rows that would fail
/// the name requirement are excluded; they surface as row errors at
/// commit time.
pub async fn project_matching_stats(
    rows: &[HashMap<String, String>],
    mapping: &ColumnMapping,
    target: &dyn ImportTarget,
) -> Result<MatchingStats, TargetError> {
    let strategy = fallback_strategy(mapping, MatchStrategy::EmailOrPhone);
    let mut stats = MatchingStats::default();

    for row in rows {
        let values = extract_row(mapping, row);
        if values.name.is_empty() {
            continue;
        }
        match resolve(&values, strategy, target).await? {
            Some(student) => {
                if target.contains(student.id).await? {
                    stats.will_skip += 1;
                } else {
                    stats.will_match += 1;
                }
            }
            None => stats.will_create += 1,
        }
    }

    Ok(stats)
}
