//! Column-mapping and match-strategy model for the bulk importer.
//!
//! This module has zero external dependencies (no DB, no async, no I/O).
//! It provides:
//!
//! - Limits for preview sampling, chunk sizing, and commit safety.
//! - [`ImportField`], a typed alternative to free-form string field keys.
//! - [`ColumnMapping`] and its wire form (a `field key -> header` map).
//! - [`MatchStrategy`] plus the allowed-set and fallback rules.
//! - Header suggestion heuristics for the preview screen.
//! - The email shape check and phone normalization shared by preview
//!   and commit.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of sample rows returned by an import preview.
pub const PREVIEW_ROW_CAP: usize = 8;

/// Hard upper bound on rows processed per commit chunk. Larger requests
/// are clamped, not rejected.
pub const MAX_CHUNK_ROWS: usize = 250;

/// Chunk size used when the caller does not specify one.
pub const DEFAULT_CHUNK_ROWS: usize = 50;

/// Wall-clock budget for decoding an upload at preview time.
pub const PREVIEW_TIMEOUT_SECS: u64 = 90;

/// Safety cap on chunk calls per session; exceeding it fails the session
/// rather than looping forever.
pub const MAX_CHUNK_CALLS: u32 = 2000;

/// Maximum number of indexed phone columns a mapping may carry.
pub const MAX_PHONE_SLOTS: usize = 4;

// ---------------------------------------------------------------------------
// Logical fields
// ---------------------------------------------------------------------------

/// A logical student field a column can be mapped onto.
///
/// Phone is a repeatable indexed slot (`phone.0`, `phone.1`, ...) since
/// uploads routinely carry several phone-like columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportField {
    Name,
    Email,
    Phone(usize),
    Tags,
    Notes,
}

impl ImportField {
    /// The wire key for this field (`name`, `email`, `phone.N`, ...).
    pub fn key(&self) -> String {
        match self {
            Self::Name => "name".to_string(),
            Self::Email => "email".to_string(),
            Self::Phone(slot) => format!("phone.{slot}"),
            Self::Tags => "tags".to_string(),
            Self::Notes => "notes".to_string(),
        }
    }

    /// Parse a wire key. `phone` with no index means slot 0. Returns
    /// `None` for unrecognised keys.
    pub fn parse_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "tags" => Some(Self::Tags),
            "notes" => Some(Self::Notes),
            "phone" => Some(Self::Phone(0)),
            _ => key
                .strip_prefix("phone.")
                .and_then(|slot| slot.parse().ok())
                .map(Self::Phone),
        }
    }
}

impl std::fmt::Display for ImportField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// A user-confirmed assignment of upload columns to logical fields.
///
/// On the wire this is a `field key -> header name` object; internally
/// it is typed so an unmapped field is simply `None` and phone slots are
/// a dense ordered list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct ColumnMapping {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phones: Vec<String>,
    pub tags: Option<String>,
    pub notes: Option<String>,
}

impl ColumnMapping {
    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }

    pub fn has_phone(&self) -> bool {
        !self.phones.is_empty()
    }

    /// Assign a header to a field. Phone slots append in order; the
    /// slot index only selects an existing slot to replace.
    pub fn set(&mut self, field: ImportField, header: impl Into<String>) {
        let header = header.into();
        match field {
            ImportField::Name => self.name = Some(header),
            ImportField::Email => self.email = Some(header),
            ImportField::Tags => self.tags = Some(header),
            ImportField::Notes => self.notes = Some(header),
            ImportField::Phone(slot) => {
                if slot < self.phones.len() {
                    self.phones[slot] = header;
                } else {
                    self.phones.push(header);
                }
            }
        }
    }
}

impl TryFrom<HashMap<String, String>> for ColumnMapping {
    type Error = String;

    fn try_from(entries: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut mapping = ColumnMapping::default();
        let mut phone_slots: BTreeMap<usize, String> = BTreeMap::new();

        for (key, header) in entries {
            let field = ImportField::parse_key(&key)
                .ok_or_else(|| format!("unrecognised mapping field '{key}'"))?;
            let header = header.trim().to_string();
            if header.is_empty() {
                continue;
            }
            match field {
                ImportField::Phone(slot) => {
                    phone_slots.insert(slot, header);
                }
                other => mapping.set(other, header),
            }
        }

        // Sparse slot indexes collapse into a dense ordered list.
        mapping.phones = phone_slots.into_values().collect();
        if mapping.phones.len() > MAX_PHONE_SLOTS {
            return Err(format!("at most {MAX_PHONE_SLOTS} phone columns may be mapped"));
        }
        Ok(mapping)
    }
}

impl From<ColumnMapping> for HashMap<String, String> {
    fn from(mapping: ColumnMapping) -> Self {
        let mut entries = HashMap::new();
        if let Some(header) = mapping.name {
            entries.insert("name".to_string(), header);
        }
        if let Some(header) = mapping.email {
            entries.insert("email".to_string(), header);
        }
        for (slot, header) in mapping.phones.into_iter().enumerate() {
            entries.insert(format!("phone.{slot}"), header);
        }
        if let Some(header) = mapping.tags {
            entries.insert("tags".to_string(), header);
        }
        if let Some(header) = mapping.notes {
            entries.insert("notes".to_string(), header);
        }
        entries
    }
}

// ---------------------------------------------------------------------------
// Match strategies
// ---------------------------------------------------------------------------

/// The field(s) used to decide whether a row refers to an existing
/// student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Name,
    Email,
    Phone,
    EmailOrPhone,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::EmailOrPhone => "email_or_phone",
        }
    }

    /// Parse a strategy string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "email_or_phone" => Some(Self::EmailOrPhone),
            _ => None,
        }
    }

    /// All strategies, least to most specific.
    pub const ALL: &'static [MatchStrategy] =
        &[Self::Name, Self::Phone, Self::Email, Self::EmailOrPhone];

    /// Rank used when falling back after a mapping change. Higher is
    /// more specific.
    fn specificity(&self) -> u8 {
        match self {
            Self::Name => 0,
            Self::Phone => 1,
            Self::Email => 2,
            Self::EmailOrPhone => 3,
        }
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options confirmed at commit start. Both flags are explicit in the
/// request; there are no ambient defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportOptions {
    pub create_new_students: bool,
    pub skip_duplicates: bool,
}

// ---------------------------------------------------------------------------
// Mapping validation
// ---------------------------------------------------------------------------

/// Why a mapping/strategy pair was rejected before commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("the name field must be mapped to a column")]
    MissingRequiredField,

    #[error("match strategy '{strategy}' requires a mapped {missing} column")]
    IncompatibleMatchStrategy {
        strategy: MatchStrategy,
        missing: &'static str,
    },
}

/// Verify that the required name field is mapped and the chosen match
/// strategy is satisfiable by the mapping.
pub fn validate_mapping(
    mapping: &ColumnMapping,
    strategy: MatchStrategy,
) -> Result<(), MappingError> {
    if mapping.name.is_none() {
        return Err(MappingError::MissingRequiredField);
    }

    let missing = match strategy {
        MatchStrategy::Name => None,
        MatchStrategy::Email => (!mapping.has_email()).then_some("email"),
        MatchStrategy::Phone => (!mapping.has_phone()).then_some("phone"),
        MatchStrategy::EmailOrPhone => {
            if !mapping.has_email() {
                Some("email")
            } else if !mapping.has_phone() {
                Some("phone")
            } else {
                None
            }
        }
    };

    match missing {
        Some(missing) => Err(MappingError::IncompatibleMatchStrategy { strategy, missing }),
        None => Ok(()),
    }
}

/// The strategies the current mapping can satisfy, least to most
/// specific. `name` is always allowed.
pub fn allowed_strategies(mapping: &ColumnMapping) -> Vec<MatchStrategy> {
    MatchStrategy::ALL
        .iter()
        .copied()
        .filter(|s| validate_mapping_strategy_only(mapping, *s))
        .collect()
}

/// The strategy to use after a mapping change: the requested one when
/// still allowed, otherwise the most specific allowed strategy. Falling
/// back from `email_or_phone` with the phone column removed therefore
/// lands on `email`, never silently on `name`.
pub fn fallback_strategy(mapping: &ColumnMapping, requested: MatchStrategy) -> MatchStrategy {
    let allowed = allowed_strategies(mapping);
    if allowed.contains(&requested) {
        return requested;
    }
    allowed
        .into_iter()
        .max_by_key(MatchStrategy::specificity)
        .unwrap_or(MatchStrategy::Name)
}

fn validate_mapping_strategy_only(mapping: &ColumnMapping, strategy: MatchStrategy) -> bool {
    match strategy {
        MatchStrategy::Name => true,
        MatchStrategy::Email => mapping.has_email(),
        MatchStrategy::Phone => mapping.has_phone(),
        MatchStrategy::EmailOrPhone => mapping.has_email() && mapping.has_phone(),
    }
}

// ---------------------------------------------------------------------------
// Header suggestion heuristics
// ---------------------------------------------------------------------------

/// Substring patterns per field, in priority order. Matching is
/// case-insensitive; the first header containing the pattern wins, ties
/// broken by header order.
const NAME_PATTERNS: &[&str] = &["name", "full name", "student name"];
const EMAIL_PATTERNS: &[&str] = &["email", "e-mail"];
const PHONE_PATTERNS: &[&str] = &["phone", "mobile", "contact"];
const TAG_PATTERNS: &[&str] = &["tag", "label"];
const NOTE_PATTERNS: &[&str] = &["note", "comment", "remark"];

/// Suggest a column mapping from header names alone.
///
/// Each header is claimed by at most one field. Every unclaimed
/// phone-like header becomes its own indexed slot, capped at
/// [`MAX_PHONE_SLOTS`].
pub fn suggest_mapping(headers: &[String]) -> ColumnMapping {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut mapping = ColumnMapping::default();

    if let Some(i) = find_header(headers, NAME_PATTERNS, &claimed) {
        claimed.insert(i);
        mapping.name = Some(headers[i].clone());
    }
    if let Some(i) = find_header(headers, EMAIL_PATTERNS, &claimed) {
        claimed.insert(i);
        mapping.email = Some(headers[i].clone());
    }

    for (i, header) in headers.iter().enumerate() {
        if mapping.phones.len() >= MAX_PHONE_SLOTS {
            break;
        }
        if claimed.contains(&i) {
            continue;
        }
        let lower = header.to_lowercase();
        if PHONE_PATTERNS.iter().any(|p| lower.contains(p)) {
            claimed.insert(i);
            mapping.phones.push(header.clone());
        }
    }

    if let Some(i) = find_header(headers, TAG_PATTERNS, &claimed) {
        claimed.insert(i);
        mapping.tags = Some(headers[i].clone());
    }
    if let Some(i) = find_header(headers, NOTE_PATTERNS, &claimed) {
        mapping.notes = Some(headers[i].clone());
    }

    mapping
}

fn find_header(headers: &[String], patterns: &[&str], claimed: &HashSet<usize>) -> Option<usize> {
    for pattern in patterns {
        for (i, header) in headers.iter().enumerate() {
            if claimed.contains(&i) {
                continue;
            }
            if header.to_lowercase().contains(pattern) {
                return Some(i);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Value extraction & normalization
// ---------------------------------------------------------------------------

/// The mapped values of one upload row.
#[derive(Debug, Clone, Default)]
pub struct RowValues {
    /// Blank when the name column is unmapped or the cell is empty.
    pub name: String,
    pub email: Option<String>,
    /// Raw phone strings in slot order; blanks dropped.
    pub phones: Vec<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

/// Pull the mapped field values out of a parsed row.
pub fn extract_row(mapping: &ColumnMapping, row: &HashMap<String, String>) -> RowValues {
    let cell = |header: &Option<String>| -> Option<String> {
        header
            .as_deref()
            .and_then(|h| row.get(h))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let phones = mapping
        .phones
        .iter()
        .filter_map(|h| row.get(h))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    let tags = cell(&mapping.tags)
        .map(|raw| {
            raw.split([',', ';'])
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    RowValues {
        name: cell(&mapping.name).unwrap_or_default(),
        email: cell(&mapping.email),
        phones,
        tags,
        notes: cell(&mapping.notes),
    }
}

/// Reduce a phone string to digits only, the form used for equality
/// matching and the normalized datastore columns.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Basic email shape check applied to mapped, populated email cells.
pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
