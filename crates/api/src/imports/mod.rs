//! The bulk-import pipeline: in-memory sessions, the datastore seam,
//! the chunked commit engine, and preview assembly.
//!
//! Flow: an upload (or paste) is parsed and cached in an
//! [`session::ImportSession`] under a fresh import id; the preview
//! response suggests a column mapping and projects match statistics;
//! the caller confirms a mapping and strategy (commit start), then
//! drives [`engine::process_chunk`] until the session completes. The
//! caller polls progress between chunks; nothing is pushed.

pub mod engine;
pub mod preview;
pub mod session;
pub mod target;
