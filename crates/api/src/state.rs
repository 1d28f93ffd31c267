use std::sync::Arc;

use crate::config::ServerConfig;
use crate::imports::session::ImportSessionStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: enrolldesk_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory registry of bulk-import sessions. The server copy is
    /// authoritative; clients only cache snapshots of it.
    pub import_sessions: Arc<ImportSessionStore>,
}
