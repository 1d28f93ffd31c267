/// Domain-level error shared across crates.
///
/// The API layer maps each variant to an HTTP status; repositories and
/// domain functions return these without knowing about HTTP.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity lookup by id came up empty. The id is kept as text so
    /// both BIGSERIAL keys and import-session UUIDs fit.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Input failed domain validation.
    #[error("{0}")]
    Validation(String),

    /// The operation conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// An unexpected internal failure. The message is logged, never
    /// returned to clients verbatim.
    #[error("{0}")]
    Internal(String),
}
