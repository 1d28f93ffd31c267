//! EnrollDesk domain logic.
//!
//! Pure types and functions shared by the `db` and `api` crates: the
//! tabular upload decoder, the column-mapping and match-strategy model
//! for bulk imports, the import progress state machine, and the shared
//! domain error type. Nothing here touches the database or the network.

pub mod error;
pub mod import;
pub mod progress;
pub mod tabular;
pub mod types;
