//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod call_list_repo;
pub mod group_repo;
pub mod student_repo;

pub use call_list_repo::CallListRepo;
pub use group_repo::GroupRepo;
pub use student_repo::StudentRepo;
