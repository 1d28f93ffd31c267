//! HTTP request handlers, one module per resource.

pub mod call_lists;
pub mod groups;
pub mod imports;
pub mod students;
