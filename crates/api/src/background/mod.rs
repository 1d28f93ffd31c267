//! Background tasks spawned at startup.

pub mod session_retention;
