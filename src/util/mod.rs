//! Shared helpers

pub mod angle;
pub mod rate_limit;
pub mod time;
