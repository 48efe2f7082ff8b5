//! Application services layered on top of the cache core.

pub mod error;
pub mod report;
