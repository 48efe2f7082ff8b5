//! Runtime values and entity typing shared by the cache layers.

pub mod types;
