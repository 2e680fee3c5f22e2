//! Shared infrastructure used across the crate

pub mod sync;
