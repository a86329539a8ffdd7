//! Utility types and functions used throughout the codebase.

pub mod sync;
pub mod time;
