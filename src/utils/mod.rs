//! Shared helpers

pub mod classify;
pub mod paths;

pub use classify::classify;
pub use paths::{absolute, normalize, resolve_source};
