//! Shared helpers used across domain modules.

pub mod fmt;
pub mod serde_util;

pub use fmt::{display_reading, round_to};
