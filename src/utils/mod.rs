//! Shared utility functions.
//!
//! - `format`: Human-readable formatting for terminal output

mod format;

pub use format::{format_size, short_id, truncate};
