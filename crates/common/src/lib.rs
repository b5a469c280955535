//! Coopsuite Common Library
//!
//! Browser-free pieces shared by the acceptance suite: sample data
//! generators, calendar helpers for date inputs, and the typed fixtures
//! that stages hand to each other between runs.

pub mod dates;
pub mod error;
pub mod fixtures;
pub mod generators;
pub mod names;
pub mod storage;

// Re-export commonly used types
pub use dates::{format_display, parse_display, DateContext, DISPLAY_FORMAT};
pub use error::{Error, Result};
pub use fixtures::{FixtureKey, FixtureSet, RunState};
pub use generators::{CompanySeed, PersonaSeed};
pub use names::Gender;
pub use storage::StorageState;

/// Coopsuite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
