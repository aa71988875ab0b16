//! Kernel release model
//!
//! This module provides the `Release` value type, its numeric-aware
//! ordering, and the normalized `ReleaseSet` the selection logic works on.

mod set;
mod version;

pub use set::ReleaseSet;
pub use version::{Release, SHARED_FLAVOR, compare_versions};
