//! Package management module
//!
//! This module provides the package database records, the typed index of
//! installed kernel packages, and the package manager collaborator.

mod index;
mod manager;
mod record;

pub use index::{IMAGE_PREFIXES, KernelPackage, PackageIndex, image_release};
pub use manager::{AptPackageManager, PackageManager};
pub use record::{PackageRecord, PackageStatus, parse_depends, parse_query_output};

#[cfg(test)]
pub use manager::MockPackageManager;
