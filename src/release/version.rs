//! Kernel release identifiers and their ordering.
//!
//! A release looks like `4.15.0-42-generic`: a dotted numeric version,
//! optional ABI segments, and an optional flavor. Releases are ordered by
//! numeric-aware comparison of the version and then by flavor.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};

/// Minimum number of dotted components in the leading version segment.
///
/// `18.04` in `linux-image-generic-hwe-18.04` is a distribution release,
/// not a kernel version.
const MIN_VERSION_COMPONENTS: usize = 3;

/// Flavor of packages serving every flavor of a version, e.g. Debian's
/// `linux-headers-6.1.0-13-common` (and `-common-rt`).
pub const SHARED_FLAVOR: &str = "common";

/// A kernel version plus optional build flavor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Release {
    version: String,
    flavor: Option<String>,
}

impl Release {
    pub fn new(version: impl Into<String>, flavor: Option<String>) -> Self {
        Self {
            version: version.into(),
            flavor,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    /// True for releases whose packages are shared by all flavors of the
    /// version: flavor-less ones and the `common` flavor family.
    pub fn is_shared(&self) -> bool {
        match self.flavor() {
            None => true,
            Some(flavor) => {
                flavor == SHARED_FLAVOR
                    || flavor
                        .strip_prefix(SHARED_FLAVOR)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
        }
    }

    /// Parse a release, returning None when the text is not a kernel release.
    pub fn parse(text: &str) -> Option<Release> {
        let text = text.trim();
        let mut segments = text.split('-');

        let first = segments.next()?;
        if !is_dotted_numeric(first) {
            return None;
        }

        let mut version = vec![first];
        let mut flavor: Vec<&str> = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                return None;
            }
            let starts_with_digit = segment.starts_with(|c: char| c.is_ascii_digit());
            if flavor.is_empty() && starts_with_digit {
                if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '+') {
                    return None;
                }
                version.push(segment);
            } else if segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
                flavor.push(segment);
            } else {
                return None;
            }
        }

        Some(Release {
            version: version.join("-"),
            flavor: (!flavor.is_empty()).then(|| flavor.join("-")),
        })
    }

    /// Extract the release suffix of a kernel package name.
    ///
    /// `linux-modules-extra-4.15.0-42-generic` yields `4.15.0-42-generic`,
    /// `linux-headers-4.15.0-42` yields the flavor-less `4.15.0-42`.
    /// Meta-packages such as `linux-image-generic` yield None.
    pub fn from_package_name(name: &str) -> Option<Release> {
        if !name.starts_with("linux-") {
            return None;
        }
        name.match_indices('-')
            .map(|(idx, _)| &name[idx + 1..])
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .find_map(Release::parse)
    }
}

/// `6.6.0` or, for self-built kernels with the default local version, `6.6.0+`.
fn is_dotted_numeric(segment: &str) -> bool {
    let parts: Vec<&str> = segment.trim_end_matches('+').split('.').collect();
    parts.len() >= MIN_VERSION_COMPONENTS
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.flavor {
            Some(flavor) => write!(f, "{}-{}", self.version, flavor),
            None => write!(f, "{}", self.version),
        }
    }
}

impl FromStr for Release {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Release::parse(s) {
            Some(release) => Ok(release),
            None => bail!("Invalid kernel release '{}'", s),
        }
    }
}

impl Ord for Release {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.version, &other.version)
            .then_with(|| self.flavor.cmp(&other.flavor))
            // Keep Ord consistent with Eq for numerically equal spellings ("4.09" vs "4.9").
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for Release {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two version strings the way `sort -V` does.
///
/// Runs of digits compare as integers, everything else compares bytewise,
/// so `4.10` sorts after `4.9`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Number(x), Chunk::Number(y)) => compare_numeric(x, y),
                    (Chunk::Number(_), Chunk::Text(_)) => Ordering::Greater,
                    (Chunk::Text(_), Chunk::Number(_)) => Ordering::Less,
                    (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Debug, PartialEq)]
enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != numeric)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if numeric {
            Chunk::Number(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
