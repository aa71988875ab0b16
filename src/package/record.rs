//! Package database records.

use serde::Serialize;

/// dpkg status abbreviation, e.g. `ii`, `rc`, `iF`, `hi`.
///
/// The first letter is the desired action (install, hold, remove, purge,
/// unknown), the second the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackageStatus {
    pub desired: char,
    pub state: char,
}

impl PackageStatus {
    pub fn parse(abbrev: &str) -> Option<Self> {
        let mut chars = abbrev.trim().chars();
        let desired = chars.next()?;
        let state = chars.next()?;
        Some(Self { desired, state })
    }

    /// Files of the package are present on disk (fully or partially).
    pub fn is_installed(&self) -> bool {
        matches!(self.state, 'i' | 'U' | 'F' | 'H' | 'W' | 't')
    }

    /// Removed with configuration files left behind (`rc`).
    pub fn is_config_only(&self) -> bool {
        self.state == 'c'
    }

    /// Half-installed, half-configured or waiting on triggers.
    pub fn is_broken(&self) -> bool {
        matches!(self.state, 'U' | 'F' | 'H' | 'W' | 't')
    }

    pub fn is_held(&self) -> bool {
        self.desired == 'h'
    }
}

/// One kernel-related package as reported by the package database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRecord {
    pub status: PackageStatus,
    pub name: String,
    /// Names of the packages this one directly depends on
    pub depends: Vec<String>,
}

/// Parse `dpkg-query -W -f '${db:Status-Abbrev}\t${Package}\t${Depends}\n'` output.
///
/// Lines that do not have a status and a name are skipped.
pub fn parse_query_output(text: &str) -> Vec<PackageRecord> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let status = PackageStatus::parse(fields.next()?)?;
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let depends = fields.next().map(parse_depends).unwrap_or_default();
            Some(PackageRecord {
                status,
                name: name.to_string(),
                depends,
            })
        })
        .collect()
}

/// Extract package names from a Depends field.
///
/// `linux-image-5.4.0-42-generic (= 5.4.0-42.46), linux-firmware | foo`
/// yields `linux-image-5.4.0-42-generic`, `linux-firmware`, `foo`.
pub fn parse_depends(field: &str) -> Vec<String> {
    field
        .split([',', '|'])
        .filter_map(|alternative| alternative.split_whitespace().next())
        .map(|name| name.split(':').next().unwrap_or(name).to_string())
        .collect()
}
