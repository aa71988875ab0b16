use std::{
    env,
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

const VERSION_VAR: &str = "LINUX_PURGE_VERSION";

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed={}", VERSION_VAR);

    // Distribution packages build from tarballs and pass the version in
    let version = env::var(VERSION_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_version)
        .unwrap_or_else(|| {
            env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0-unknown".to_string())
        });

    println!("cargo:rustc-env={}={}", VERSION_VAR, version);
}

/// `git describe` without the leading `v`; dirty trees get a timestamp suffix.
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    let version = described.strip_prefix('v').unwrap_or(described);
    if version.is_empty() {
        return None;
    }
    if version.ends_with("-dirty") {
        return Some(format!("{}-{}", version, timestamp()));
    }
    Some(version.to_string())
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
