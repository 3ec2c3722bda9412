// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=PHOTOBOOTH_VERSION");

    // Packaged builds pin the version explicitly
    let version = match std::env::var("PHOTOBOOTH_VERSION") {
        Ok(v) => v,
        Err(_) => build_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "0.1.0-abcdef1" inside a git checkout, plain "0.1.0" otherwise
fn build_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    match get_commit_hash() {
        Some(hash) => format!("{}-{}", pkg_version, hash),
        None => pkg_version,
    }
}

fn get_commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
