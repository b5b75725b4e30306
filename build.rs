//! Build script for scriptorium
//!
//! Stamps the binary with the git revision and build time reported by `/version`.

use std::process::Command;

/// Output of a git command, or "unknown" outside a checkout
fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let stamps = [
        ("GIT_COMMIT_SHORT", git(&["rev-parse", "--short", "HEAD"])),
        ("GIT_COMMIT_FULL", git(&["rev-parse", "HEAD"])),
        (
            "BUILD_TIMESTAMP",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ),
    ];
    for (name, value) in stamps {
        println!("cargo:rustc-env={name}={value}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
