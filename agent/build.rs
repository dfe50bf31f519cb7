//! Stamps the commit and build time printed by `siteagent version`.

use std::process::Command;

fn git_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8(output.stdout).ok()?;
    Some(commit.trim().to_owned()).filter(|c| !c.is_empty())
}

fn main() {
    // Left unset outside a checkout; `version_info` reports "unknown" then.
    if let Some(commit) = git_commit() {
        println!("cargo:rustc-env=GIT_HASH={commit}");
    }
    println!(
        "cargo:rustc-env=BUILD_TIME={}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
