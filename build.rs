use std::process::Command;

use chrono::Utc;

/// Short commit of the working tree, or `unknown` outside a git checkout.
fn commit_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|hash| hash.trim().to_owned())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn main() {
    // Surfaced by GET /api/v1/status.
    println!("cargo:rustc-env=GIT_HASH={}", commit_hash());
    println!("cargo:rustc-env=BUILD_TIME={}", Utc::now().to_rfc3339());
    println!("cargo:rerun-if-changed=.git/HEAD");
}
