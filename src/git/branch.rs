use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Detect the remote default branch of a working copy, e.g. "main" or
/// "master". This is the target of the hard reset during a refresh.
pub fn detect_default_branch(dir: &Path) -> Result<String> {
    // origin/HEAD is set on any normal clone, so resolving it is the cheap
    // first attempt; it yields the full ref, refs/remotes/origin/<branch>.
    let output = Command::new("git")
        .args(["-C"])
        .arg(dir)
        .args(["symbolic-ref", "refs/remotes/origin/HEAD"])
        .output()
        .map_err(|source| Error::GitSpawn {
            op: "symbolic-ref",
            source,
        })?;

    if output.status.success() {
        let full = String::from_utf8_lossy(&output.stdout);
        if let Some(branch) = full.trim().strip_prefix("refs/remotes/origin/") {
            return Ok(branch.to_string());
        }
    }

    // origin/HEAD unset: ask the remote itself (costs a network round trip)
    let output = Command::new("git")
        .args(["-C"])
        .arg(dir)
        .args(["remote", "show", "origin"])
        .output()
        .map_err(|source| Error::GitSpawn {
            op: "remote show",
            source,
        })?;

    if output.status.success() {
        let text = String::from_utf8_lossy(&output.stdout);
        for line in text.lines() {
            if let Some(branch) = line.trim().strip_prefix("HEAD branch: ") {
                return Ok(branch.to_string());
            }
        }
    }

    // Failing both, probe the handful of names the branch is likely to have
    for candidate in ["main", "master", "develop"] {
        let output = Command::new("git")
            .args(["-C"])
            .arg(dir)
            .args([
                "rev-parse",
                "--verify",
                &format!("refs/remotes/origin/{candidate}"),
            ])
            .output()
            .map_err(|source| Error::GitSpawn {
                op: "rev-parse",
                source,
            })?;
        if output.status.success() {
            return Ok(candidate.to_string());
        }
    }

    Err(Error::DefaultBranch(dir.to_path_buf()))
}
