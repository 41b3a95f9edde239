mod branch;

pub use branch::detect_default_branch;

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};
use crate::install::{InstallState, Installation};

/// Ensures a local working copy of the companion project exists and matches
/// the remote. The orchestrator depends on this seam rather than on git
/// directly.
pub trait Synchronizer {
    /// Bring `install` in line with the repository at `url`.
    ///
    /// `state` is the caller's pre-run snapshot of the root; the action is
    /// chosen from it, not from live disk state, so side effects earlier in
    /// the run (creating the root, for one) cannot shift the precedence.
    /// Side effects are not rolled back on partial failure; any error is
    /// fatal to the update attempt. `allow_wipe` gates the destructive
    /// corrupt-state recovery.
    fn sync(
        &self,
        url: &str,
        install: &Installation,
        state: InstallState,
        allow_wipe: bool,
    ) -> Result<SyncAction>;
}

/// The action the four-way precedence selects for a given install state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPlan {
    /// Root absent: create it, then clone.
    CreateThenClone,
    /// Root exists but is empty: clone into it.
    Clone,
    /// Root is a working copy: fetch, hard-reset to the remote default
    /// branch, then pull, so the copy matches the remote tip even if local
    /// state diverged.
    Refresh,
    /// Root holds files but no working-copy marker: wipe it and clone.
    WipeThenClone,
}

/// Map an install state to its sync action. Pure; the precedence order is
/// the enum's documented order.
pub fn plan_action(state: InstallState) -> SyncPlan {
    match state {
        InstallState::Missing => SyncPlan::CreateThenClone,
        InstallState::Empty => SyncPlan::Clone,
        InstallState::WorkingCopy => SyncPlan::Refresh,
        InstallState::Corrupt => SyncPlan::WipeThenClone,
    }
}

/// What a successful sync actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Refreshed,
    /// The corrupt root was discarded and cloned from scratch.
    Recreated,
}

/// Real synchronizer shelling out to git, every exit status checked.
pub struct GitSync;

impl Synchronizer for GitSync {
    fn sync(
        &self,
        url: &str,
        install: &Installation,
        state: InstallState,
        allow_wipe: bool,
    ) -> Result<SyncAction> {
        let root = install.root();
        let plan = plan_action(state);
        tracing::info!(?plan, root = %root.display(), "synchronizing working copy");

        match plan {
            SyncPlan::CreateThenClone => {
                std::fs::create_dir_all(root)?;
                clone(url, root)?;
                Ok(SyncAction::Cloned)
            }
            SyncPlan::Clone => {
                clone(url, root)?;
                Ok(SyncAction::Cloned)
            }
            SyncPlan::Refresh => {
                fetch(root)?;
                let branch = detect_default_branch(root)?;
                reset_hard(root, &branch)?;
                pull(root)?;
                Ok(SyncAction::Refreshed)
            }
            SyncPlan::WipeThenClone => {
                if !allow_wipe {
                    return Err(Error::CorruptInstall(root.to_path_buf()));
                }
                log_discarded_entries(root);
                std::fs::remove_dir_all(root)?;
                std::fs::create_dir_all(root)?;
                clone(url, root)?;
                Ok(SyncAction::Recreated)
            }
        }
    }
}

/// Record what a wipe is about to discard; recovery is irreversible.
fn log_discarded_entries(root: &Path) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        tracing::warn!(path = %entry.path().display(), "discarding unrecognized file");
    }
}

fn run_git(op: &'static str, cmd: &mut Command) -> Result<()> {
    let status = cmd
        .status()
        .map_err(|source| Error::GitSpawn { op, source })?;
    if !status.success() {
        return Err(Error::Git { op, status });
    }
    Ok(())
}

fn clone(url: &str, dest: &Path) -> Result<()> {
    run_git("clone", Command::new("git").args(["clone", url]).arg(dest))
}

fn fetch(dir: &Path) -> Result<()> {
    run_git(
        "fetch",
        Command::new("git")
            .args(["-C"])
            .arg(dir)
            .args(["fetch", "origin"]),
    )
}

fn reset_hard(dir: &Path, branch: &str) -> Result<()> {
    run_git(
        "reset",
        Command::new("git")
            .args(["-C"])
            .arg(dir)
            .args(["reset", "--hard", &format!("origin/{branch}")]),
    )
}

fn pull(dir: &Path) -> Result<()> {
    run_git(
        "pull",
        Command::new("git").args(["-C"]).arg(dir).args(["pull"]),
    )
}
