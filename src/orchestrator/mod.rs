#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::build::Builder;
use crate::config::{InstallConfig, REQUIRED_FIELDS};
use crate::error::{Error, Result};
use crate::git::Synchronizer;
use crate::install::{InstallProbe, InstallState, Installation};
use crate::remote::RemoteConfig;
use crate::{resolve, version};

/// Which guard of the decision ladder forced a fresh clone. Doubles as the
/// signal for soliciting a repository URL from the user when none is
/// configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneReason {
    RootMissing,
    RootEmpty,
    ConfigMissing,
    ConfigUnreadable,
    ConfigIncomplete,
    NoRepoUrl,
    RemoteUnavailable,
    RemoteIncomplete,
}

impl CloneReason {
    pub fn describe(self) -> &'static str {
        match self {
            Self::RootMissing => "the install root did not exist",
            Self::RootEmpty => "the install root is empty",
            Self::ConfigMissing => "no local config.json was found",
            Self::ConfigUnreadable => "the local config.json is unreadable or empty",
            Self::ConfigIncomplete => "the local config.json is missing required fields",
            Self::NoRepoUrl => "no repository URL is configured",
            Self::RemoteUnavailable => "the remote metadata could not be fetched",
            Self::RemoteIncomplete => "the remote metadata is missing required fields",
        }
    }
}

/// Outcome of the decision ladder. Derived from observed state only, never
/// stored; a `Refresh` delegates the clone-vs-pull choice to the
/// synchronizer's own precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    FreshClone(CloneReason),
    Refresh,
    UpToDate,
}

/// The metadata both sides of the comparison were read from, threaded
/// explicitly between steps instead of scratch attributes on the
/// orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    pub local: Option<InstallConfig>,
    pub remote: Option<InstallConfig>,
}

impl CheckContext {
    /// Local and remote fields under `local_` / `github_` prefixes, for
    /// side-by-side display.
    pub fn display_fields(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(local) = &self.local {
            out.extend(local.assign_fields(REQUIRED_FIELDS, "local_"));
        }
        if let Some(remote) = &self.remote {
            out.extend(remote.assign_fields(REQUIRED_FIELDS, "github_"));
        }
        out
    }
}

/// The decision ladder. Guards run in a fixed order and the first match
/// wins; every early exit is a fresh clone tagged with the guard that fired.
/// The remote is only contacted once the local metadata proves complete;
/// `url_override` takes precedence over the configured URL for that fetch.
pub fn decide(
    probe: &InstallProbe,
    local: Option<&InstallConfig>,
    url_override: Option<&str>,
    fetcher: &dyn RemoteConfig,
) -> Result<(UpdateDecision, CheckContext)> {
    use CloneReason::*;
    use UpdateDecision::*;

    let mut ctx = CheckContext {
        local: local.cloned(),
        remote: None,
    };

    // 1-2: install root state
    match probe.state {
        InstallState::Missing => return Ok((FreshClone(RootMissing), ctx)),
        InstallState::Empty => return Ok((FreshClone(RootEmpty), ctx)),
        InstallState::WorkingCopy | InstallState::Corrupt => {}
    }

    // 3: metadata file presence
    if !probe.config_file_exists {
        return Ok((FreshClone(ConfigMissing), ctx));
    }

    // 4: metadata readability
    let Some(local) = local.filter(|c| !c.is_empty()) else {
        return Ok((FreshClone(ConfigUnreadable), ctx));
    };

    // 5: metadata completeness
    if !local.is_complete(REQUIRED_FIELDS) {
        return Ok((FreshClone(ConfigIncomplete), ctx));
    }

    // 6: repository URL presence
    let Some(repo_url) = url_override.or(local.github_url.as_deref()) else {
        return Ok((FreshClone(NoRepoUrl), ctx));
    };

    // 7: remote metadata availability
    let Some(remote) = fetcher.fetch(repo_url).filter(|c| !c.is_empty()) else {
        return Ok((FreshClone(RemoteUnavailable), ctx));
    };
    ctx.remote = Some(remote.clone());

    // 8: remote metadata completeness
    if !remote.is_complete(REQUIRED_FIELDS) {
        return Ok((FreshClone(RemoteIncomplete), ctx));
    }

    // 9: version comparison
    let stale = version::needs_update(local.version.as_ref(), remote.version.as_ref())?;
    Ok((if stale { Refresh } else { UpToDate }, ctx))
}

/// Terminal result of a full orchestration run.
#[derive(Debug)]
pub enum Outcome {
    /// A verified executable path, ready for process handoff.
    Ready(PathBuf),
    /// Synchronization is needed but no repository URL is known; the caller
    /// must obtain one from the user. The orchestrator never blocks on
    /// input itself.
    NeedsRepoUrl(CloneReason),
}

/// Composes config loading, the remote fetch, the decision ladder, the
/// synchronizer and the builder into the full decide → sync → build →
/// resolve sequence. Strictly sequential; each step's output is a
/// precondition of the next.
pub struct Orchestrator<'a> {
    install: Installation,
    fetcher: &'a dyn RemoteConfig,
    sync: &'a dyn Synchronizer,
    builder: &'a dyn Builder,
    url_override: Option<String>,
    allow_wipe: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        install: Installation,
        fetcher: &'a dyn RemoteConfig,
        sync: &'a dyn Synchronizer,
        builder: &'a dyn Builder,
    ) -> Self {
        Self {
            install,
            fetcher,
            sync,
            builder,
            url_override: None,
            allow_wipe: false,
        }
    }

    /// Repository URL supplied by the user, taking precedence over the one
    /// in the local metadata.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url_override = url;
        self
    }

    /// Permit the destructive corrupt-install recovery (wipe and re-clone).
    pub fn with_wipe(mut self, allow: bool) -> Self {
        self.allow_wipe = allow;
        self
    }

    /// Evaluate the decision ladder without side effects (beyond the remote
    /// fetch). Backs the `check` and `path` commands.
    pub fn check(&self) -> Result<(UpdateDecision, CheckContext)> {
        let probe = self.install.probe();
        let local = InstallConfig::load(self.install.root());
        decide(
            &probe,
            local.as_ref(),
            self.url_override.as_deref(),
            self.fetcher,
        )
    }

    /// Run the full sequence to a verified executable path or a fatal error.
    pub fn run(&self) -> Result<Outcome> {
        let probe = self.install.probe();
        self.install.ensure_root()?;
        let _lock = self.install.lock()?;

        let local = InstallConfig::load(self.install.root());
        let (decision, ctx) = decide(
            &probe,
            local.as_ref(),
            self.url_override.as_deref(),
            self.fetcher,
        )?;
        tracing::info!(?decision, "update decision");

        match decision {
            UpdateDecision::UpToDate => self.finalize_current(&ctx),
            other => self.sync_and_build(&ctx, other, probe.state),
        }
    }

    /// Sync the working copy, rebuild unconditionally, and resolve.
    ///
    /// `state` is the pre-run snapshot of the root; the synchronizer plans
    /// from it rather than from live disk state, which by now includes the
    /// freshly created root.
    fn sync_and_build(
        &self,
        ctx: &CheckContext,
        decision: UpdateDecision,
        state: InstallState,
    ) -> Result<Outcome> {
        let url = self
            .url_override
            .clone()
            .or_else(|| ctx.local.as_ref().and_then(|c| c.github_url.clone()));
        let Some(url) = url else {
            let reason = match decision {
                UpdateDecision::FreshClone(reason) => reason,
                _ => CloneReason::NoRepoUrl,
            };
            return Ok(Outcome::NeedsRepoUrl(reason));
        };

        self.sync.sync(&url, &self.install, state, self.allow_wipe)?;

        // The synced working copy's own metadata is now authoritative; a
        // pre-sync local config may not have existed at all.
        let synced = InstallConfig::load(self.install.root())
            .filter(|c| c.is_complete(REQUIRED_FIELDS))
            .ok_or_else(|| Error::IncompleteConfig(self.install.root().to_path_buf()))?;
        let entry_file = synced
            .app_file
            .ok_or_else(|| Error::IncompleteConfig(self.install.root().to_path_buf()))?;

        self.build(&entry_file)?;
        self.verified_path(&entry_file)
    }

    /// No sync needed: resolve against current disk state, building only if
    /// the bundle or the dist directory is absent.
    fn finalize_current(&self, ctx: &CheckContext) -> Result<Outcome> {
        // UpToDate is only reachable with a complete local config.
        let entry_file = ctx
            .local
            .as_ref()
            .and_then(|c| c.app_file.clone())
            .ok_or_else(|| Error::IncompleteConfig(self.install.root().to_path_buf()))?;

        let exe = resolve::executable_path(self.install.root(), &entry_file);
        if !exe.exists() || !self.install.dist_dir().is_dir() {
            self.build(&entry_file)?;
        }
        self.verified_path(&entry_file)
    }

    fn build(&self, entry_file: &str) -> Result<()> {
        let entry = self.install.root().join(entry_file);
        self.builder
            .build(&entry, &self.install.dist_dir(), &self.install.build_dir())
    }

    fn verified_path(&self, entry_file: &str) -> Result<Outcome> {
        let exe = resolve::executable_path(self.install.root(), entry_file);
        if !exe.exists() {
            return Err(Error::ExecutableMissing(exe));
        }
        Ok(Outcome::Ready(exe))
    }
}
