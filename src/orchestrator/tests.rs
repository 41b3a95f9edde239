use std::cell::{Cell, RefCell};
use std::path::Path;

use super::*;
use crate::config::Version;
use crate::git::{plan_action, SyncAction, SyncPlan};
use crate::install::GIT_MARKER;

/// Fetcher double: serves a canned remote config and records the URL asked
/// for.
struct StubFetcher {
    remote: Option<InstallConfig>,
    last_url: RefCell<Option<String>>,
}

impl StubFetcher {
    fn serving(config: InstallConfig) -> Self {
        Self {
            remote: Some(config),
            last_url: RefCell::new(None),
        }
    }

    fn unavailable() -> Self {
        Self {
            remote: None,
            last_url: RefCell::new(None),
        }
    }
}

impl RemoteConfig for StubFetcher {
    fn fetch(&self, repo_url: &str) -> Option<InstallConfig> {
        *self.last_url.borrow_mut() = Some(repo_url.to_string());
        self.remote.clone()
    }
}

/// Synchronizer double: counts invocations, records the URL it was given,
/// and "delivers" a working copy by writing a config and git marker.
struct StubSync {
    calls: Cell<usize>,
    last_url: RefCell<Option<String>>,
    deliver: Option<InstallConfig>,
}

impl StubSync {
    fn delivering(config: InstallConfig) -> Self {
        Self {
            calls: Cell::new(0),
            last_url: RefCell::new(None),
            deliver: Some(config),
        }
    }

    fn inert() -> Self {
        Self {
            calls: Cell::new(0),
            last_url: RefCell::new(None),
            deliver: None,
        }
    }
}

impl Synchronizer for StubSync {
    fn sync(
        &self,
        url: &str,
        install: &Installation,
        _state: InstallState,
        _allow_wipe: bool,
    ) -> Result<SyncAction> {
        self.calls.set(self.calls.get() + 1);
        *self.last_url.borrow_mut() = Some(url.to_string());
        std::fs::create_dir_all(install.root())?;
        if let Some(config) = &self.deliver {
            config.save(install.root())?;
            std::fs::create_dir_all(install.root().join(GIT_MARKER))?;
        }
        Ok(SyncAction::Cloned)
    }
}

/// Synchronizer double sensitive to install state: asserts the snapshot it
/// is handed maps to the fresh-install clone plan and that nothing (the
/// lock file included) has leaked into the root behind the snapshot's back.
struct FirstRunSync {
    inner: StubSync,
}

impl Synchronizer for FirstRunSync {
    fn sync(
        &self,
        url: &str,
        install: &Installation,
        state: InstallState,
        allow_wipe: bool,
    ) -> Result<SyncAction> {
        assert_eq!(plan_action(state), SyncPlan::CreateThenClone);
        // Live disk state: the root was created earlier in the run but must
        // still be empty, or a real `git clone` would refuse it.
        assert_eq!(install.state(), InstallState::Empty);
        self.inner.sync(url, install, state, allow_wipe)
    }
}

/// Builder double: counts invocations and fakes the PyInstaller bundle
/// layout under dist/.
struct StubBuilder {
    calls: Cell<usize>,
    produce: bool,
}

impl StubBuilder {
    fn producing() -> Self {
        Self {
            calls: Cell::new(0),
            produce: true,
        }
    }

    fn broken() -> Self {
        Self {
            calls: Cell::new(0),
            produce: false,
        }
    }
}

impl Builder for StubBuilder {
    fn build(&self, entry: &Path, dist: &Path, _work: &Path) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        if self.produce {
            let stem = entry.file_stem().unwrap().to_str().unwrap();
            let bundle = dist.join(stem);
            std::fs::create_dir_all(&bundle)?;
            std::fs::write(
                bundle.join(format!("{stem}{}", std::env::consts::EXE_SUFFIX)),
                "",
            )?;
        }
        Ok(())
    }
}

fn complete_config(version: i64) -> InstallConfig {
    InstallConfig {
        version: Some(Version::Number(version)),
        app_file: Some("app.py".into()),
        github_url: Some("https://github.com/alice/project".into()),
    }
}

/// Lay out a working copy: git marker, config, entry script.
fn working_copy(root: &Path, config: &InstallConfig) {
    std::fs::create_dir_all(root.join(GIT_MARKER)).unwrap();
    config.save(root).unwrap();
    std::fs::write(root.join("app.py"), "print('hi')").unwrap();
}

/// Lay out a built bundle under dist/.
fn built_bundle(root: &Path) {
    let bundle = root.join("dist").join("app");
    std::fs::create_dir_all(&bundle).unwrap();
    std::fs::write(
        bundle.join(format!("app{}", std::env::consts::EXE_SUFFIX)),
        "",
    )
    .unwrap();
}

// --- decision ladder ---

#[test]
fn test_missing_root_always_fresh_clone() {
    let dir = tempfile::tempdir().unwrap();
    let install = Installation::new(dir.path().join("nope"));
    // Even with a perfectly healthy remote, guard 1 wins.
    let fetcher = StubFetcher::serving(complete_config(9));

    let (decision, _) = decide(&install.probe(), None, None, &fetcher).unwrap();
    assert_eq!(decision, UpdateDecision::FreshClone(CloneReason::RootMissing));
}

#[test]
fn test_empty_root_fresh_clone() {
    let dir = tempfile::tempdir().unwrap();
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(9));

    let (decision, _) = decide(&install.probe(), None, None, &fetcher).unwrap();
    assert_eq!(decision, UpdateDecision::FreshClone(CloneReason::RootEmpty));
}

#[test]
fn test_config_file_absent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(GIT_MARKER)).unwrap();
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(9));

    let (decision, _) = decide(&install.probe(), None, None, &fetcher).unwrap();
    assert_eq!(
        decision,
        UpdateDecision::FreshClone(CloneReason::ConfigMissing)
    );
}

#[test]
fn test_config_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(GIT_MARKER)).unwrap();
    std::fs::write(dir.path().join("config.json"), "{broken").unwrap();
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(9));

    let local = InstallConfig::load(dir.path());
    assert!(local.is_none());
    let (decision, _) = decide(&install.probe(), local.as_ref(), None, &fetcher).unwrap();
    assert_eq!(
        decision,
        UpdateDecision::FreshClone(CloneReason::ConfigUnreadable)
    );
}

#[test]
fn test_config_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let config = InstallConfig {
        app_file: None,
        ..complete_config(3)
    };
    working_copy(dir.path(), &config);
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(9));

    let (decision, _) = decide(&install.probe(), Some(&config), None, &fetcher).unwrap();
    assert_eq!(
        decision,
        UpdateDecision::FreshClone(CloneReason::ConfigIncomplete)
    );
}

#[test]
fn test_remote_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = complete_config(3);
    working_copy(dir.path(), &config);
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::unavailable();

    let (decision, ctx) = decide(&install.probe(), Some(&config), None, &fetcher).unwrap();
    assert_eq!(
        decision,
        UpdateDecision::FreshClone(CloneReason::RemoteUnavailable)
    );
    assert!(ctx.remote.is_none());
}

#[test]
fn test_remote_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let config = complete_config(3);
    working_copy(dir.path(), &config);
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(InstallConfig {
        github_url: None,
        ..complete_config(9)
    });

    let (decision, _) = decide(&install.probe(), Some(&config), None, &fetcher).unwrap();
    assert_eq!(
        decision,
        UpdateDecision::FreshClone(CloneReason::RemoteIncomplete)
    );
}

#[test]
fn test_stale_local_refreshes() {
    let dir = tempfile::tempdir().unwrap();
    let config = complete_config(3);
    working_copy(dir.path(), &config);
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(5));

    let (decision, ctx) = decide(&install.probe(), Some(&config), None, &fetcher).unwrap();
    assert_eq!(decision, UpdateDecision::Refresh);

    let fields = ctx.display_fields();
    assert_eq!(fields["local_version"], "3");
    assert_eq!(fields["github_version"], "5");
}

#[test]
fn test_current_local_is_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let config = complete_config(5);
    working_copy(dir.path(), &config);
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(5));

    let (decision, _) = decide(&install.probe(), Some(&config), None, &fetcher).unwrap();
    assert_eq!(decision, UpdateDecision::UpToDate);
}

#[test]
fn test_non_numeric_version_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let config = InstallConfig {
        version: Some(Version::Text("one".into())),
        ..complete_config(0)
    };
    working_copy(dir.path(), &config);
    let install = Installation::new(dir.path());
    let fetcher = StubFetcher::serving(complete_config(5));

    let result = decide(&install.probe(), Some(&config), None, &fetcher);
    assert!(matches!(result, Err(Error::InvalidVersion(_))));
}

// --- full run ---

#[test]
fn test_first_run_clones_builds_and_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("app");
    let fetcher = StubFetcher::unavailable();
    let sync = StubSync::delivering(complete_config(1));
    let builder = StubBuilder::producing();

    let orchestrator = Orchestrator::new(Installation::new(&root), &fetcher, &sync, &builder)
        .with_url(Some("https://github.com/alice/project".into()));
    let outcome = orchestrator.run().unwrap();

    let Outcome::Ready(path) = outcome else {
        panic!("expected Ready, got {outcome:?}");
    };
    assert!(path.exists());
    assert!(path.starts_with(root.join("dist")));
    assert_eq!(sync.calls.get(), 1);
    assert_eq!(builder.calls.get(), 1);
    assert_eq!(
        sync.last_url.borrow().as_deref(),
        Some("https://github.com/alice/project")
    );
}

#[test]
fn test_first_run_without_url_signals() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("app");
    let fetcher = StubFetcher::unavailable();
    let sync = StubSync::inert();
    let builder = StubBuilder::producing();

    let orchestrator = Orchestrator::new(Installation::new(&root), &fetcher, &sync, &builder);
    let outcome = orchestrator.run().unwrap();

    assert!(matches!(
        outcome,
        Outcome::NeedsRepoUrl(CloneReason::RootMissing)
    ));
    // The signal precedes any side-effecting step.
    assert_eq!(sync.calls.get(), 0);
    assert_eq!(builder.calls.get(), 0);
    // Guard 1 still created the root for the next attempt.
    assert!(root.is_dir());
}

#[test]
fn test_stale_install_pulls_then_builds() {
    let dir = tempfile::tempdir().unwrap();
    working_copy(dir.path(), &complete_config(3));
    let fetcher = StubFetcher::serving(complete_config(5));
    let sync = StubSync::delivering(complete_config(5));
    let builder = StubBuilder::producing();

    let orchestrator =
        Orchestrator::new(Installation::new(dir.path()), &fetcher, &sync, &builder);
    let outcome = orchestrator.run().unwrap();

    assert!(matches!(outcome, Outcome::Ready(_)));
    assert_eq!(sync.calls.get(), 1);
    assert_eq!(builder.calls.get(), 1);
    // The working copy's URL was used; no override was set.
    assert_eq!(
        sync.last_url.borrow().as_deref(),
        Some("https://github.com/alice/project")
    );
}

#[test]
fn test_up_to_date_built_install_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    working_copy(dir.path(), &complete_config(5));
    built_bundle(dir.path());
    let fetcher = StubFetcher::serving(complete_config(5));
    let sync = StubSync::inert();
    let builder = StubBuilder::producing();

    let orchestrator =
        Orchestrator::new(Installation::new(dir.path()), &fetcher, &sync, &builder);
    for _ in 0..2 {
        let outcome = orchestrator.run().unwrap();
        assert!(matches!(outcome, Outcome::Ready(_)));
    }

    assert_eq!(sync.calls.get(), 0);
    assert_eq!(builder.calls.get(), 0);
}

#[test]
fn test_up_to_date_but_unbuilt_triggers_build() {
    let dir = tempfile::tempdir().unwrap();
    working_copy(dir.path(), &complete_config(5));
    let fetcher = StubFetcher::serving(complete_config(5));
    let sync = StubSync::inert();
    let builder = StubBuilder::producing();

    let orchestrator =
        Orchestrator::new(Installation::new(dir.path()), &fetcher, &sync, &builder);
    let outcome = orchestrator.run().unwrap();

    assert!(matches!(outcome, Outcome::Ready(_)));
    assert_eq!(sync.calls.get(), 0);
    assert_eq!(builder.calls.get(), 1);
}

#[test]
fn test_post_sync_incomplete_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("app");
    let fetcher = StubFetcher::unavailable();
    let sync = StubSync::delivering(InstallConfig {
        app_file: None,
        ..complete_config(1)
    });
    let builder = StubBuilder::producing();

    let orchestrator = Orchestrator::new(Installation::new(&root), &fetcher, &sync, &builder)
        .with_url(Some("https://github.com/alice/project".into()));
    let result = orchestrator.run();

    assert!(matches!(result, Err(Error::IncompleteConfig(_))));
    assert_eq!(builder.calls.get(), 0);
}

#[test]
fn test_missing_bundle_after_build_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("app");
    let fetcher = StubFetcher::unavailable();
    let sync = StubSync::delivering(complete_config(1));
    let builder = StubBuilder::broken();

    let orchestrator = Orchestrator::new(Installation::new(&root), &fetcher, &sync, &builder)
        .with_url(Some("https://github.com/alice/project".into()));
    let result = orchestrator.run();

    assert!(matches!(result, Err(Error::ExecutableMissing(_))));
    assert_eq!(builder.calls.get(), 1);
}

#[test]
fn test_lock_released_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    working_copy(dir.path(), &complete_config(5));
    built_bundle(dir.path());
    let fetcher = StubFetcher::serving(complete_config(5));
    let sync = StubSync::inert();
    let builder = StubBuilder::producing();

    let orchestrator =
        Orchestrator::new(Installation::new(dir.path()), &fetcher, &sync, &builder);
    orchestrator.run().unwrap();
    // A held lock would make this second run fail with Error::Locked.
    orchestrator.run().unwrap();
}

#[test]
fn test_first_run_under_lock_plans_a_clone() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("app");
    let fetcher = StubFetcher::unavailable();
    let sync = FirstRunSync {
        inner: StubSync::delivering(complete_config(1)),
    };
    let builder = StubBuilder::producing();

    let orchestrator = Orchestrator::new(Installation::new(&root), &fetcher, &sync, &builder)
        .with_url(Some("https://github.com/alice/project".into()));
    let outcome = orchestrator.run().unwrap();

    assert!(matches!(outcome, Outcome::Ready(_)));
    assert_eq!(sync.inner.calls.get(), 1);
}

#[test]
fn test_check_fetches_via_url_override() {
    let dir = tempfile::tempdir().unwrap();
    working_copy(dir.path(), &complete_config(3));
    let fetcher = StubFetcher::serving(complete_config(5));
    let sync = StubSync::inert();
    let builder = StubBuilder::producing();

    let orchestrator = Orchestrator::new(Installation::new(dir.path()), &fetcher, &sync, &builder)
        .with_url(Some("https://github.com/other/fork".into()));
    let (decision, _) = orchestrator.check().unwrap();

    assert_eq!(decision, UpdateDecision::Refresh);
    assert_eq!(
        fetcher.last_url.borrow().as_deref(),
        Some("https://github.com/other/fork")
    );
}
