use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Final bundle directory, relative to the install root.
pub const DIST_DIR: &str = "dist";

/// Scratch directory used by the builder, relative to the install root.
pub const BUILD_DIR: &str = "build";

/// Marker directory identifying a git working copy.
pub const GIT_MARKER: &str = ".git";


/// The on-disk installation: a root directory holding the synced working
/// copy of the companion project plus the build artifacts. The `dist/` and
/// `build/` subdirectories are wholly owned by the launcher.
#[derive(Debug, Clone)]
pub struct Installation {
    root: PathBuf,
}

/// Classification of the install root, in the order the synchronizer's
/// precedence consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// Root directory does not exist.
    Missing,
    /// Root exists but holds nothing.
    Empty,
    /// Root holds a recognizable git working copy.
    WorkingCopy,
    /// Root holds files but no working-copy marker.
    Corrupt,
}

/// An immutable snapshot of the install root taken before any side effects.
/// The decision ladder evaluates this, never live disk state, so creating
/// the root partway through a run cannot change the decision.
#[derive(Debug, Clone, Copy)]
pub struct InstallProbe {
    pub state: InstallState,
    pub config_file_exists: bool,
}

impl Installation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(crate::config::CONFIG_FILE)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(DIST_DIR)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    /// Classify the current on-disk state of the root.
    pub fn state(&self) -> InstallState {
        if !self.root.exists() {
            return InstallState::Missing;
        }
        let mut entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries.flatten().peekable(),
            Err(_) => return InstallState::Missing,
        };
        if entries.peek().is_none() {
            return InstallState::Empty;
        }
        if self.root.join(GIT_MARKER).is_dir() {
            return InstallState::WorkingCopy;
        }
        InstallState::Corrupt
    }

    /// Take the pre-run snapshot the decision ladder works from.
    pub fn probe(&self) -> InstallProbe {
        InstallProbe {
            state: self.state(),
            config_file_exists: self.config_path().is_file(),
        }
    }

    /// Create the root directory if it is absent.
    pub fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            tracing::info!(root = %self.root.display(), "creating install root");
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Path of the single-instance lock: a `<root>.lock` sibling of the
    /// root. The lock must never live inside the root, where it would make
    /// an otherwise empty or freshly created install look corrupt.
    fn lock_path(&self) -> PathBuf {
        let mut path = self.root.clone().into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Acquire the single-instance lock for this installation. The root's
    /// parent directory must already exist.
    pub fn lock(&self) -> Result<LockGuard> {
        LockGuard::acquire(self.lock_path())
    }
}

/// Serializes launcher instances per install root via an exclusively-created
/// lock file. The file records the holder's PID and is removed on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => Error::Locked(path.clone()),
                _ => Error::Io(e),
            })?;
        // Best effort; the lock is the file's existence, not its content.
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}
