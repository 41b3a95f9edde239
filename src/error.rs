use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Fatal launcher errors.
///
/// Soft conditions (missing or malformed metadata, an empty install root, a
/// failed remote fetch) never surface here — they resolve to a fresh-clone
/// decision instead. Everything in this enum aborts the run before process
/// handoff.
#[derive(Debug, Error)]
pub enum Error {
    /// Another launcher instance holds the install root.
    #[error("install root is locked by another launcher instance (lock file: {0})")]
    Locked(PathBuf),

    /// The install root contains files but no recognizable working copy.
    #[error(
        "install root {0} contains files but is not a working copy; \
         re-run with --force-reset to discard it and clone from scratch"
    )]
    CorruptInstall(PathBuf),

    /// A git subprocess could not be spawned.
    #[error("failed to run `git {op}`")]
    GitSpawn {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A git subprocess ran and exited non-zero.
    #[error("`git {op}` failed with {status}")]
    Git {
        op: &'static str,
        status: ExitStatus,
    },

    /// No remote default branch could be determined for the reset target.
    #[error("could not detect the default branch of the working copy at {0}")]
    DefaultBranch(PathBuf),

    /// A version value that is neither an integer nor an integer string.
    #[error("version value {0:?} is not an integer")]
    InvalidVersion(String),

    /// The entry file declared in config.json is missing after sync.
    #[error(
        "declared entry file {0} does not exist in the working copy; \
         check the app_file field in config.json"
    )]
    MissingEntryFile(PathBuf),

    /// The synced working copy's config.json is absent or missing required fields.
    #[error(
        "config.json in the synced working copy at {0} is missing or incomplete \
         (needs version, app_file, github_url)"
    )]
    IncompleteConfig(PathBuf),

    /// The packaging tool is not installed.
    #[error("pyinstaller was not found on PATH; install it to build the application bundle")]
    BuilderNotFound,

    /// The packaging tool ran and failed.
    #[error("pyinstaller failed with {0}")]
    BuildFailed(ExitStatus),

    /// The packaging tool could not be spawned.
    #[error("failed to run pyinstaller")]
    BuilderSpawn(#[source] std::io::Error),

    /// The bundle the builder should have produced is not on disk.
    #[error("built executable not found at {0}")]
    ExecutableMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
