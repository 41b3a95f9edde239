use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Packages the companion project's entry script into a runnable bundle.
/// Invoked at most once per launcher run, never speculatively.
pub trait Builder {
    /// Bundle `entry` into a self-contained directory under `dist`, using
    /// `work` for scratch artifacts. Any prior bundle at those paths is
    /// overwritten unconditionally; there is no incremental build.
    fn build(&self, entry: &Path, dist: &Path, work: &Path) -> Result<()>;
}

/// Real builder shelling out to the `pyinstaller` CLI.
pub struct PyInstaller;

impl Builder for PyInstaller {
    fn build(&self, entry: &Path, dist: &Path, work: &Path) -> Result<()> {
        // A missing entry file is a configuration error (the synced project
        // declared a file it does not ship), not an environment error.
        if !entry.is_file() {
            return Err(Error::MissingEntryFile(entry.to_path_buf()));
        }
        let tool = which::which("pyinstaller").map_err(|_| Error::BuilderNotFound)?;

        tracing::info!(entry = %entry.display(), dist = %dist.display(), "building bundle");
        let status = Command::new(tool)
            .arg(entry)
            .args(["--onedir", "--windowed"])
            .arg("--distpath")
            .arg(dist)
            .arg("--workpath")
            .arg(work)
            .arg("-y")
            .status()
            .map_err(Error::BuilderSpawn)?;

        if !status.success() {
            return Err(Error::BuildFailed(status));
        }
        Ok(())
    }
}
