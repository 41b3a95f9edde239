use std::path::{Path, PathBuf};

use crate::install::DIST_DIR;

/// Executable suffix per normalized platform identifier. Platforms without
/// an entry get no suffix; adding a platform is a one-line addition.
const EXE_SUFFIXES: &[(&str, &str)] = &[("windows", ".exe")];

fn exe_suffix(os: &str) -> &'static str {
    EXE_SUFFIXES
        .iter()
        .find(|&&(name, _)| name == os)
        .map_or("", |&(_, suffix)| suffix)
}

/// Compute the path of the built executable for the current platform:
/// `<root>/dist/<base>/<base>[.exe]` where `base` is the entry filename
/// minus its script extension.
///
/// Pure; whether the path exists is the caller's concern.
pub fn executable_path(root: &Path, entry_file: &str) -> PathBuf {
    executable_path_for_os(root, entry_file, std::env::consts::OS)
}

/// [`executable_path`] with the platform made explicit.
pub fn executable_path_for_os(root: &Path, entry_file: &str, os: &str) -> PathBuf {
    let base = bundle_base_name(entry_file);
    root.join(DIST_DIR)
        .join(&base)
        .join(format!("{base}{}", exe_suffix(os)))
}

/// The bundle name PyInstaller derives from an entry script: the file name
/// without its final extension.
fn bundle_base_name(entry_file: &str) -> String {
    let file_name = Path::new(entry_file)
        .file_name()
        .map_or(entry_file, |n| n.to_str().unwrap_or(entry_file));
    match file_name.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base.to_string(),
        _ => file_name.to_string(),
    }
}
