use crate::config::Version;
use crate::error::Result;

/// Decide whether the local copy is stale relative to the remote.
///
/// A missing version on either side is treated as "unknown, assume stale":
/// the launcher would rather re-sync than silently run outdated code.
/// Non-numeric version text is a fatal input error and propagates.
pub fn needs_update(local: Option<&Version>, remote: Option<&Version>) -> Result<bool> {
    let (Some(local), Some(remote)) = (local, remote) else {
        return Ok(true);
    };
    Ok(local.as_number()? < remote.as_number()?)
}
