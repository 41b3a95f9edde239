use std::time::Duration;

use url::Url;

use crate::config::InstallConfig;

/// The only accepted repository host.
const FORGE_HOST: &str = "github.com";

/// Host serving raw file content for the forge.
const RAW_HOST: &str = "raw.githubusercontent.com";

/// Ref the metadata document is published under.
const DEFAULT_BRANCH_REF: &str = "refs/heads/master";

/// Timeout for the metadata fetch. The remote is the only unreliable party
/// in the whole sequence, so it is the only step with a deadline.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of remote metadata documents. The orchestrator depends on this
/// seam rather than on a concrete transport.
pub trait RemoteConfig {
    /// Fetch the companion project's published metadata.
    ///
    /// Fails soft: an invalid URL, a transport error, a non-success status,
    /// or an unparseable body all yield `None`.
    fn fetch(&self, repo_url: &str) -> Option<InstallConfig>;
}

/// Validate a repository URL of the shape
/// `https://github.com/<owner>/<project>[/]`.
///
/// Owner and project are restricted to letters, digits, `_`, `.` and `-`.
/// Empty strings are rejected before any parsing.
pub fn validate_repo_url(raw: &str) -> bool {
    if raw.is_empty() {
        return false;
    }
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if url.scheme() != "https" || url.host_str() != Some(FORGE_HOST) {
        return false;
    }
    if url.query().is_some() || url.fragment().is_some() {
        return false;
    }
    let Some(segments) = url.path_segments() else {
        return false;
    };
    // A trailing slash produces one empty trailing segment; drop it.
    let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
    segments.len() == 2 && segments.iter().all(|s| is_valid_segment(s))
}

fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Derive the raw-content URL of the remote metadata document from a
/// repository URL, using its last two path segments as owner and project.
///
/// Returns `None` when the URL does not validate or has fewer than two
/// segments.
pub fn raw_config_url(repo_url: &str) -> Option<String> {
    if !validate_repo_url(repo_url) {
        return None;
    }
    let url = Url::parse(repo_url).ok()?;
    let segments: Vec<String> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segments.len() < 2 {
        return None;
    }
    let owner = &segments[segments.len() - 2];
    let project = &segments[segments.len() - 1];
    Some(format!(
        "https://{RAW_HOST}/{owner}/{project}/{DEFAULT_BRANCH_REF}/{}",
        crate::config::CONFIG_FILE
    ))
}

/// Fetches the metadata document over HTTPS with a bounded timeout.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(FETCH_TIMEOUT)
            .build();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteConfig for HttpFetcher {
    fn fetch(&self, repo_url: &str) -> Option<InstallConfig> {
        let config_url = raw_config_url(repo_url)?;
        tracing::debug!(url = %config_url, "fetching remote metadata");

        // ureq returns Err for transport failures and non-2xx statuses alike;
        // both are soft failures here.
        let response = self
            .agent
            .get(&config_url)
            .set("Accept", "application/json")
            .call()
            .ok()?;
        response.into_json::<InstallConfig>().ok()
    }
}
