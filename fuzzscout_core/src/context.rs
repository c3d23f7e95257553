use crate::repo::RepoError;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Environment override for the repository root. When set and pointing at
/// a valid checkout it takes precedence over every probed candidate.
pub const REPO_DIR_ENV: &str = "OSS_FUZZ_DIR";

/// Environment variable naming a service credential file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Subdirectory whose presence marks a directory as a usable repository root.
const ROOT_MARKER: &str = "projects";

/// Directory name probed at each candidate location.
const REPO_DIR_NAME: &str = "oss-fuzz";

/// Shared, lazily-resolved handle to the local fuzzing repository and
/// remote-service credential availability.
///
/// A `Context` is probed once and passed into every component entry point;
/// it never re-probes. [`Context::global`] provides the documented
/// process-wide default instance, assembled on first use. The discovered
/// project-name list is cached inside the context: populated at most once
/// and never mutated afterwards, so concurrent readers need no locking.
#[derive(Debug)]
pub struct Context {
    repo_root: Option<PathBuf>,
    has_credentials: bool,
    project_names: OnceLock<Vec<String>>,
}

impl Context {
    /// Probes the fixed, ordered candidate list for a repository root and
    /// checks for service credentials.
    ///
    /// Candidates, in precedence order: the [`REPO_DIR_ENV`] override, the
    /// current working directory, its parent, the user's home directory,
    /// and the system temp directory. The first candidate containing a
    /// `projects/` subdirectory wins.
    pub fn discover() -> Self {
        let repo_root = find_repo_root();
        let has_credentials = check_credentials();

        match &repo_root {
            Some(root) => info!(root = %root.display(), "using fuzzing repository"),
            None => warn!("fuzzing repository not found; repository operations will fail"),
        }
        if has_credentials {
            info!("service credentials found; remote integration enabled");
        } else {
            debug!("service credentials not found; remote operations degrade to placeholders");
        }

        Self {
            repo_root,
            has_credentials,
            project_names: OnceLock::new(),
        }
    }

    /// Builds a context anchored at an explicit repository root, skipping
    /// the candidate probe. Credential availability is still probed.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: Some(root.into()),
            has_credentials: check_credentials(),
            project_names: OnceLock::new(),
        }
    }

    /// The process-wide default context, assembled once at first use.
    pub fn global() -> &'static Context {
        static GLOBAL: OnceLock<Context> = OnceLock::new();
        GLOBAL.get_or_init(Context::discover)
    }

    pub fn repo_root(&self) -> Option<&Path> {
        self.repo_root.as_deref()
    }

    pub fn has_credentials(&self) -> bool {
        self.has_credentials
    }

    /// Resolves the repository root or fails with a NotFound condition.
    pub fn require_root(&self) -> Result<&Path, RepoError> {
        self.repo_root
            .as_deref()
            .ok_or(RepoError::RepositoryNotFound)
    }

    pub(crate) fn names_cache(&self) -> &OnceLock<Vec<String>> {
        &self.project_names
    }
}

fn find_repo_root() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = std::env::var_os(REPO_DIR_ENV) {
        candidates.push(PathBuf::from(dir));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(REPO_DIR_NAME));
        if let Some(parent) = cwd.parent() {
            candidates.push(parent.join(REPO_DIR_NAME));
        }
    }
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(REPO_DIR_NAME));
    }
    candidates.push(std::env::temp_dir().join(REPO_DIR_NAME));

    candidates
        .into_iter()
        .find(|candidate| candidate.is_dir() && candidate.join(ROOT_MARKER).is_dir())
}

/// Probes for service credentials: the [`CREDENTIALS_ENV`] file override
/// first, then the default application-credentials path under the user's
/// config directory.
fn check_credentials() -> bool {
    if let Some(path) = std::env::var_os(CREDENTIALS_ENV)
        && Path::new(&path).is_file()
    {
        return true;
    }
    if let Some(home) = std::env::var_os("HOME") {
        let default_creds = PathBuf::from(home)
            .join(".config")
            .join("gcloud")
            .join("application_default_credentials.json");
        if default_creds.is_file() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn with_root_anchors_at_explicit_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("projects")).expect("marker dir");

        let ctx = Context::with_root(dir.path());
        assert_eq!(ctx.repo_root(), Some(dir.path()));
        assert_eq!(ctx.require_root().unwrap(), dir.path());
    }

    #[test]
    fn require_root_fails_without_repository() {
        let ctx = Context {
            repo_root: None,
            has_credentials: false,
            project_names: OnceLock::new(),
        };
        assert!(matches!(
            ctx.require_root(),
            Err(RepoError::RepositoryNotFound)
        ));
    }

    #[test]
    fn names_cache_populates_at_most_once() {
        let ctx = Context::with_root("/nonexistent");
        let first = ctx
            .names_cache()
            .get_or_init(|| vec!["curl".to_string()])
            .as_ptr();
        let second = ctx
            .names_cache()
            .get_or_init(|| vec!["other".to_string()])
            .as_ptr();
        assert_eq!(first, second, "cache should never be repopulated");
    }
}
