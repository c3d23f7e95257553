use crate::context::Context;
use crate::models::Project;
use crate::validate::{ValidationError, validate_project_name};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

/// Errors from repository reads.
#[derive(Error, Debug)]
pub enum RepoError {
    /// No candidate directory contained a usable repository checkout.
    #[error(
        "Fuzzing repository not found; set OSS_FUZZ_DIR or place an oss-fuzz checkout next to the working directory"
    )]
    RepositoryNotFound,

    /// The requested project, manifest, or directory does not exist on disk.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The manifest could not be interpreted as YAML.
    #[error("Failed to parse manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The manifest parsed but is not a key/value mapping.
    #[error("Manifest is not a mapping: {}", .0.display())]
    InvalidManifest(PathBuf),

    /// A malformed project-name input, rejected before any filesystem access.
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),

    #[error("Repository I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::Io(err.to_string())
    }
}

/// Optional criteria for [`find_projects`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Case-insensitive match against the manifest `language`.
    pub language: Option<String>,
    /// Exact membership test against the `sanitizers` sequence.
    pub sanitizer: Option<String>,
    /// Exact membership test against the `fuzzing_engines` sequence.
    pub fuzzing_engine: Option<String>,
}

impl ProjectFilter {
    fn matches(&self, project: &Project) -> bool {
        if let Some(language) = &self.language
            && !project.language.eq_ignore_ascii_case(language)
        {
            return false;
        }
        if let Some(sanitizer) = &self.sanitizer
            && !project.sanitizers.iter().any(|s| s == sanitizer)
        {
            return false;
        }
        if let Some(engine) = &self.fuzzing_engine
            && !project.fuzzing_engines.iter().any(|e| e == engine)
        {
            return false;
        }
        true
    }
}

/// Reads one project's manifest into a [`Project`] record.
///
/// The name is validated and normalized first. A missing manifest fails
/// with [`RepoError::NotFound`] naming the exact
/// `<root>/projects/<name>/project.yaml` path; a malformed manifest fails
/// with [`RepoError::Parse`].
pub fn get_project(ctx: &Context, project_name: &str) -> Result<Project, RepoError> {
    let name = validate_project_name(project_name)?;
    let root = ctx.require_root()?;
    let project_dir = root.join("projects").join(&name);
    load_project(&project_dir, &name)
}

/// Single-project read shared by [`get_project`] and [`list_projects`].
fn load_project(project_dir: &Path, name: &str) -> Result<Project, RepoError> {
    let manifest_path = project_dir.join("project.yaml");
    if !manifest_path.is_file() {
        return Err(RepoError::NotFound(manifest_path));
    }

    let text = fs::read_to_string(&manifest_path)
        .map_err(|e| RepoError::Io(format!("Failed to read {}: {e}", manifest_path.display())))?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| RepoError::Parse {
        path: manifest_path.clone(),
        source,
    })?;
    let config: Mapping = match value {
        Value::Mapping(mapping) => mapping,
        // Empty manifests are legal; every field has a default.
        Value::Null => Mapping::new(),
        _ => return Err(RepoError::InvalidManifest(manifest_path)),
    };

    let has_dockerfile = project_dir.join("Dockerfile").is_file();
    let has_build_script = project_dir.join("build.sh").is_file();

    Ok(Project::from_manifest(
        name,
        project_dir,
        config,
        has_dockerfile,
        has_build_script,
    ))
}

/// Reads every project under `<root>/projects`.
///
/// Partial-failure tolerance applies at the collection level: a project
/// whose manifest is missing or malformed is logged and skipped, never
/// aborting the whole listing. Results are ordered by project name.
pub fn list_projects(ctx: &Context) -> Result<Vec<Project>, RepoError> {
    let root = ctx.require_root()?;
    let projects_dir = root.join("projects");
    if !projects_dir.is_dir() {
        return Err(RepoError::NotFound(projects_dir));
    }

    let mut projects = Vec::new();
    for entry in fs::read_dir(&projects_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %projects_dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let project_dir = entry.path();
        if !project_dir.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match load_project(&project_dir, &name) {
            Ok(project) => projects.push(project),
            Err(e) => warn!(project = %name, error = %e, "skipping unreadable project"),
        }
    }
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

/// Names of every project directory under `<root>/projects`, sorted.
///
/// The listing is cached in the context and scanned at most once per
/// context lifetime; a restart (or a fresh context) invalidates it.
pub fn project_names(ctx: &Context) -> Result<Vec<String>, RepoError> {
    let root = ctx.require_root()?;
    let names = ctx.names_cache().get_or_init(|| scan_project_names(root));
    Ok(names.clone())
}

fn scan_project_names(root: &Path) -> Vec<String> {
    let projects_dir = root.join("projects");
    let entries = match fs::read_dir(&projects_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %projects_dir.display(), error = %e, "failed to list projects");
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Whether a project directory of this name exists. An invalid name is
/// reported as absent, not as an error.
pub fn project_exists(ctx: &Context, project_name: &str) -> bool {
    let Ok(name) = validate_project_name(project_name) else {
        return false;
    };
    match project_names(ctx) {
        Ok(names) => names.iter().any(|n| *n == name),
        Err(_) => false,
    }
}

/// Lists projects matching the given filter.
pub fn find_projects(ctx: &Context, filter: &ProjectFilter) -> Result<Vec<Project>, RepoError> {
    let projects = list_projects(ctx)?;
    Ok(projects
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect())
}

/// Dockerfile idioms that identify a build system. Ordered: `cmake` must
/// precede `make`, which it contains as a substring.
static BUILD_SYSTEM_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)cmake", "cmake"),
        (r"(?i)\./configure", "autoconf"),
        (r"(?i)autogen\.sh", "autoconf"),
        (r"(?i)\./bootstrap", "autoconf"),
        (r"(?i)meson", "meson"),
        (r"(?i)ninja", "ninja"),
        (r"(?i)bazel", "bazel"),
        (r"(?i)make", "make"),
        (r"(?i)pip\s+install", "pip"),
        (r"(?i)setup\.py", "setuptools"),
    ]
    .into_iter()
    .map(|(pattern, name)| {
        (
            Regex::new(pattern).expect("build system pattern is valid"),
            name,
        )
    })
    .collect()
});

/// Guesses the build system from the project's Dockerfile.
///
/// Returns `None` when there is no Dockerfile, when it cannot be read
/// (logged as a warning), or when no known idiom matches.
pub fn detect_build_system(ctx: &Context, project_name: &str) -> Result<Option<String>, RepoError> {
    let name = validate_project_name(project_name)?;
    let root = ctx.require_root()?;
    let dockerfile_path = root.join("projects").join(&name).join("Dockerfile");
    if !dockerfile_path.is_file() {
        return Ok(None);
    }

    let content = match fs::read_to_string(&dockerfile_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(project = %name, error = %e, "failed to read Dockerfile");
            return Ok(None);
        }
    };

    Ok(BUILD_SYSTEM_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(&content))
        .map(|(_, system)| (*system).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn repo_with_project(name: &str, manifest: &str) -> (TempDir, Context) {
        let dir = tempfile::tempdir().expect("tempdir");
        let project_dir = dir.path().join("projects").join(name);
        fs::create_dir_all(&project_dir).expect("project dir");
        fs::write(project_dir.join("project.yaml"), manifest).expect("manifest");
        let ctx = Context::with_root(dir.path());
        (dir, ctx)
    }

    #[test]
    fn get_project_reads_manifest_fields() {
        let (_dir, ctx) = repo_with_project(
            "curl",
            "language: c++\nsanitizers:\n  - address\nauto_ccs:\n  - dev@example.com\n",
        );
        let project = get_project(&ctx, "curl").expect("project should load");
        assert_eq!(project.name, "curl");
        assert_eq!(project.language, "c++");
        assert_eq!(project.sanitizers, vec!["address"]);
        assert_eq!(project.maintainers, vec!["dev@example.com"]);
        assert!(!project.has_dockerfile);
        assert!(!project.has_build_script);
    }

    #[test]
    fn get_project_detects_dockerfile_and_build_script() {
        let (dir, ctx) = repo_with_project("curl", "language: c\n");
        let project_dir = dir.path().join("projects").join("curl");
        fs::write(project_dir.join("Dockerfile"), "FROM base\n").unwrap();
        fs::write(project_dir.join("build.sh"), "#!/bin/bash\n").unwrap();

        let project = get_project(&ctx, "curl").unwrap();
        assert!(project.has_dockerfile);
        assert!(project.has_build_script);
    }

    #[test]
    fn get_project_missing_manifest_names_exact_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("projects")).unwrap();
        let ctx = Context::with_root(dir.path());

        let expected = dir
            .path()
            .join("projects")
            .join("ghost")
            .join("project.yaml");
        match get_project(&ctx, "ghost") {
            Err(RepoError::NotFound(path)) => assert_eq!(path, expected),
            other => panic!("expected NotFound({expected:?}), got {other:?}"),
        }
    }

    #[test]
    fn get_project_rejects_invalid_name_before_filesystem_access() {
        let ctx = Context::with_root("/nonexistent");
        assert!(matches!(
            get_project(&ctx, "Curl!"),
            Err(RepoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn get_project_tolerates_empty_manifest() {
        let (_dir, ctx) = repo_with_project("curl", "");
        let project = get_project(&ctx, "curl").unwrap();
        assert_eq!(project.language, "unknown");
        assert!(project.config.is_empty());
    }

    #[test]
    fn list_projects_skips_malformed_manifest() {
        let (dir, ctx) = repo_with_project("good", "language: c\n");
        let bad_dir = dir.path().join("projects").join("bad");
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join("project.yaml"), "language: [unclosed\n").unwrap();

        let projects = list_projects(&ctx).expect("listing should tolerate one bad project");
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn list_projects_skips_directory_without_manifest() {
        let (dir, ctx) = repo_with_project("good", "language: c\n");
        fs::create_dir_all(dir.path().join("projects").join("empty")).unwrap();

        let projects = list_projects(&ctx).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "good");
    }

    #[cfg(unix)]
    #[test]
    fn list_projects_tolerates_broken_entries() {
        let (dir, ctx) = repo_with_project("good", "language: c\n");
        std::os::unix::fs::symlink(
            dir.path().join("projects").join("gone"),
            dir.path().join("projects").join("dangling"),
        )
        .unwrap();

        let projects = list_projects(&ctx).expect("a broken entry must not abort the listing");
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn project_names_are_sorted_and_cached() {
        let (dir, ctx) = repo_with_project("zlib", "language: c\n");
        fs::create_dir_all(dir.path().join("projects").join("curl")).unwrap();

        let names = project_names(&ctx).unwrap();
        assert_eq!(names, vec!["curl", "zlib"]);

        // New directories are invisible to an already-populated cache.
        fs::create_dir_all(dir.path().join("projects").join("abc")).unwrap();
        let cached = project_names(&ctx).unwrap();
        assert_eq!(cached, vec!["curl", "zlib"]);
    }

    #[test]
    fn project_exists_handles_invalid_and_missing_names() {
        let (_dir, ctx) = repo_with_project("curl", "language: c\n");
        assert!(project_exists(&ctx, "curl"));
        assert!(!project_exists(&ctx, "ghost"));
        assert!(!project_exists(&ctx, "Not A Name!"));
    }

    #[test]
    fn find_projects_filters_language_case_insensitively() {
        let (dir, ctx) = repo_with_project("curl", "language: C++\n");
        let go_dir = dir.path().join("projects").join("gogo");
        fs::create_dir_all(&go_dir).unwrap();
        fs::write(go_dir.join("project.yaml"), "language: go\n").unwrap();

        let filter = ProjectFilter {
            language: Some("c++".to_string()),
            ..ProjectFilter::default()
        };
        let matched = find_projects(&ctx, &filter).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "curl");
    }

    #[test]
    fn find_projects_filters_sanitizer_exactly() {
        let (_dir, ctx) = repo_with_project(
            "curl",
            "language: c\nsanitizers:\n  - address\n  - undefined\n",
        );
        let hit = ProjectFilter {
            sanitizer: Some("address".to_string()),
            ..ProjectFilter::default()
        };
        let miss = ProjectFilter {
            sanitizer: Some("Address".to_string()),
            ..ProjectFilter::default()
        };
        assert_eq!(find_projects(&ctx, &hit).unwrap().len(), 1);
        assert!(find_projects(&ctx, &miss).unwrap().is_empty());
    }

    #[test]
    fn detect_build_system_prefers_cmake_over_make() {
        let (dir, ctx) = repo_with_project("curl", "language: c\n");
        let project_dir = dir.path().join("projects").join("curl");
        fs::write(
            project_dir.join("Dockerfile"),
            "RUN apt-get install -y make\nRUN cmake -S . -B build\n",
        )
        .unwrap();

        let system = detect_build_system(&ctx, "curl").unwrap();
        assert_eq!(system.as_deref(), Some("cmake"));
    }

    #[test]
    fn detect_build_system_without_dockerfile_is_none() {
        let (_dir, ctx) = repo_with_project("curl", "language: c\n");
        assert_eq!(detect_build_system(&ctx, "curl").unwrap(), None);
    }
}
