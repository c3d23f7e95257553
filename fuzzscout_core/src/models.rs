use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One fuzzed project as described by its `project.yaml` manifest.
///
/// A `Project` is constructed from a parsed manifest plus filesystem
/// presence checks and is immutable afterwards. The manifest file stays
/// the source of truth; re-reading it produces a fresh record.
///
/// Collection fields are always concrete containers. Downstream code may
/// iterate `sanitizers`, `fuzzing_engines`, `architectures` and
/// `maintainers` without checking for absence.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    /// Unique project identifier, lowercase `[a-z0-9_-]+`.
    pub name: String,
    /// Directory holding the manifest and build scripts.
    pub path: PathBuf,
    /// Declared implementation language, `"unknown"` when the manifest omits it.
    pub language: String,
    /// Upstream repository URL, if declared.
    pub main_repo: Option<String>,
    pub sanitizers: Vec<String>,
    pub fuzzing_engines: Vec<String>,
    pub architectures: Vec<String>,
    /// Contact addresses, sourced from the manifest's `auto_ccs` key.
    pub maintainers: Vec<String>,
    pub has_dockerfile: bool,
    pub has_build_script: bool,
    /// The raw manifest mapping, retained for keys not otherwise modeled.
    pub config: Mapping,
}

impl Project {
    /// Builds a `Project` from a parsed manifest mapping.
    ///
    /// Every manifest key is optional: missing scalars fall back to the
    /// documented defaults and missing sequences become empty vectors.
    pub fn from_manifest(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        config: Mapping,
        has_dockerfile: bool,
        has_build_script: bool,
    ) -> Self {
        let language =
            string_field(&config, "language").unwrap_or_else(|| "unknown".to_string());
        let main_repo = string_field(&config, "main_repo");
        let sanitizers = string_list(&config, "sanitizers");
        let fuzzing_engines = string_list(&config, "fuzzing_engines");
        let architectures = string_list(&config, "architectures");
        let maintainers = string_list(&config, "auto_ccs");

        Self {
            name: name.into(),
            path: path.into(),
            language,
            main_repo,
            sanitizers,
            fuzzing_engines,
            architectures,
            maintainers,
            has_dockerfile,
            has_build_script,
            config,
        }
    }
}

fn string_field(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(|v| match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        _ => None,
    })
}

/// Collects a manifest sequence of strings, tolerating scalar entries of
/// other YAML types by skipping them.
fn string_list(map: &Mapping, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                serde_yaml::Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// One fuzz entry point belonging to exactly one [`Project`].
///
/// The owning project is referenced by name (a stable key), never by a
/// cyclic back-pointer. Equality for de-duplication purposes is by `name`
/// only.
#[derive(Debug, Clone, Serialize)]
pub struct FuzzTarget {
    /// Binary / entry-point identifier.
    pub name: String,
    /// Name of the owning project.
    pub project: String,
    /// Build script the name was extracted from, absent when no script existed.
    pub build_script: Option<PathBuf>,
    /// Present in the schema; not populated by the current extraction logic.
    pub source_files: Vec<PathBuf>,
    pub dependencies: Vec<String>,
    pub environment_vars: BTreeMap<String, String>,
}

impl FuzzTarget {
    /// Creates a target with all optional collections set to empty containers.
    pub fn new(name: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            build_script: None,
            source_files: Vec::new(),
            dependencies: Vec::new(),
            environment_vars: BTreeMap::new(),
        }
    }

    pub fn with_build_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.build_script = Some(script.into());
        self
    }
}

impl PartialEq for FuzzTarget {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FuzzTarget {}

/// Terminal and non-terminal states of a fuzzing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// Record of one (simulated) fuzzing run against a single target.
#[derive(Debug, Clone, Serialize)]
pub struct FuzzingExecution {
    pub project: String,
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub corpus_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// Wall-clock duration in whole seconds.
    pub duration: i64,
    /// Peak memory ceiling in MB, when one was requested.
    pub max_memory: Option<u64>,
    pub executions: u64,
    pub crashes: u64,
    pub unique_crashes: u64,
    pub coverage: f64,
    pub environment_vars: BTreeMap<String, String>,
    pub status: ExecutionStatus,
}

impl FuzzingExecution {
    /// Creates an execution record.
    ///
    /// `end_time` defaults to now when unset, and `duration` to the
    /// computed start/end delta in seconds.
    pub fn new(
        project: impl Into<String>,
        target: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        let end_time = end_time.unwrap_or_else(Utc::now);
        let duration = (end_time - start_time).num_seconds();
        Self {
            project: project.into(),
            target: target.into(),
            start_time,
            end_time,
            corpus_dir: None,
            output_dir: None,
            duration,
            max_memory: None,
            executions: 0,
            crashes: 0,
            unique_crashes: 0,
            coverage: 0.0,
            environment_vars: BTreeMap::new(),
            status: ExecutionStatus::Running,
        }
    }
}

/// Coverage metrics for a project on a given date.
///
/// Percentage fields are conceptually in `[0, 100]`. The line/function
/// detail sequences default to empty containers.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub project: String,
    pub date: NaiveDate,
    pub line_coverage: f64,
    pub function_coverage: f64,
    pub overall_coverage: f64,
    pub covered_lines: Vec<u64>,
    pub covered_functions: Vec<String>,
    pub uncovered_lines: Vec<u64>,
    pub uncovered_functions: Vec<String>,
}

impl CoverageReport {
    pub fn new(
        project: impl Into<String>,
        date: NaiveDate,
        line_coverage: f64,
        function_coverage: f64,
        overall_coverage: f64,
    ) -> Self {
        Self {
            project: project.into(),
            date,
            line_coverage,
            function_coverage,
            overall_coverage,
            covered_lines: Vec::new(),
            covered_functions: Vec::new(),
            uncovered_lines: Vec::new(),
            uncovered_functions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn manifest(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).expect("test manifest should parse")
    }

    #[test]
    fn project_from_manifest_populates_known_keys() {
        let config = manifest(
            r#"
language: c++
main_repo: "https://github.com/curl/curl"
sanitizers:
  - address
  - undefined
fuzzing_engines:
  - libfuzzer
auto_ccs:
  - dev@example.com
"#,
        );
        let project =
            Project::from_manifest("curl", "/repo/projects/curl", config, true, true);

        assert_eq!(project.language, "c++");
        assert_eq!(
            project.main_repo.as_deref(),
            Some("https://github.com/curl/curl")
        );
        assert_eq!(project.sanitizers, vec!["address", "undefined"]);
        assert_eq!(project.fuzzing_engines, vec!["libfuzzer"]);
        assert_eq!(project.maintainers, vec!["dev@example.com"]);
        assert!(project.has_dockerfile);
        assert!(project.has_build_script);
    }

    #[test]
    fn project_from_empty_manifest_uses_defaults() {
        let project =
            Project::from_manifest("curl", "/repo/projects/curl", Mapping::new(), false, false);

        assert_eq!(project.language, "unknown");
        assert!(project.main_repo.is_none());
        assert!(project.sanitizers.is_empty());
        assert!(project.fuzzing_engines.is_empty());
        assert!(project.architectures.is_empty());
        assert!(project.maintainers.is_empty());
        assert!(project.config.is_empty());
    }

    #[test]
    fn fuzz_target_equality_is_by_name_only() {
        let a = FuzzTarget::new("url_fuzzer", "curl");
        let b = FuzzTarget::new("url_fuzzer", "other_project")
            .with_build_script("/repo/projects/other_project/build.sh");
        assert_eq!(a, b, "targets with the same name should compare equal");
    }

    #[test]
    fn execution_defaults_end_time_and_duration() {
        let start = Utc::now() - TimeDelta::seconds(90);
        let execution = FuzzingExecution::new("curl", "curl_fuzzer", start, None);
        assert!(
            execution.duration >= 90,
            "duration should cover the elapsed delta, got {}",
            execution.duration
        );
        assert!(execution.environment_vars.is_empty());
        assert_eq!(execution.status, ExecutionStatus::Running);
    }

    #[test]
    fn execution_duration_uses_explicit_end_time() {
        let start = Utc::now();
        let end = start + TimeDelta::seconds(300);
        let execution = FuzzingExecution::new("curl", "curl_fuzzer", start, Some(end));
        assert_eq!(execution.duration, 300);
    }

    #[test]
    fn coverage_report_sequences_default_empty() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
        let report = CoverageReport::new("curl", date, 82.1, 89.3, 76.5);
        assert!(report.covered_lines.is_empty());
        assert!(report.uncovered_functions.is_empty());
    }
}
