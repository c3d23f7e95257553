use crate::context::Context;
use crate::extract;
use crate::models::{ExecutionStatus, FuzzingExecution};
use crate::repo::RepoError;
use crate::validate::{ValidationError, validate_project_name};
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Carried on every outcome produced without real infrastructure access.
const SIMULATION_WARNING: &str =
    "Simulated result; real execution requires the fuzzing build infrastructure";

const SIMULATED_EXECS_PER_SEC: u64 = 1000;
const SIMULATED_PEAK_RSS: u64 = 100 * 1024 * 1024;
const SIMULATED_LINE_COVERAGE: f64 = 75.5;
const SIMULATED_FUNCTION_COVERAGE: f64 = 82.3;
const SIMULATED_BRANCH_COVERAGE: f64 = 68.7;

const DEFAULT_DURATION_SECS: u64 = 60;

/// Errors from setting up, running, or analyzing a (simulated) session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("Fuzz target binary not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("Corpus directory not found: {}", .0.display())]
    CorpusDirNotFound(PathBuf),

    #[error("Results directory not found: {}", .0.display())]
    ResultsDirNotFound(PathBuf),

    #[error("Session I/O error: {0}")]
    Io(String),

    #[error("Session serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Options for [`setup_local_fuzzing`].
#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Target to set up; the first discovered target when unset.
    pub fuzz_target: Option<String>,
    /// Where build outputs land; `<cwd>/<project>_fuzzing` when unset.
    pub output_dir: Option<PathBuf>,
    pub architecture: String,
    pub sanitizer: String,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            fuzz_target: None,
            output_dir: None,
            architecture: "x86_64".to_string(),
            sanitizer: "address".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupOutcome {
    pub project: String,
    pub fuzz_target: String,
    pub fuzz_target_path: PathBuf,
    pub available_targets: Vec<String>,
    pub setup_dir: PathBuf,
    pub architecture: String,
    pub sanitizer: String,
    pub warning: Option<String>,
}

/// Prepares a local fuzzing directory for a project.
///
/// The written "binary" is a placeholder script; actual builds are out of
/// scope and every outcome says so through its `warning` field.
pub fn setup_local_fuzzing(
    ctx: &Context,
    project_name: &str,
    opts: &SetupOptions,
) -> Result<SetupOutcome, SessionError> {
    let name = validate_project_name(project_name)?;
    let targets = extract::targets_for_project(ctx, &name)?;
    let available_targets: Vec<String> = targets.into_iter().map(|t| t.name).collect();

    // Extraction guarantees at least one target, so first() cannot miss.
    let fuzz_target = match &opts.fuzz_target {
        Some(target) => target.clone(),
        None => available_targets[0].clone(),
    };

    let setup_dir = match &opts.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(format!("{name}_fuzzing")),
    };
    fs::create_dir_all(&setup_dir)?;

    let fuzz_target_path = setup_dir.join(&fuzz_target);
    fs::write(
        &fuzz_target_path,
        "#!/bin/bash\necho 'placeholder fuzz target binary'\n",
    )?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&fuzz_target_path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(SetupOutcome {
        project: name,
        fuzz_target,
        fuzz_target_path,
        available_targets,
        setup_dir,
        architecture: opts.architecture.clone(),
        sanitizer: opts.sanitizer.clone(),
        warning: Some(SIMULATION_WARNING.to_string()),
    })
}

/// Parameters of one fuzzing run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project: String,
    /// Path to the target binary produced by setup.
    pub fuzz_target: PathBuf,
    pub corpus_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub duration_secs: u64,
    pub max_memory_mb: Option<u64>,
    pub environment_vars: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new(project: impl Into<String>, fuzz_target: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            fuzz_target: fuzz_target.into(),
            corpus_dir: None,
            output_dir: None,
            duration_secs: DEFAULT_DURATION_SECS,
            max_memory_mb: None,
            environment_vars: BTreeMap::new(),
        }
    }
}

/// Session statistics persisted alongside run outputs as
/// `fuzzing_stats.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzingStats {
    pub start_time: String,
    pub end_time: String,
    pub executions: u64,
    pub crashes: u64,
    pub unique_crashes: u64,
    pub peak_rss: u64,
    pub average_exec_per_sec: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub execution: FuzzingExecution,
    pub stats_path: PathBuf,
    pub warning: Option<String>,
}

/// Runs a fuzzing session — simulated: counters are fabricated at a fixed
/// execution rate, no process is spawned, and the stats file is written so
/// [`analyze_results`] has something real to read.
pub fn run_local_fuzzing(request: &RunRequest) -> Result<RunOutcome, SessionError> {
    let name = validate_project_name(&request.project)?;
    if !request.fuzz_target.is_file() {
        return Err(SessionError::TargetNotFound(request.fuzz_target.clone()));
    }

    let output_dir = match &request.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(format!("{name}_fuzzing_output")),
    };
    fs::create_dir_all(&output_dir)?;

    let corpus_dir = match &request.corpus_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(format!("{name}_corpus")),
    };
    fs::create_dir_all(&corpus_dir)?;

    let start_time = Utc::now();
    let end_time = start_time + TimeDelta::seconds(request.duration_secs as i64);
    let executions = request.duration_secs * SIMULATED_EXECS_PER_SEC;

    let target_name = request
        .fuzz_target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.fuzz_target.to_string_lossy().into_owned());

    let mut execution = FuzzingExecution::new(&name, target_name, start_time, Some(end_time));
    execution.corpus_dir = Some(corpus_dir);
    execution.output_dir = Some(output_dir.clone());
    execution.max_memory = request.max_memory_mb;
    execution.executions = executions;
    execution.environment_vars = request.environment_vars.clone();
    execution.status = ExecutionStatus::Completed;

    let stats = FuzzingStats {
        start_time: start_time.to_rfc3339(),
        end_time: end_time.to_rfc3339(),
        executions,
        crashes: 0,
        unique_crashes: 0,
        peak_rss: SIMULATED_PEAK_RSS,
        average_exec_per_sec: executions as f64 / request.duration_secs.max(1) as f64,
    };
    let stats_path = output_dir.join("fuzzing_stats.json");
    fs::write(&stats_path, serde_json::to_string_pretty(&stats)?)?;

    Ok(RunOutcome {
        execution,
        stats_path,
        warning: Some(SIMULATION_WARNING.to_string()),
    })
}

/// What [`analyze_results`] finds in a results directory.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub stats: Option<FuzzingStats>,
    pub crash_files: Vec<String>,
    pub crash_count: usize,
}

/// Inspects a results directory: reads `fuzzing_stats.json` when present
/// and counts files under `crashes/`. A stats file that fails to parse is
/// logged and treated as absent.
pub fn analyze_results(results_dir: &Path) -> Result<Analysis, SessionError> {
    if !results_dir.is_dir() {
        return Err(SessionError::ResultsDirNotFound(results_dir.to_path_buf()));
    }

    let stats_path = results_dir.join("fuzzing_stats.json");
    let stats = if stats_path.is_file() {
        let text = fs::read_to_string(&stats_path)?;
        match serde_json::from_str::<FuzzingStats>(&text) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(path = %stats_path.display(), error = %e, "unreadable stats file");
                None
            }
        }
    } else {
        None
    };

    let crash_dir = results_dir.join("crashes");
    let mut crash_files: Vec<String> = Vec::new();
    if crash_dir.is_dir() {
        for entry in fs::read_dir(&crash_dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                crash_files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        crash_files.sort();
    }
    let crash_count = crash_files.len();

    Ok(Analysis {
        stats,
        crash_files,
        crash_count,
    })
}

/// Parameters of one coverage collection pass over a corpus.
#[derive(Debug, Clone)]
pub struct CoverageRequest {
    pub project: String,
    pub fuzz_target: PathBuf,
    pub corpus_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageOutcome {
    pub project: String,
    pub fuzz_target: String,
    pub corpus_files: usize,
    pub line_coverage: f64,
    pub function_coverage: f64,
    pub branch_coverage: f64,
    pub report_path: PathBuf,
    pub warning: Option<String>,
}

/// Collects coverage over a corpus — simulated: the corpus file count is
/// real, the percentages are fixed representative values, and a stub HTML
/// report is written.
pub fn collect_coverage(request: &CoverageRequest) -> Result<CoverageOutcome, SessionError> {
    let name = validate_project_name(&request.project)?;
    if !request.fuzz_target.is_file() {
        return Err(SessionError::TargetNotFound(request.fuzz_target.clone()));
    }
    if !request.corpus_dir.is_dir() {
        return Err(SessionError::CorpusDirNotFound(request.corpus_dir.clone()));
    }

    let corpus_files = fs::read_dir(&request.corpus_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .count();

    let output_dir = match &request.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(format!("{name}_coverage")),
    };
    fs::create_dir_all(&output_dir)?;

    let report_path = output_dir.join("coverage_report.html");
    fs::write(
        &report_path,
        "<html><body><h1>Sample Coverage Report</h1></body></html>",
    )?;

    let fuzz_target = request
        .fuzz_target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.fuzz_target.to_string_lossy().into_owned());

    Ok(CoverageOutcome {
        project: name,
        fuzz_target,
        corpus_files,
        line_coverage: SIMULATED_LINE_COVERAGE,
        function_coverage: SIMULATED_FUNCTION_COVERAGE,
        branch_coverage: SIMULATED_BRANCH_COVERAGE,
        report_path,
        warning: Some(SIMULATION_WARNING.to_string()),
    })
}
