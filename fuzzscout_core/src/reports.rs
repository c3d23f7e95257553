use crate::context::Context;
use crate::validate::{DateRange, ValidationError, parse_date, validate_date_range,
    validate_fuzz_target, validate_project_name};
use chrono::{NaiveDate, TimeDelta};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Carried on every report fabricated without service access.
const SERVICE_WARNING: &str =
    "Access to real historical data requires fuzzing service credentials; returning placeholder data";

const SAMPLE_CORPUS_FILES: usize = 5;
const SAMPLE_CORPUS_FILE_LEN: usize = 100;

/// Errors from the historical-report operations.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),

    #[error("Report I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err.to_string())
    }
}

/// Fabricated coverage numbers for one day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyCoverage {
    pub date: NaiveDate,
    pub line_coverage: f64,
    pub function_coverage: f64,
    pub overall_coverage: f64,
}

/// Coverage over a date range: one row per day plus range-wide means.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageHistory {
    pub project: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub overall_coverage: f64,
    pub line_coverage: f64,
    pub function_coverage: f64,
    pub daily_coverage: Vec<DailyCoverage>,
    pub warning: Option<String>,
}

/// Seeds the placeholder RNG from a digest of the key so fabricated data
/// is stable per project across calls and processes.
fn placeholder_rng(key: &str) -> ChaCha8Rng {
    let digest = md5::compute(key.as_bytes());
    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(&digest.0);
    seed[16..].copy_from_slice(&digest.0);
    ChaCha8Rng::from_seed(seed)
}

/// Fetches coverage history for a project and date range.
///
/// Without service credentials (the only supported mode) the daily series
/// is fabricated deterministically per project; the result is still
/// well-formed and carries an explanatory warning instead of failing.
pub fn coverage_history(
    ctx: &Context,
    project_name: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<CoverageHistory, ReportError> {
    let name = validate_project_name(project_name)?;
    let range: DateRange = validate_date_range(start_date, end_date)?;

    let mut rng = placeholder_rng(&name);
    let mut daily_coverage = Vec::with_capacity(range.days() as usize);
    let mut day = range.start;
    while day <= range.end {
        daily_coverage.push(DailyCoverage {
            date: day,
            line_coverage: rng.random_range(60.0..85.0),
            function_coverage: rng.random_range(70.0..95.0),
            overall_coverage: rng.random_range(65.0..80.0),
        });
        day = day + TimeDelta::days(1);
    }

    let count = daily_coverage.len().max(1) as f64;
    let line_coverage = daily_coverage.iter().map(|d| d.line_coverage).sum::<f64>() / count;
    let function_coverage =
        daily_coverage.iter().map(|d| d.function_coverage).sum::<f64>() / count;
    let overall_coverage =
        daily_coverage.iter().map(|d| d.overall_coverage).sum::<f64>() / count;

    let warning = if ctx.has_credentials() {
        None
    } else {
        Some(SERVICE_WARNING.to_string())
    };

    Ok(CoverageHistory {
        project: name,
        start_date: range.start,
        end_date: range.end,
        overall_coverage,
        line_coverage,
        function_coverage,
        daily_coverage,
        warning,
    })
}

/// One crash entry as the service would report it. The schema exists for
/// consumers; without service access no entries are ever populated.
#[derive(Debug, Clone, Serialize)]
pub struct CrashRecord {
    pub id: String,
    pub fuzzer: String,
    pub date: NaiveDate,
    pub kind: String,
    pub status: String,
    pub fixed: bool,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrashHistory {
    pub project: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_crashes: u64,
    pub unique_crashes: u64,
    pub crashes: Vec<CrashRecord>,
    pub warning: Option<String>,
}

/// Fetches crash reports for a project and date range. Degrades to an
/// empty, well-formed history when no service is reachable.
pub fn crash_reports(
    _ctx: &Context,
    project_name: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<CrashHistory, ReportError> {
    let name = validate_project_name(project_name)?;
    let range = validate_date_range(start_date, end_date)?;

    Ok(CrashHistory {
        project: name,
        start_date: range.start,
        end_date: range.end,
        total_crashes: 0,
        unique_crashes: 0,
        crashes: Vec::new(),
        warning: Some(SERVICE_WARNING.to_string()),
    })
}

/// Pointer to a hosted per-date coverage report.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReportRef {
    pub project: String,
    /// `YYYY-MM-DD` or `"latest"`.
    pub date: String,
    pub report_url: String,
    pub download_path: Option<PathBuf>,
    pub warning: Option<String>,
}

/// Builds the reference to a project's hosted coverage report for a date
/// (latest when unset), optionally creating a local download directory.
pub fn coverage_report_link(
    _ctx: &Context,
    project_name: &str,
    report_date: Option<&str>,
    download_dir: Option<&Path>,
) -> Result<CoverageReportRef, ReportError> {
    let name = validate_project_name(project_name)?;
    let date = match report_date {
        Some(raw) => parse_date(raw)?.to_string(),
        None => "latest".to_string(),
    };
    let report_url = format!("https://oss-fuzz.com/coverage-report/{name}/{date}/index.html");

    let download_path = match download_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            Some(dir.to_path_buf())
        }
        None => None,
    };

    Ok(CoverageReportRef {
        project: name,
        date,
        report_url,
        download_path,
        warning: Some(SERVICE_WARNING.to_string()),
    })
}

/// Pointer to a project's hosted statistics page.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub project: String,
    pub stats_url: String,
    pub warning: Option<String>,
}

/// Fetches project-level statistics. Without service access the record
/// carries only the hosted stats URL and a warning.
pub fn project_stats(_ctx: &Context, project_name: &str) -> Result<ProjectStats, ReportError> {
    let name = validate_project_name(project_name)?;
    let stats_url = format!("https://oss-fuzz.com/stats/{name}");

    Ok(ProjectStats {
        project: name,
        stats_url,
        warning: Some(SERVICE_WARNING.to_string()),
    })
}

/// One build-status entry as the service would report it.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRecord {
    pub project: String,
    pub build_url: String,
    pub warning: Option<String>,
}

/// Fetches recent build statuses for a project, newest first, capped at
/// `limit`. Degrades to a single placeholder record pointing at the
/// hosted build-status page.
pub fn project_builds(
    _ctx: &Context,
    project_name: &str,
    limit: usize,
) -> Result<Vec<BuildRecord>, ReportError> {
    let name = validate_project_name(project_name)?;
    let build_url = format!("https://oss-fuzz.com/build-status/{name}");

    let mut builds = vec![BuildRecord {
        project: name,
        build_url,
        warning: Some(SERVICE_WARNING.to_string()),
    }];
    builds.truncate(limit);
    Ok(builds)
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusDownload {
    pub project: String,
    pub fuzzer: String,
    pub output_dir: PathBuf,
    pub files_created: usize,
    pub warning: Option<String>,
}

/// Downloads the corpus for a project/fuzzer pair — simulated: the output
/// directory is created and seeded with a handful of sample files whose
/// bytes are stable per project/fuzzer pair.
pub fn download_corpus(
    _ctx: &Context,
    project_name: &str,
    fuzzer_name: &str,
    output_dir: Option<PathBuf>,
) -> Result<CorpusDownload, ReportError> {
    let name = validate_project_name(project_name)?;
    let fuzzer = validate_fuzz_target(fuzzer_name)?;

    let output_dir = match output_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?.join(format!("{name}_{fuzzer}_corpus")),
    };
    fs::create_dir_all(&output_dir)?;

    let mut rng = placeholder_rng(&format!("{name}/{fuzzer}"));
    for i in 0..SAMPLE_CORPUS_FILES {
        let mut data = vec![0u8; SAMPLE_CORPUS_FILE_LEN];
        rng.fill(data.as_mut_slice());
        fs::write(output_dir.join(format!("sample_{i}")), &data)?;
    }

    Ok(CorpusDownload {
        project: name,
        fuzzer,
        output_dir,
        files_created: SAMPLE_CORPUS_FILES,
        warning: Some(SERVICE_WARNING.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::with_root("/nonexistent")
    }

    #[test]
    fn coverage_history_covers_every_day_inclusive() {
        let history =
            coverage_history(&ctx(), "curl", Some("2023-01-01"), Some("2023-01-31")).unwrap();
        assert_eq!(history.daily_coverage.len(), 31);
        assert_eq!(history.daily_coverage[0].date.to_string(), "2023-01-01");
        assert_eq!(history.daily_coverage[30].date.to_string(), "2023-01-31");
    }

    #[test]
    fn coverage_history_is_deterministic_per_project() {
        let a = coverage_history(&ctx(), "curl", Some("2023-01-01"), Some("2023-01-07")).unwrap();
        let b = coverage_history(&ctx(), "curl", Some("2023-01-01"), Some("2023-01-07")).unwrap();
        let c = coverage_history(&ctx(), "zlib", Some("2023-01-01"), Some("2023-01-07")).unwrap();

        assert_eq!(a.daily_coverage[0].line_coverage, b.daily_coverage[0].line_coverage);
        assert_ne!(
            a.daily_coverage[0].line_coverage,
            c.daily_coverage[0].line_coverage,
            "different projects should fabricate different series"
        );
    }

    #[test]
    fn coverage_history_values_stay_in_documented_bands() {
        let history =
            coverage_history(&ctx(), "curl", Some("2023-01-01"), Some("2023-03-01")).unwrap();
        for day in &history.daily_coverage {
            assert!((60.0..85.0).contains(&day.line_coverage));
            assert!((70.0..95.0).contains(&day.function_coverage));
            assert!((65.0..80.0).contains(&day.overall_coverage));
        }
        assert!((60.0..85.0).contains(&history.line_coverage));
    }

    #[test]
    fn coverage_history_rejects_inverted_range() {
        assert!(matches!(
            coverage_history(&ctx(), "curl", Some("2023-02-01"), Some("2023-01-01")),
            Err(ReportError::InvalidArgument(
                ValidationError::StartAfterEnd { .. }
            ))
        ));
    }

    #[test]
    fn crash_reports_degrade_to_empty_history_with_warning() {
        let history =
            crash_reports(&ctx(), "curl", Some("2023-01-01"), Some("2023-01-31")).unwrap();
        assert_eq!(history.total_crashes, 0);
        assert!(history.crashes.is_empty());
        assert!(history.warning.is_some());
    }

    #[test]
    fn coverage_report_link_defaults_to_latest() {
        let reference = coverage_report_link(&ctx(), "curl", None, None).unwrap();
        assert_eq!(reference.date, "latest");
        assert_eq!(
            reference.report_url,
            "https://oss-fuzz.com/coverage-report/curl/latest/index.html"
        );
        assert!(reference.download_path.is_none());
    }

    #[test]
    fn coverage_report_link_creates_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let download = dir.path().join("reports");
        let reference =
            coverage_report_link(&ctx(), "curl", Some("2023-01-15"), Some(&download)).unwrap();
        assert_eq!(reference.date, "2023-01-15");
        assert!(download.is_dir());
        assert_eq!(reference.download_path.as_deref(), Some(download.as_path()));
    }

    #[test]
    fn project_stats_carries_hosted_url_and_warning() {
        let stats = project_stats(&ctx(), "  Curl ").unwrap();
        assert_eq!(stats.project, "curl");
        assert_eq!(stats.stats_url, "https://oss-fuzz.com/stats/curl");
        assert!(stats.warning.is_some());
    }

    #[test]
    fn project_builds_respects_limit() {
        let builds = project_builds(&ctx(), "curl", 10).unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(
            builds[0].build_url,
            "https://oss-fuzz.com/build-status/curl"
        );
        assert!(project_builds(&ctx(), "curl", 0).unwrap().is_empty());
    }

    #[test]
    fn project_stats_rejects_invalid_name() {
        assert!(matches!(
            project_stats(&ctx(), "Curl!"),
            Err(ReportError::InvalidArgument(_))
        ));
    }

    #[test]
    fn download_corpus_writes_sample_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("corpus");
        let download =
            download_corpus(&ctx(), "curl", "curl_fuzzer", Some(out.clone())).unwrap();

        assert_eq!(download.files_created, SAMPLE_CORPUS_FILES);
        for i in 0..SAMPLE_CORPUS_FILES {
            let path = out.join(format!("sample_{i}"));
            assert!(path.is_file(), "expected sample file {path:?}");
            assert_eq!(fs::metadata(&path).unwrap().len() as usize, SAMPLE_CORPUS_FILE_LEN);
        }
    }

    #[test]
    fn download_corpus_rejects_bad_fuzzer_name() {
        assert!(matches!(
            download_corpus(&ctx(), "curl", "bad/fuzzer", None),
            Err(ReportError::InvalidArgument(_))
        ));
    }
}
