pub mod config;
pub mod context;
pub mod extract;
pub mod models;
pub mod repo;
pub mod reports;
pub mod session;
pub mod validate;

pub use config::ScoutConfig;
pub use context::Context;
pub use extract::{extract_targets, targets_for_project};
pub use models::{CoverageReport, ExecutionStatus, FuzzTarget, FuzzingExecution, Project};
pub use repo::{
    ProjectFilter, RepoError, detect_build_system, find_projects, get_project, list_projects,
    project_exists, project_names,
};
pub use reports::{
    BuildRecord, CorpusDownload, CoverageHistory, CoverageReportRef, CrashHistory, DailyCoverage,
    ProjectStats, ReportError, coverage_history, coverage_report_link, crash_reports,
    download_corpus, project_builds, project_stats,
};
pub use session::{
    Analysis, CoverageOutcome, CoverageRequest, FuzzingStats, RunOutcome, RunRequest,
    SessionError, SetupOptions, SetupOutcome, analyze_results, collect_coverage,
    run_local_fuzzing, setup_local_fuzzing,
};
pub use validate::{
    DateRange, ValidationError, validate_date_range, validate_fuzz_target, validate_project_name,
};

#[cfg(test)]
mod tests {
    #[test]
    fn extraction_and_validation_compose() {
        let name = crate::validate_project_name("Curl").unwrap();
        let targets = crate::extract_targets(&name, None);
        assert_eq!(targets, vec!["curl_fuzzer"]);
    }
}
