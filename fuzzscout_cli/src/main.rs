use fuzzscout_core::config::ScoutConfig;
use fuzzscout_core::context::Context;
use fuzzscout_core::repo::ProjectFilter;
use fuzzscout_core::session::{CoverageRequest, RunRequest, SetupOptions};
use fuzzscout_core::{extract, repo, reports, session};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Client for a local OSS-Fuzz repository clone", long_about = None)]
struct Cli {
    /// TOML settings file; `config.toml` is picked up automatically.
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Repository root, overriding probing and any config file.
    #[clap(long)]
    repo_dir: Option<PathBuf>,
    /// Emit machine-readable JSON instead of text.
    #[clap(long)]
    json: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects in the repository
    List {
        /// Print full project records instead of names
        #[clap(long)]
        detailed: bool,
        /// Filter by manifest language (case-insensitive)
        #[clap(long)]
        language: Option<String>,
        /// Filter by declared sanitizer
        #[clap(long)]
        sanitizer: Option<String>,
        /// Filter by declared fuzzing engine
        #[clap(long)]
        engine: Option<String>,
    },
    /// Show one project's manifest record
    Info { project: String },
    /// Discover the fuzz targets a project declares
    Targets { project: String },
    /// Guess a project's build system from its Dockerfile
    BuildSystem { project: String },
    /// Fetch coverage history (placeholder data without service access)
    Coverage {
        project: String,
        #[clap(long)]
        start: Option<String>,
        #[clap(long)]
        end: Option<String>,
    },
    /// Fetch crash reports (placeholder data without service access)
    Crashes {
        project: String,
        #[clap(long)]
        start: Option<String>,
        #[clap(long)]
        end: Option<String>,
    },
    /// Show project statistics (placeholder data without service access)
    Stats { project: String },
    /// Show recent build statuses (placeholder data without service access)
    Builds {
        project: String,
        #[clap(long, default_value_t = 10)]
        limit: usize,
    },
    /// Download a corpus (placeholder files without service access)
    Corpus {
        project: String,
        fuzzer: String,
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Prepare a local fuzzing directory for a project
    Setup {
        project: String,
        #[clap(long)]
        target: Option<String>,
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a simulated fuzzing session against a built target
    Run {
        project: String,
        target: PathBuf,
        #[clap(long)]
        duration: Option<u64>,
        #[clap(long)]
        output_dir: Option<PathBuf>,
        #[clap(long)]
        corpus_dir: Option<PathBuf>,
    },
    /// Collect simulated coverage for a corpus
    CollectCoverage {
        project: String,
        target: PathBuf,
        corpus_dir: PathBuf,
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Analyze a fuzzing results directory
    Analyze { results_dir: PathBuf },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config_file {
        Some(config_path) => ScoutConfig::load_from_file(config_path)?,
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                ScoutConfig::load_from_file(&default_config_path)?
            } else {
                ScoutConfig::default()
            }
        }
    };

    let config_repo_dir = config.repository.as_ref().and_then(|r| r.repo_dir.clone());
    let ctx = match cli.repo_dir.clone().or(config_repo_dir) {
        Some(root) => Context::with_root(root),
        None => Context::discover(),
    };
    let session_settings = config.session.clone().unwrap_or_default();

    match cli.command {
        Command::List {
            detailed,
            language,
            sanitizer,
            engine,
        } => {
            let filtered = language.is_some() || sanitizer.is_some() || engine.is_some();
            if detailed || filtered {
                let filter = ProjectFilter {
                    language,
                    sanitizer,
                    fuzzing_engine: engine,
                };
                let projects = repo::find_projects(&ctx, &filter)?;
                if cli.json {
                    print_json(&projects)?;
                } else if detailed {
                    for project in &projects {
                        println!(
                            "{:<30} {:<10} engines: {}",
                            project.name,
                            project.language,
                            project.fuzzing_engines.join(",")
                        );
                    }
                } else {
                    for project in &projects {
                        println!("{}", project.name);
                    }
                }
            } else {
                let names = repo::project_names(&ctx)?;
                if cli.json {
                    print_json(&names)?;
                } else {
                    for name in &names {
                        println!("{name}");
                    }
                }
            }
        }
        Command::Info { project } => {
            let record = repo::get_project(&ctx, &project)?;
            if cli.json {
                print_json(&record)?;
            } else {
                println!("name:         {}", record.name);
                println!("path:         {}", record.path.display());
                println!("language:     {}", record.language);
                println!("main repo:    {}", record.main_repo.as_deref().unwrap_or("-"));
                println!("sanitizers:   {}", record.sanitizers.join(", "));
                println!("engines:      {}", record.fuzzing_engines.join(", "));
                println!("maintainers:  {}", record.maintainers.join(", "));
                println!("dockerfile:   {}", record.has_dockerfile);
                println!("build script: {}", record.has_build_script);
            }
        }
        Command::Targets { project } => {
            let targets = extract::targets_for_project(&ctx, &project)?;
            if cli.json {
                print_json(&targets)?;
            } else {
                for target in &targets {
                    println!("{}", target.name);
                }
            }
        }
        Command::BuildSystem { project } => {
            let system = repo::detect_build_system(&ctx, &project)?;
            if cli.json {
                print_json(&system)?;
            } else {
                println!("{}", system.as_deref().unwrap_or("unknown"));
            }
        }
        Command::Coverage {
            project,
            start,
            end,
        } => {
            let history =
                reports::coverage_history(&ctx, &project, start.as_deref(), end.as_deref())?;
            if cli.json {
                print_json(&history)?;
            } else {
                if let Some(warning) = &history.warning {
                    println!("warning: {warning}");
                }
                println!(
                    "{} coverage {} .. {}: overall {:.1}%, line {:.1}%, function {:.1}%",
                    history.project,
                    history.start_date,
                    history.end_date,
                    history.overall_coverage,
                    history.line_coverage,
                    history.function_coverage
                );
                for day in &history.daily_coverage {
                    println!(
                        "  {}  line {:5.1}%  function {:5.1}%  overall {:5.1}%",
                        day.date, day.line_coverage, day.function_coverage, day.overall_coverage
                    );
                }
            }
        }
        Command::Crashes {
            project,
            start,
            end,
        } => {
            let history = reports::crash_reports(&ctx, &project, start.as_deref(), end.as_deref())?;
            if cli.json {
                print_json(&history)?;
            } else {
                if let Some(warning) = &history.warning {
                    println!("warning: {warning}");
                }
                println!(
                    "{}: {} crashes ({} unique) between {} and {}",
                    history.project,
                    history.total_crashes,
                    history.unique_crashes,
                    history.start_date,
                    history.end_date
                );
            }
        }
        Command::Stats { project } => {
            let stats = reports::project_stats(&ctx, &project)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                if let Some(warning) = &stats.warning {
                    println!("warning: {warning}");
                }
                println!("{}: {}", stats.project, stats.stats_url);
            }
        }
        Command::Builds { project, limit } => {
            let builds = reports::project_builds(&ctx, &project, limit)?;
            if cli.json {
                print_json(&builds)?;
            } else {
                for build in &builds {
                    if let Some(warning) = &build.warning {
                        println!("warning: {warning}");
                    }
                    println!("{}: {}", build.project, build.build_url);
                }
            }
        }
        Command::Corpus {
            project,
            fuzzer,
            output_dir,
        } => {
            let download = reports::download_corpus(&ctx, &project, &fuzzer, output_dir)?;
            if cli.json {
                print_json(&download)?;
            } else {
                if let Some(warning) = &download.warning {
                    println!("warning: {warning}");
                }
                println!(
                    "wrote {} corpus files to {}",
                    download.files_created,
                    download.output_dir.display()
                );
            }
        }
        Command::Setup {
            project,
            target,
            output_dir,
        } => {
            let opts = SetupOptions {
                fuzz_target: target,
                output_dir: output_dir.or(session_settings.output_dir.clone()),
                architecture: session_settings.architecture.clone(),
                sanitizer: session_settings.sanitizer.clone(),
            };
            let outcome = session::setup_local_fuzzing(&ctx, &project, &opts)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                if let Some(warning) = &outcome.warning {
                    println!("warning: {warning}");
                }
                println!(
                    "set up {}/{} at {}",
                    outcome.project,
                    outcome.fuzz_target,
                    outcome.fuzz_target_path.display()
                );
                println!("available targets: {}", outcome.available_targets.join(", "));
            }
        }
        Command::Run {
            project,
            target,
            duration,
            output_dir,
            corpus_dir,
        } => {
            let mut request = RunRequest::new(project, target);
            request.duration_secs = duration.unwrap_or(session_settings.duration_secs);
            request.output_dir = output_dir;
            request.corpus_dir = corpus_dir;

            let outcome = session::run_local_fuzzing(&request)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                if let Some(warning) = &outcome.warning {
                    println!("warning: {warning}");
                }
                let execution = &outcome.execution;
                println!(
                    "{}/{}: {} executions in {}s, {} crashes ({} unique)",
                    execution.project,
                    execution.target,
                    execution.executions,
                    execution.duration,
                    execution.crashes,
                    execution.unique_crashes
                );
                println!("stats written to {}", outcome.stats_path.display());
            }
        }
        Command::CollectCoverage {
            project,
            target,
            corpus_dir,
            output_dir,
        } => {
            let request = CoverageRequest {
                project,
                fuzz_target: target,
                corpus_dir,
                output_dir,
            };
            let outcome = session::collect_coverage(&request)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                if let Some(warning) = &outcome.warning {
                    println!("warning: {warning}");
                }
                println!(
                    "{}/{}: {} corpus files, line {:.1}%, function {:.1}%, branch {:.1}%",
                    outcome.project,
                    outcome.fuzz_target,
                    outcome.corpus_files,
                    outcome.line_coverage,
                    outcome.function_coverage,
                    outcome.branch_coverage
                );
                println!("report written to {}", outcome.report_path.display());
            }
        }
        Command::Analyze { results_dir } => {
            let analysis = session::analyze_results(&results_dir)?;
            if cli.json {
                print_json(&analysis)?;
            } else {
                match &analysis.stats {
                    Some(stats) => println!(
                        "{} executions, {} crashes ({} unique), {:.1} exec/s",
                        stats.executions,
                        stats.crashes,
                        stats.unique_crashes,
                        stats.average_exec_per_sec
                    ),
                    None => println!("no fuzzing_stats.json found"),
                }
                println!("crash files: {}", analysis.crash_count);
                for file in &analysis.crash_files {
                    println!("  {file}");
                }
            }
        }
    }

    Ok(())
}
