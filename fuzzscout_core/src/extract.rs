use crate::context::Context;
use crate::models::FuzzTarget;
use crate::repo::RepoError;
use crate::validate::validate_project_name;
use regex::Regex;
use std::fs;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// One build-script idiom the extractor recognizes: a pattern whose first
/// capture group yields a raw target candidate.
///
/// Rules live in an ordered list and the extractor folds over it, so a new
/// idiom is supported by appending a rule, not by rewriting callers.
struct ExtractionRule {
    name: &'static str,
    pattern: Regex,
}

impl ExtractionRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("extraction pattern is valid"),
        }
    }
}

/// The recognized target-declaration idioms, in fixed precedence order:
/// a compiled binary linked against the fuzzing engine, a plain copy into
/// the output directory, and the Go / Rust compile-helper invocations.
static EXTRACTION_RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    vec![
        ExtractionRule::new(
            "engine-link",
            r"\$CXX.*\$CXXFLAGS.*\$LIB_FUZZING_ENGINE.*-o\s+(\$OUT/[\w-]+)",
        ),
        ExtractionRule::new("out-copy", r"cp\s+[\w-]+\s+(\$OUT/[\w-]+)"),
        ExtractionRule::new("compile-go-fuzzer", r"compile_go_fuzzer\s+[\w./-]+\s+([\w-]+)"),
        ExtractionRule::new(
            "compile-rust-fuzzer",
            r"compile_rust_fuzzer\s+[\w./-]+\s+([\w-]+)",
        ),
    ]
});

/// Extracts the ordered, de-duplicated fuzz target names a build script
/// declares.
///
/// Each rule is applied against the full script text in precedence order;
/// candidates are normalized to their basename with any `$OUT/` prefix
/// stripped, then appended in first-seen order with case-sensitive exact
/// de-duplication.
///
/// The result is never empty: when no script exists or nothing matched,
/// exactly one synthesized `<project_name>_fuzzer` entry is returned.
pub fn extract_targets(project_name: &str, script: Option<&str>) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();

    if let Some(content) = script {
        for rule in EXTRACTION_RULES.iter() {
            for caps in rule.pattern.captures_iter(content) {
                let candidate = normalize_candidate(&caps[1]);
                if candidate.is_empty() {
                    continue;
                }
                if !targets.iter().any(|t| t == candidate) {
                    debug!(rule = rule.name, target = candidate, "extracted fuzz target");
                    targets.push(candidate.to_string());
                }
            }
        }
    }

    if targets.is_empty() {
        targets.push(format!("{project_name}_fuzzer"));
    }
    targets
}

/// Strips the output-directory prefix and keeps the final path segment.
fn normalize_candidate(raw: &str) -> &str {
    let stripped = raw.strip_prefix("$OUT/").unwrap_or(raw);
    stripped.rsplit('/').next().unwrap_or(stripped)
}

/// Discovers the fuzz targets of one project from its `build.sh`.
///
/// A script that exists but cannot be read is treated the same as no
/// script: a warning is logged and the fallback name is produced. The
/// returned targets carry the build-script path when one was read.
pub fn targets_for_project(
    ctx: &Context,
    project_name: &str,
) -> Result<Vec<FuzzTarget>, RepoError> {
    let name = validate_project_name(project_name)?;
    let root = ctx.require_root()?;
    let project_dir = root.join("projects").join(&name);
    if !project_dir.is_dir() {
        return Err(RepoError::NotFound(project_dir));
    }

    let script_path = project_dir.join("build.sh");
    let script = if script_path.is_file() {
        match fs::read_to_string(&script_path) {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(project = %name, error = %e, "failed to read build script");
                None
            }
        }
    } else {
        None
    };

    let names = extract_targets(&name, script.as_deref());
    Ok(names
        .into_iter()
        .map(|target_name| {
            let target = FuzzTarget::new(target_name, name.clone());
            if script.is_some() {
                target.with_build_script(script_path.clone())
            } else {
                target
            }
        })
        .collect())
}
