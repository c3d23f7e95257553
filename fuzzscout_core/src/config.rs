use serde::Deserialize;
use std::path::PathBuf;

/// Settings controlling where the local fuzzing repository is found.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RepositorySettings {
    /// Explicit repository root; overrides the candidate-directory probe.
    pub repo_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default = "default_architecture")]
    pub architecture: String,
    #[serde(default = "default_sanitizer")]
    pub sanitizer: String,
    pub output_dir: Option<PathBuf>,
}

pub fn default_duration_secs() -> u64 {
    60
}
fn default_architecture() -> String {
    "x86_64".to_string()
}
fn default_sanitizer() -> String {
    "address".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            architecture: default_architecture(),
            sanitizer: default_sanitizer(),
            output_dir: None,
        }
    }
}

/// Tool configuration loaded from an optional TOML file.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ScoutConfig {
    #[serde(default)]
    pub repository: Option<RepositorySettings>,
    #[serde(default)]
    pub session: Option<SessionSettings>,
}

impl ScoutConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: ScoutConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}
