use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "sotrace.toml";
pub const DEFAULT_DATABASE: &str = "sotorrent.sqlite";
pub const DEFAULT_POSTS_FILE: &str = "posts.txt";
pub const DEFAULT_OUTPUT_DIR: &str = "out";
pub const DEFAULT_SIMILARITY_FILE: &str = "similarity.csv";
pub const DEFAULT_SUMMARY_FILE: &str = "postsWithPostHistoryVersion.txt";
pub const DEFAULT_DIFF_DIR: &str = "diff";
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.8;
pub const DEFAULT_MAX_SIMILARITY: f64 = 0.9;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// What the change classifier does when a predecessor pointer leads nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    #[default]
    TreatAsUnchanged,
    Fail,
}

impl MissingPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TreatAsUnchanged => "treat_as_unchanged",
            Self::Fail => "fail",
        }
    }
}

impl std::str::FromStr for MissingPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "treat_as_unchanged" => Ok(Self::TreatAsUnchanged),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "invalid missing policy '{other}', expected one of: treat_as_unchanged, fail"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SotraceConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_posts_file")]
    pub posts: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            posts: default_posts_file(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_min_similarity")]
    pub min: f64,
    #[serde(default = "default_max_similarity")]
    pub max: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SIMILARITY,
            max: DEFAULT_MAX_SIMILARITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_similarity_file")]
    pub similarity_file: String,
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
    #[serde(default = "default_diff_dir")]
    pub diff_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            similarity_file: default_similarity_file(),
            summary_file: default_summary_file(),
            diff_dir: default_diff_dir(),
        }
    }
}

impl OutputConfig {
    pub fn similarity_path(&self) -> PathBuf {
        self.directory.join(&self.similarity_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.directory.join(&self.summary_file)
    }

    pub fn diff_path(&self) -> PathBuf {
        self.directory.join(&self.diff_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default)]
    pub missing_policy: MissingPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            missing_policy: MissingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn default_config_path(working_dir: impl AsRef<Path>) -> PathBuf {
    working_dir.as_ref().join(CONFIG_FILE_NAME)
}

/// Missing file means defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<SotraceConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(SotraceConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: SotraceConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn write_default_config(path: impl AsRef<Path>) -> Result<SotraceConfig, ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = SotraceConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &SotraceConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let SimilarityConfig { min, max } = config.similarity;

    if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) {
        warnings.push(ConfigWarning {
            code: "similarity_out_of_range",
            message: format!("similarity band [{min}, {max}] is outside [0, 1]"),
        });
    }
    if min > max {
        warnings.push(ConfigWarning {
            code: "similarity_band_inverted",
            message: format!("similarity.min ({min}) is greater than similarity.max ({max})"),
        });
    }
    if config.run.progress_interval == 0 {
        warnings.push(ConfigWarning {
            code: "progress_interval_zero",
            message: "run.progress_interval is 0, progress logging is disabled".to_owned(),
        });
    }

    warnings
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

fn default_posts_file() -> PathBuf {
    PathBuf::from(DEFAULT_POSTS_FILE)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_similarity_file() -> String {
    DEFAULT_SIMILARITY_FILE.to_owned()
}

fn default_summary_file() -> String {
    DEFAULT_SUMMARY_FILE.to_owned()
}

fn default_diff_dir() -> String {
    DEFAULT_DIFF_DIR.to_owned()
}

fn default_min_similarity() -> f64 {
    DEFAULT_MIN_SIMILARITY
}

fn default_max_similarity() -> f64 {
    DEFAULT_MAX_SIMILARITY
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

fn normalize_path(input: PathBuf, fallback: fn() -> PathBuf) -> PathBuf {
    if input.as_os_str().to_string_lossy().trim().is_empty() {
        fallback()
    } else {
        input
    }
}

fn normalize_name(input: String, fallback: fn() -> String) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_config(mut config: SotraceConfig) -> SotraceConfig {
    config.store.database = normalize_path(config.store.database, default_database);
    config.input.posts = normalize_path(config.input.posts, default_posts_file);
    config.output.directory = normalize_path(config.output.directory, default_output_dir);
    config.output.similarity_file =
        normalize_name(config.output.similarity_file, default_similarity_file);
    config.output.summary_file = normalize_name(config.output.summary_file, default_summary_file);
    config.output.diff_dir = normalize_name(config.output.diff_dir, default_diff_dir);
    config
}
