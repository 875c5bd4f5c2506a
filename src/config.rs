use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024; // 64 KiB
const MAX_RETRIES_LIMIT: u32 = 5;

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// Environment variable holding the provider API key. Never read from the TOML file.
pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} exceeds {} byte limit", path.display(), MAX_CONFIG_FILE_SIZE)]
    TooLarge { path: PathBuf },

    #[error("config is not a valid TOML document: {0}")]
    Syntax(String),

    #[error("config failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("required secret {0} is not set")]
    MissingSecret(&'static str),
}

// --- TOML deserialization structs (map 1:1 to the config schema) ---

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    resume_analysis: AnalysisSettings,
    resume_generation: GenerationSettings,
    #[serde(default)]
    inputs: InputSettings,
    #[serde(default)]
    provider: ProviderSettings,
}

/// `[resume_analysis]`: model parameters for the gap analysis call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// `[resume_generation]`: where and in which formats documents are written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationSettings {
    pub output_dir: PathBuf,
    pub formats: Vec<OutputFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(alias = "markdown")]
    Md,
    #[serde(alias = "text")]
    Txt,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Md, OutputFormat::Txt, OutputFormat::Json];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
        }
    }
}

/// `[inputs]`: candidate profile and job description locations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSettings {
    /// Permitted root for inputs and outputs. Defaults to the working directory.
    pub root: Option<PathBuf>,
    pub profile: PathBuf,
    pub job_description: PathBuf,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            root: None,
            profile: PathBuf::from("input/linkedin_profile.json"),
            job_description: PathBuf::from("input/job_description.txt"),
        }
    }
}

/// `[provider]`: endpoint and transport policy for the chat-completions binding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Sent as `HTTP-Referer`.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_owned(),
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            referer: "https://github.com/ApplicantOptimizer".to_owned(),
            title: "Applicant Optimizer".to_owned(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// --- Validated configuration ---

/// Validated, read-only process configuration. Only constructible by parsing,
/// so every instance has passed validation.
#[derive(Debug, Clone)]
pub struct Config {
    analysis: AnalysisSettings,
    generation: GenerationSettings,
    inputs: InputSettings,
    provider: ProviderSettings,
}

impl FromStr for Config {
    type Err = ConfigError;

    /// Parse as a generic TOML table, then deserialize and validate against the schema.
    fn from_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::Syntax(e.to_string()))?;

        let file: ConfigFile = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Schema(vec![e.to_string().trim().to_owned()]))?;

        let errors = validate(&file);
        if !errors.is_empty() {
            return Err(ConfigError::Schema(errors));
        }

        Ok(Self {
            analysis: file.resume_analysis,
            generation: file.resume_generation,
            inputs: file.inputs,
            provider: file.provider,
        })
    }
}

impl Config {
    /// Load a config from a TOML file. Checks file size before reading.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|e| read_error(path, e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge {
                path: path.to_owned(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| read_error(path, e))?;

        content.parse()
    }

    pub fn analysis(&self) -> &AnalysisSettings {
        &self.analysis
    }

    pub fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    pub fn inputs(&self) -> &InputSettings {
        &self.inputs
    }

    pub fn provider(&self) -> &ProviderSettings {
        &self.provider
    }
}

/// Load the config named by `CONFIG_PATH`, falling back to `config.toml`.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    Config::load(Path::new(&path))
}

/// Resolve the provider API key from the process environment.
pub fn api_key_from_env() -> Result<SecretString, ConfigError> {
    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(SecretString::from(key)),
        _ => Err(ConfigError::MissingSecret(API_KEY_VAR)),
    }
}

/// An output directory must stay beneath the working root: relative, no `..`.
pub fn validate_output_dir(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("must not be empty".to_owned());
    }
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(format!("must be a relative path, got '{}'", path.display()));
            }
            Component::ParentDir => {
                return Err(format!("must not contain '..', got '{}'", path.display()));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

fn read_error(path: &Path, e: std::io::Error) -> ConfigError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ConfigError::NotFound {
            path: path.to_owned(),
        }
    } else {
        ConfigError::Read {
            path: path.to_owned(),
            source: e,
        }
    }
}

fn validate(file: &ConfigFile) -> Vec<String> {
    let mut errors = Vec::new();

    let analysis = &file.resume_analysis;
    if analysis.model.trim().is_empty() {
        errors.push("resume_analysis.model: must not be empty".to_owned());
    }
    if !(0.0..=2.0).contains(&analysis.temperature) {
        errors.push(format!(
            "resume_analysis.temperature: must be within [0, 2], got {}",
            analysis.temperature
        ));
    }
    if analysis.max_tokens == 0 {
        errors.push("resume_analysis.max_tokens: must be greater than 0".to_owned());
    }

    let generation = &file.resume_generation;
    if let Err(e) = validate_output_dir(&generation.output_dir) {
        errors.push(format!("resume_generation.output_dir: {e}"));
    }
    if generation.formats.is_empty() {
        errors.push("resume_generation.formats: must list at least one format".to_owned());
    }
    let mut seen = HashSet::new();
    for format in &generation.formats {
        if !seen.insert(format) {
            errors.push(format!(
                "resume_generation.formats: duplicate format '{}'",
                format.extension()
            ));
        }
    }

    let inputs = &file.inputs;
    if inputs.profile.as_os_str().is_empty() {
        errors.push("inputs.profile: must not be empty".to_owned());
    }
    if inputs.job_description.as_os_str().is_empty() {
        errors.push("inputs.job_description: must not be empty".to_owned());
    }

    let provider = &file.provider;
    match Url::parse(&provider.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!(
            "provider.base_url: unsupported scheme '{}'",
            url.scheme()
        )),
        Err(e) => errors.push(format!("provider.base_url: {e}")),
    }
    if provider.timeout_secs == 0 {
        errors.push("provider.timeout_secs: must be greater than 0".to_owned());
    }
    if provider.max_retries > MAX_RETRIES_LIMIT {
        errors.push(format!(
            "provider.max_retries: must be at most {MAX_RETRIES_LIMIT}, got {}",
            provider.max_retries
        ));
    }
    if provider.retry_backoff_ms == 0 {
        errors.push("provider.retry_backoff_ms: must be greater than 0".to_owned());
    }

    errors
}
