use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the highlights pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame sampling settings
    pub sampling: SamplingConfig,

    /// Vision service settings
    pub analysis: AnalysisConfig,

    /// Clip assembly settings
    pub assembly: AssemblyConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        self.analysis.validate()?;
        self.assembly.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Frame sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between sampled frames
    pub interval_seconds: f64,

    /// Persist every sampled frame as a JPEG here (debugging aid)
    pub frames_dir: Option<PathBuf>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5.0,
            frames_dir: None,
        }
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<()> {
        if !(self.interval_seconds > 0.0) || !self.interval_seconds.is_finite() {
            return Err(invalid("sampling.interval_seconds", self.interval_seconds).into());
        }
        Ok(())
    }
}

/// Vision service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// `images:annotate` endpoint of the vision service
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Upper bound for a single vision request
    pub timeout_seconds: f64,

    /// Frames analysed concurrently; results are still consumed in timestamp order
    pub max_concurrent_requests: usize,

    /// Substrings that identify a scoreboard reading
    pub scoreboard_indicators: Vec<String>,

    /// Object labels that mark on-field action
    pub event_objects: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key_env: "GOOGLE_VISION_API_KEY".to_string(),
            timeout_seconds: 30.0,
            max_concurrent_requests: num_cpus::get().clamp(1, 8),
            scoreboard_indicators: vec!["Runs".to_string(), "Score".to_string()],
            event_objects: vec!["Person".to_string(), "Bat".to_string(), "Ball".to_string()],
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<()> {
        if !(self.timeout_seconds > 0.0) || !self.timeout_seconds.is_finite() {
            return Err(invalid("analysis.timeout_seconds", self.timeout_seconds).into());
        }

        if self.max_concurrent_requests == 0 {
            return Err(invalid("analysis.max_concurrent_requests", 0).into());
        }

        // An empty indicator would match every text, including silence
        if self.scoreboard_indicators.iter().any(|s| s.is_empty()) {
            return Err(invalid(
                "analysis.scoreboard_indicators",
                format!("{:?}", self.scoreboard_indicators),
            )
            .into());
        }

        if self.endpoint.trim().is_empty() {
            return Err(invalid("analysis.endpoint", "\"\"").into());
        }

        Ok(())
    }
}

/// Clip assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Length of the clip cut after each highlight
    pub clip_length_seconds: f64,

    /// Merge overlapping or touching clip windows before encoding
    pub merge_overlaps: bool,

    /// Video codec for the final output
    pub codec: String,

    /// Scratch directory for intermediate clips (defaults to a per-process directory)
    pub temp_dir: Option<PathBuf>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            clip_length_seconds: 5.0,
            merge_overlaps: false,
            codec: "libx264".to_string(),
            temp_dir: None,
        }
    }
}

impl AssemblyConfig {
    fn validate(&self) -> Result<()> {
        if !(self.clip_length_seconds > 0.0) || !self.clip_length_seconds.is_finite() {
            return Err(invalid("assembly.clip_length_seconds", self.clip_length_seconds).into());
        }

        if self.codec.trim().is_empty() {
            return Err(invalid("assembly.codec", "\"\"").into());
        }

        Ok(())
    }
}
