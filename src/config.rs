//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.surveylens.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".surveylens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Survey service settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "survey_report.md".to_string()
}

/// Survey service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API base URL; responses are read from files when unset.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Responses requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout() -> u64 {
    30
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Expected number of responses for the completion rate.
    #[serde(default)]
    pub target_count: Option<usize>,

    /// Default window length in days; one calendar month when unset.
    #[serde(default)]
    pub window_days: Option<u32>,

    /// Apply the date window to every metric.
    #[serde(default)]
    pub window_all_metrics: bool,

    /// Distinct answers shown per free-text question.
    #[serde(default = "default_text_samples")]
    pub max_text_samples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_count: None,
            window_days: None,
            window_all_metrics: false,
            max_text_samples: default_text_samples(),
        }
    }
}

fn default_text_samples() -> usize {
    5
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Top of the rating scale, for display.
    #[serde(default = "default_rating_scale")]
    pub rating_scale: u32,

    /// Include the individual responses listing.
    #[serde(default = "default_true")]
    pub include_responses: bool,

    /// Maximum rows in the responses listing.
    #[serde(default = "default_response_rows")]
    pub max_response_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            rating_scale: default_rating_scale(),
            include_responses: true,
            max_response_rows: default_response_rows(),
        }
    }
}

fn default_rating_scale() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_response_rows() -> usize {
    50
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI provides an explicit value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref url) = args.api_url {
            self.source.api_url = Some(url.clone());
        }
        if let Some(page_size) = args.page_size {
            self.source.page_size = page_size;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if args.target_count.is_some() {
            self.analysis.target_count = args.target_count;
        }
        if args.window_days.is_some() {
            self.analysis.window_days = args.window_days;
        }
        if args.window_all {
            self.analysis.window_all_metrics = true;
        }

        if let Some(rows) = args.max_rows {
            self.report.max_response_rows = rows;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "survey_report.md");
        assert_eq!(config.general.format, OutputFormat::Markdown);
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.report.rating_scale, 5);
        assert!(config.analysis.target_count.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "june.json"
format = "json"

[source]
api_url = "https://surveys.example.com/api/v1"

[analysis]
target_count = 200
window_days = 14
window_all_metrics = true

[report]
max_response_rows = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "june.json");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(
            config.source.api_url.as_deref(),
            Some("https://surveys.example.com/api/v1")
        );
        assert_eq!(config.source.timeout_seconds, 30);
        assert_eq!(config.analysis.target_count, Some(200));
        assert_eq!(config.analysis.window_days, Some(14));
        assert!(config.analysis.window_all_metrics);
        assert_eq!(config.analysis.max_text_samples, 5);
        assert_eq!(config.report.max_response_rows, 10);
        assert!(config.report.include_responses);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config: Config = toml::from_str(
            r#"
[general]
output = "from_file.md"

[analysis]
target_count = 50
"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "surveylens",
            "--survey",
            "abc",
            "--api-url",
            "http://localhost:5000/api/v1",
            "--format",
            "json",
            "--window-all",
        ])
        .unwrap();

        config.merge_with_args(&args);

        assert_eq!(config.general.output, "from_file.md");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.analysis.target_count, Some(50));
        assert!(config.analysis.window_all_metrics);
        assert_eq!(
            config.source.api_url.as_deref(),
            Some("http://localhost:5000/api/v1")
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[report]"));
    }
}
