//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and date parsing.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SurveyLens - survey response analytics
///
/// Tally answers, compute average rating, NPS and completion rate, and
/// break responses down by day, device and location. Markdown/JSON reports.
///
/// Examples:
///   surveylens --survey survey.json --responses responses.json
///   surveylens --survey survey.json --responses exports/ --from 2025-06-01 --to 2025-06-30
///   surveylens --survey 665f1c --api-url http://localhost:5000/api/v1 --format json
///   surveylens --survey survey.json --responses responses.json --min-nps 20
///   surveylens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Survey to analyze
    ///
    /// A JSON file path with --responses, otherwise a survey id to fetch.
    #[arg(short, long, value_name = "FILE|ID", required_unless_present = "init_config")]
    pub survey: Option<String>,

    /// Responses JSON file, or a directory of JSON files
    ///
    /// When given, --survey is a file path and nothing is fetched;
    /// otherwise the survey and its responses come from the API.
    #[arg(short, long, value_name = "PATH")]
    pub responses: Option<PathBuf>,

    /// Survey service API base URL
    #[arg(long, value_name = "URL", env = "SURVEYLENS_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the survey service
    #[arg(long, value_name = "TOKEN", env = "SURVEYLENS_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Responses requested per API page
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// API request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Start of the date window (YYYY-MM-DD or RFC 3339)
    ///
    /// Defaults to one month before --to.
    #[arg(long, value_name = "DATE", value_parser = parse_from_date)]
    pub from: Option<DateTime<Utc>>,

    /// End of the date window, inclusive (YYYY-MM-DD or RFC 3339)
    ///
    /// Defaults to now.
    #[arg(long, value_name = "DATE", value_parser = parse_to_date)]
    pub to: Option<DateTime<Utc>>,

    /// Size of the default date window in days, instead of one month
    #[arg(long, value_name = "DAYS")]
    pub window_days: Option<u32>,

    /// Restrict every metric to the date window, not only the daily trend
    #[arg(long)]
    pub window_all: bool,

    /// Expected number of responses, used for the completion rate
    ///
    /// Without it the completion rate is 100% whenever any response exists.
    #[arg(long, value_name = "COUNT")]
    pub target_count: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum rows in the individual responses listing
    #[arg(long, value_name = "COUNT")]
    pub max_rows: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .surveylens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Fail if the NPS is below this score
    ///
    /// Useful for scheduled checks. Exit code 2 when the score is lower.
    #[arg(long, value_name = "SCORE", allow_negative_numbers = true)]
    pub min_nps: Option<i32>,

    /// Generate a default .surveylens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Parse a date bound; bare dates start at midnight UTC.
pub fn parse_from_date(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date(s, NaiveTime::MIN)
}

/// Parse a date bound; bare dates end at the last second of the day.
pub fn parse_to_date(s: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    parse_date(s, end_of_day)
}

fn parse_date(s: &str, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(time).and_utc())
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", s))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The survey argument, empty if not set (should be validated first).
    pub fn survey_ref(&self) -> &str {
        self.survey.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.survey_ref().trim().is_empty() {
            return Err("A survey file or id is required".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // File mode
        if let Some(ref responses) = self.responses {
            let survey_path = PathBuf::from(self.survey_ref());
            if !survey_path.is_file() {
                return Err(format!(
                    "Survey file does not exist: {}",
                    survey_path.display()
                ));
            }
            if !responses.exists() {
                return Err(format!(
                    "Responses path does not exist: {}",
                    responses.display()
                ));
            }
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err("--from must not be after --to".to_string());
            }
        }

        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.window_days == Some(0) {
            return Err("Window must be at least 1 day".to_string());
        }

        if self.target_count == Some(0) {
            return Err("Target count must be at least 1".to_string());
        }

        if let Some(score) = self.min_nps {
            if !(-100..=100).contains(&score) {
                return Err("Minimum NPS must be between -100 and 100".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            survey: Some("665f1c".to_string()),
            responses: None,
            api_url: Some("http://localhost:5000/api/v1".to_string()),
            api_token: None,
            page_size: None,
            timeout: None,
            from: None,
            to: None,
            window_days: None,
            window_all: false,
            target_count: None,
            format: None,
            output: None,
            max_rows: None,
            config: None,
            verbose: false,
            quiet: false,
            min_nps: None,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_dates() {
        let from = parse_from_date("2025-06-01").unwrap();
        assert_eq!(from.to_rfc3339(), "2025-06-01T00:00:00+00:00");

        let to = parse_to_date("2025-06-30").unwrap();
        assert_eq!(to.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-06-30 23:59:59");

        let exact = parse_to_date("2025-06-30T12:00:00+02:00").unwrap();
        assert_eq!(exact.format("%H:%M").to_string(), "10:00");

        assert!(parse_from_date("June 1st").is_err());
    }

    #[test]
    fn test_validation_api_mode() {
        assert!(make_args().validate().is_ok());

        let mut args = make_args();
        args.api_url = Some("localhost:5000".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_file_mode_checks_paths() {
        let mut args = make_args();
        args.survey = Some("/definitely/not/here.json".to_string());
        args.responses = Some(std::env::temp_dir());
        assert!(args.validate().is_err());

        let dir = tempfile::TempDir::new().unwrap();
        let survey_path = dir.path().join("survey.json");
        std::fs::write(&survey_path, "{}").unwrap();
        args.survey = Some(survey_path.display().to_string());
        assert!(args.validate().is_ok());

        args.responses = Some(dir.path().join("missing"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_date_order() {
        let mut args = make_args();
        args.from = parse_from_date("2025-07-01").ok();
        args.to = parse_to_date("2025-06-01").ok();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bounds() {
        let mut args = make_args();
        args.min_nps = Some(150);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.target_count = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.min_nps = Some(-20);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_cli_parses_negative_min_nps() {
        let args = Args::try_parse_from([
            "surveylens",
            "--survey",
            "abc",
            "--api-url",
            "http://localhost:5000/api/v1",
            "--min-nps",
            "-10",
            "--from",
            "2025-06-01",
        ])
        .unwrap();

        assert_eq!(args.min_nps, Some(-10));
        assert_eq!(args.from, parse_from_date("2025-06-01").ok());
    }
}
