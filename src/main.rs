//! SurveyLens - survey response analytics
//!
//! A CLI tool that loads a survey and its responses from JSON files or the
//! survey service's REST API, aggregates them, and writes an analytics report.
//!
//! Exit codes:
//!   0 - Success (NPS at or above --min-nps, or no --min-nps set)
//!   1 - Runtime error (bad arguments, unreadable data, API failure, etc.)
//!   2 - NPS below the --min-nps threshold

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;

use analysis::AnalyticsOptions;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cli::{Args, OutputFormat};
use config::{AnalysisConfig, Config, CONFIG_FILE};
use models::{DateRange, Report, ReportMetadata, ResponseRecord, Survey, SurveyAnalytics};
use source::{ApiConfig, SurveyApiClient};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration decides the default verbosity, so it is read first
    let (mut config, config_source) = load_config(&args);
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("SurveyLens v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();
    debug!("Configuration: {:?}", config);

    match run_analysis(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .surveylens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the API URL, date window, report options, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Where the configuration came from, logged once tracing is up.
enum ConfigSource {
    Explicit(PathBuf),
    Default,
    Missing,
    Invalid(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::Default => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigSource::Missing => debug!("No config file found, using defaults"),
            ConfigSource::Invalid(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> (Config, ConfigSource) {
    // An explicit path must load; fall back to defaults otherwise
    if let Some(ref config_path) = args.config {
        return match Config::load(config_path) {
            Ok(config) => (config, ConfigSource::Explicit(config_path.clone())),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        };
    }

    match Config::load_default() {
        Ok(Some(config)) => (config, ConfigSource::Default),
        Ok(None) => (Config::default(), ConfigSource::Missing),
        Err(e) => (Config::default(), ConfigSource::Invalid(e)),
    }
}

/// Run the complete analytics workflow. Returns exit code (0 or 2).
async fn run_analysis(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Load the survey and its responses
    let (survey, responses, source) = load_data(&args, &config).await?;
    check_survey_ids(&survey, &responses);

    // Step 2: Aggregate
    let range = resolve_date_range(&args, &config.analysis, Utc::now());
    println!(
        "\n🔬 Analyzing {} responses to \"{}\" ({} to {})...",
        responses.len(),
        survey.title,
        range.from.format("%Y-%m-%d"),
        range.to.format("%Y-%m-%d")
    );

    let mut options = AnalyticsOptions::new(range);
    options.target_count = config.analysis.target_count;
    options.window_all_metrics = config.analysis.window_all_metrics;
    options.max_text_samples = config.analysis.max_text_samples;
    options.max_response_rows = config.report.max_response_rows;
    let analytics = SurveyAnalytics::compute(&survey, &responses, &options);

    // Step 3: Build and save the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            source,
            generated_at: Utc::now(),
            duration_seconds: duration,
        },
        analytics,
    };

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    let analytics = &report.analytics;
    println!("\n📊 Survey Summary:");
    println!("   Total responses: {}", analytics.total_responses);
    if let Some(ref rating) = analytics.rating {
        println!(
            "   Average rating: {} / {}",
            rating.display, config.report.rating_scale
        );
    }
    if let Some(ref nps) = analytics.nps {
        println!(
            "   NPS: {} (🟢 {} | 🟡 {} | 🔴 {})",
            nps.score, nps.breakdown.promoters, nps.breakdown.passives, nps.breakdown.detractors
        );
    }
    println!("   Completion rate: {:.0}%", analytics.completion_rate);
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    // Check --min-nps threshold
    if let Some(min_nps) = args.min_nps {
        match analytics.nps {
            Some(ref nps) if nps.score < min_nps => {
                eprintln!(
                    "\n⛔ NPS {} is below the minimum of {}. Failing (exit code 2).",
                    nps.score, min_nps
                );
                return Ok(2);
            }
            Some(_) => {}
            None => warn!("Survey has no NPS question; --min-nps ignored"),
        }
    }

    Ok(0)
}

/// Load the survey and responses from files or the survey service.
///
/// Returns a description of the source alongside the data.
async fn load_data(args: &Args, config: &Config) -> Result<(Survey, Vec<ResponseRecord>, String)> {
    let survey_ref = args.survey_ref();

    if let Some(ref responses_path) = args.responses {
        println!("📥 Loading survey from {}", survey_ref);
        let survey = source::load_survey(Path::new(survey_ref))
            .with_context(|| format!("Failed to load survey {}", survey_ref))?;

        println!("📥 Loading responses from {}", responses_path.display());
        let responses = source::load_responses(responses_path).with_context(|| {
            format!("Failed to load responses from {}", responses_path.display())
        })?;

        let description = format!("{} + {}", survey_ref, responses_path.display());
        return Ok((survey, responses, description));
    }

    let mut api_config = ApiConfig {
        token: args.api_token.clone(),
        page_size: config.source.page_size,
        timeout_seconds: config.source.timeout_seconds,
        show_progress: !args.quiet,
        ..ApiConfig::default()
    };
    if let Some(ref base_url) = config.source.api_url {
        api_config.base_url = base_url.clone();
    }
    if api_config.token.is_none() {
        warn!("No API token set; the survey service may reject the request");
    }

    println!("📥 Fetching survey {} from {}", survey_ref, api_config.base_url);
    let description = format!(
        "{}/surveys/{}",
        api_config.base_url.trim_end_matches('/'),
        survey_ref
    );

    let client = SurveyApiClient::new(api_config).context("Failed to create HTTP client")?;
    let (survey, responses) = client
        .fetch_all(survey_ref)
        .await
        .with_context(|| format!("Failed to fetch survey {}", survey_ref))?;

    Ok((survey, responses, description))
}

/// Warn about responses recorded against a different survey.
fn check_survey_ids(survey: &Survey, responses: &[ResponseRecord]) {
    let foreign = responses
        .iter()
        .filter(|r| r.survey_id.as_deref().is_some_and(|id| id != survey.id))
        .count();

    if foreign > 0 {
        warn!(
            "{} of {} responses belong to a survey other than {}",
            foreign,
            responses.len(),
            survey.id
        );
    }
}

/// The date window from --from/--to, falling back to the configured default.
///
/// A missing upper bound is `now`; a missing lower bound is one window
/// length before the upper bound.
fn resolve_date_range(args: &Args, analysis: &AnalysisConfig, now: DateTime<Utc>) -> DateRange {
    let to = args.to.unwrap_or(now);
    let from = args.from.unwrap_or_else(|| {
        let window = match analysis.window_days {
            Some(days) => DateRange::last_days(to, days),
            None => DateRange::last_month(to),
        };
        window.from
    });

    DateRange::new(from, to)
}

/// Report path; a default Markdown file name follows the JSON format.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.general.output);

    let is_default_name = args.output.is_none() && path.extension().is_some_and(|e| e == "md");
    if config.general.format == OutputFormat::Json && is_default_name {
        return path.with_extension("json");
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["surveylens", "--survey", "abc"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_range_is_one_month() {
        let args = parse(&[]);
        let range = resolve_date_range(&args, &AnalysisConfig::default(), ts("2025-06-15T12:00:00Z"));

        assert_eq!(range.from, ts("2025-05-15T12:00:00Z"));
        assert_eq!(range.to, ts("2025-06-15T12:00:00Z"));
    }

    #[test]
    fn test_range_ends_at_to_argument() {
        let args = parse(&["--to", "2025-03-31"]);
        let analysis = AnalysisConfig {
            window_days: Some(7),
            ..AnalysisConfig::default()
        };
        let range = resolve_date_range(&args, &analysis, ts("2025-06-15T12:00:00Z"));

        assert_eq!(range.to.format("%Y-%m-%d").to_string(), "2025-03-31");
        assert_eq!(range.from.format("%Y-%m-%d").to_string(), "2025-03-24");
    }

    #[test]
    fn test_explicit_range() {
        let args = parse(&["--from", "2025-06-01", "--to", "2025-06-30"]);
        let range = resolve_date_range(&args, &AnalysisConfig::default(), ts("2026-01-01T00:00:00Z"));

        assert_eq!(range.from, ts("2025-06-01T00:00:00Z"));
        assert!(range.contains(ts("2025-06-30T23:59:59Z")));
        assert!(!range.contains(ts("2025-07-01T00:00:00Z")));
    }

    #[test]
    fn test_output_path_follows_format() {
        let args = parse(&["--format", "json"]);
        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(output_path(&args, &config), PathBuf::from("survey_report.json"));

        let args = parse(&["--format", "json", "-o", "out.md"]);
        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(output_path(&args, &config), PathBuf::from("out.md"));
    }
}
