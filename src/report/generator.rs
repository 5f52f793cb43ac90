//! Markdown and JSON report generation.
//!
//! This module renders a [`Report`] as a Markdown document laid out like
//! the survey dashboard, or as pretty-printed JSON.

use crate::config::ReportConfig;
use crate::models::{
    FieldCount, NpsSummary, QuestionBreakdown, QuestionType, Report, ReportMetadata, ResponseRow,
    SurveyAnalytics, SurveyOverview,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, config: &ReportConfig) -> String {
    let analytics = &report.analytics;
    let mut output = String::new();

    // Title
    output.push_str(&format!("# Survey Analytics: {}\n\n", analytics.survey.title));

    output.push_str(&generate_metadata_section(&report.metadata, analytics));
    output.push_str(&generate_overview_section(&analytics.survey));
    output.push_str(&generate_summary_section(analytics, config));

    if let Some(ref nps) = analytics.nps {
        output.push_str(&generate_nps_section(nps));
    }

    output.push_str(&generate_trend_section(analytics));
    output.push_str(&generate_context_section("Device", &analytics.responses_by_device));
    output.push_str(&generate_context_section(
        "Location",
        &analytics.responses_by_location,
    ));
    output.push_str(&generate_context_section("Browser", &analytics.responses_by_browser));
    output.push_str(&generate_questions_section(&analytics.questions, config));

    if config.include_responses {
        output.push_str(&generate_responses_section(
            &analytics.responses,
            analytics.total_responses,
        ));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, analytics: &SurveyAnalytics) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Date Range:** {} to {}\n",
        analytics.date_range.from.format("%Y-%m-%d"),
        analytics.date_range.to.format("%Y-%m-%d")
    ));
    let scope = if analytics.window_all_metrics {
        "all metrics"
    } else {
        "daily trend only"
    };
    section.push_str(&format!("- **Window Applies To:** {}\n", scope));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the survey overview section.
fn generate_overview_section(survey: &SurveyOverview) -> String {
    let mut section = String::new();

    section.push_str("## Survey\n\n");
    section.push_str(&format!("- **ID:** `{}`\n", survey.id));
    section.push_str(&format!("- **Status:** {}\n", survey.status));
    section.push_str(&format!("- **Questions:** {}\n", survey.question_count));
    if let Some(created) = survey.created_at {
        section.push_str(&format!("- **Created:** {}\n", created.format("%Y-%m-%d")));
    }
    if let Some(published) = survey.published_at {
        section.push_str(&format!("- **Published:** {}\n", published.format("%Y-%m-%d")));
    }
    section.push('\n');

    if !survey.description.trim().is_empty() {
        section.push_str(survey.description.trim());
        section.push_str("\n\n");
    }

    section
}

/// Generate the headline metrics table.
fn generate_summary_section(analytics: &SurveyAnalytics, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Total Responses | Average Rating | NPS Score | Completion Rate |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");

    let rating = analytics
        .rating
        .as_ref()
        .map(|r| format!("{} / {}", r.display, config.rating_scale))
        .unwrap_or_else(|| "n/a".to_string());
    let nps = analytics
        .nps
        .as_ref()
        .map(|n| n.score.to_string())
        .unwrap_or_else(|| "n/a".to_string());

    section.push_str(&format!(
        "| {} | {} | {} | {:.0}% |\n\n",
        analytics.total_responses, rating, nps, analytics.completion_rate
    ));

    if let Some(target) = analytics.completion_target {
        section.push_str(&format!("*Completion measured against a target of {} responses.*\n\n", target));
    }

    section
}

/// Generate the NPS breakdown section.
fn generate_nps_section(nps: &NpsSummary) -> String {
    let mut section = String::new();

    section.push_str("## Net Promoter Score\n\n");
    section.push_str(&format!(
        "**Score: {}** from {} classified answers to `{}`.\n\n",
        nps.score, nps.breakdown.total, nps.question_id
    ));
    section.push_str("| Category | Count | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    section.push_str(&format!(
        "| 🟢 Promoters (9-10) | {} | {}% |\n",
        nps.breakdown.promoters, nps.promoter_percent
    ));
    section.push_str(&format!(
        "| 🟡 Passives (7-8) | {} | {}% |\n",
        nps.breakdown.passives, nps.passive_percent
    ));
    section.push_str(&format!(
        "| 🔴 Detractors (0-6) | {} | {}% |\n\n",
        nps.breakdown.detractors, nps.detractor_percent
    ));

    section
}

/// Generate the responses-per-day section.
fn generate_trend_section(analytics: &SurveyAnalytics) -> String {
    let mut section = String::new();

    section.push_str("## Responses Over Time\n\n");

    if analytics.responses_by_day.is_empty() {
        section.push_str("No responses in the selected date range.\n\n");
        return section;
    }

    section.push_str("| Date | Responses |\n");
    section.push_str("|:---|:---:|\n");
    for day in &analytics.responses_by_day {
        section.push_str(&format!("| {} | {} |\n", day.date, day.count));
    }
    section.push('\n');

    section
}

/// Generate a breakdown table for one context field.
fn generate_context_section(field: &str, counts: &[FieldCount]) -> String {
    if counts.is_empty() {
        return String::new();
    }

    let total: usize = counts.iter().map(|c| c.count).sum();
    let mut section = String::new();

    section.push_str(&format!("## Responses by {}\n\n", field));
    section.push_str(&format!("| {} | Responses | Share |\n", field));
    section.push_str("|:---|:---:|:---:|\n");
    for entry in counts {
        section.push_str(&format!(
            "| {} | {} | {}% |\n",
            escape_cell(&entry.value),
            entry.count,
            crate::analysis::percent(entry.count, total)
        ));
    }
    section.push('\n');

    section
}

/// Short description of a question type.
fn describe_question_type(question_type: QuestionType, rating_scale: u32) -> String {
    match question_type {
        QuestionType::Rating => format!("Rating question (1-{})", rating_scale),
        QuestionType::Nps => "Net Promoter Score question (0-10)".to_string(),
        QuestionType::SingleChoice => "Single choice question".to_string(),
        QuestionType::MultipleChoice => "Multiple choice question".to_string(),
        QuestionType::ShortText => "Short text question".to_string(),
        QuestionType::LongText => "Long text question".to_string(),
    }
}

/// Generate the per-question section.
fn generate_questions_section(questions: &[QuestionBreakdown], config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Questions\n\n");

    for (i, question) in questions.iter().enumerate() {
        section.push_str(&generate_question_block(i + 1, question, config));
    }

    section
}

/// Generate a single question block.
fn generate_question_block(number: usize, question: &QuestionBreakdown, config: &ReportConfig) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}. {}\n\n", number, question.text));
    block.push_str(&format!(
        "*{} | `{}` | {} answered*\n\n",
        describe_question_type(question.question_type, config.rating_scale),
        question.question_id,
        question.answered
    ));

    if question.question_type.is_text() {
        if question.samples.is_empty() {
            block.push_str("No answers yet.\n\n");
        } else {
            for sample in &question.samples {
                block.push_str(&format!("> {}\n\n", sample.replace('\n', " ")));
            }
        }
        return block;
    }

    if question.entries.is_empty() {
        block.push_str("No answers yet.\n\n");
        return block;
    }

    block.push_str("| Answer | Count | Share |\n");
    block.push_str("|:---|:---:|:---:|\n");
    for entry in &question.entries {
        block.push_str(&format!(
            "| {} | {} | {}% |\n",
            escape_cell(&entry.value),
            entry.count,
            entry.percent
        ));
    }
    block.push('\n');

    block
}

/// Generate the individual responses listing.
fn generate_responses_section(rows: &[ResponseRow], total: usize) -> String {
    let mut section = String::new();

    section.push_str("## Individual Responses\n\n");

    if rows.is_empty() {
        section.push_str("No responses yet.\n\n");
        return section;
    }

    if rows.len() < total {
        section.push_str(&format!("*Showing the {} most recent of {} responses.*\n\n", rows.len(), total));
    }

    section.push_str("| Respondent | Date | Time | Device | Browser | Location | Rating |\n");
    section.push_str("|:---|:---|:---|:---|:---|:---|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&row.respondent),
            row.date,
            row.time,
            escape_cell(&row.device),
            escape_cell(&row.browser),
            escape_cell(&row.location),
            row.rating.as_deref().unwrap_or("-")
        ));
    }
    section.push('\n');

    section
}

/// Keep free-form values from breaking table rows.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by SurveyLens v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
