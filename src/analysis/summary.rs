//! Composition of tallies and metrics into a full analytics result.

use crate::analysis::aggregator::{
    answered_count, bucket_by_day, bucket_by_field, filter_by_range, tally_answers, SurveyTally,
    UNKNOWN_BUCKET,
};
use crate::analysis::metrics::{
    average_rating, completion_rate, format_rating, nps_breakdown, nps_score, percent,
};
use crate::models::{
    parse_number, ContextField, DateRange, NpsCategory, NpsSummary, Question, QuestionBreakdown,
    QuestionType, RatingSummary, ResponseRecord, ResponseRow, Survey, SurveyAnalytics,
    SurveyOverview, ValueShare,
};
use std::cmp::Ordering;
use tracing::debug;

/// Knobs for one analytics run.
#[derive(Debug, Clone)]
pub struct AnalyticsOptions {
    /// Window for the daily trend (and every metric with `window_all_metrics`).
    pub range: DateRange,
    /// Expected number of responses, for the completion rate.
    pub target_count: Option<usize>,
    /// Apply the window to all metrics instead of only the daily trend.
    pub window_all_metrics: bool,
    /// Distinct answers listed per free-text question.
    pub max_text_samples: usize,
    /// Rows in the individual-responses listing.
    pub max_response_rows: usize,
}

impl AnalyticsOptions {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            target_count: None,
            window_all_metrics: false,
            max_text_samples: 5,
            max_response_rows: 50,
        }
    }
}

impl SurveyAnalytics {
    /// Run every aggregation over the response set.
    pub fn compute(survey: &Survey, responses: &[ResponseRecord], options: &AnalyticsOptions) -> Self {
        let windowed;
        let responses = if options.window_all_metrics {
            windowed = filter_by_range(responses, &options.range);
            debug!(
                "Window keeps {} of {} responses",
                windowed.len(),
                responses.len()
            );
            &windowed[..]
        } else {
            responses
        };

        let tallies = tally_answers(survey, responses);

        let rating = survey
            .first_of_type(QuestionType::Rating)
            .map(|q| {
                let average = average_rating(&tallies, &q.id);
                RatingSummary {
                    question_id: q.id.clone(),
                    average,
                    display: format_rating(average),
                }
            });

        let nps = survey.first_of_type(QuestionType::Nps).map(|q| {
            let breakdown = tallies.get(&q.id).map(nps_breakdown).unwrap_or_default();
            NpsSummary {
                question_id: q.id.clone(),
                score: nps_score(&tallies, &q.id),
                detractor_percent: percent(breakdown.detractors, breakdown.total),
                passive_percent: percent(breakdown.passives, breakdown.total),
                promoter_percent: percent(breakdown.promoters, breakdown.total),
                breakdown,
            }
        });

        Self {
            survey: SurveyOverview::from(survey),
            date_range: options.range,
            window_all_metrics: options.window_all_metrics,
            total_responses: responses.len(),
            completion_rate: completion_rate(responses, options.target_count),
            completion_target: options.target_count,
            rating,
            nps,
            responses_by_day: bucket_by_day(responses, &options.range),
            responses_by_device: bucket_by_field(responses, ContextField::Device),
            responses_by_location: bucket_by_field(responses, ContextField::Location),
            responses_by_browser: bucket_by_field(responses, ContextField::Browser),
            questions: question_breakdowns(survey, &tallies, responses, options.max_text_samples),
            responses: response_rows(survey, responses, options.max_response_rows),
        }
    }
}

/// Per-question answer distributions, in survey order.
pub fn question_breakdowns(
    survey: &Survey,
    tallies: &SurveyTally,
    responses: &[ResponseRecord],
    max_text_samples: usize,
) -> Vec<QuestionBreakdown> {
    let total = responses.len();

    survey
        .questions
        .iter()
        .map(|question| {
            let mut breakdown = QuestionBreakdown {
                question_id: question.id.clone(),
                text: question.text.clone(),
                question_type: question.question_type,
                answered: answered_count(responses, &question.id),
                entries: Vec::new(),
                samples: Vec::new(),
            };

            let Some(tally) = tallies.get(&question.id) else {
                breakdown.entries = declared_options(question, total);
                return breakdown;
            };

            match question.question_type {
                QuestionType::Rating => {
                    let mut numeric: Vec<(f64, &String, usize)> = tally
                        .iter()
                        .filter_map(|(key, count)| parse_number(key).map(|n| (n, key, *count)))
                        .collect();
                    numeric.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                    breakdown.entries = numeric
                        .into_iter()
                        .map(|(_, key, count)| share(key, count, total))
                        .collect();
                }
                QuestionType::Nps => {
                    let counts = nps_breakdown(tally);
                    breakdown.entries = NpsCategory::ALL
                        .iter()
                        .map(|category| share(category.label(), counts.count(*category), total))
                        .collect();
                }
                QuestionType::SingleChoice | QuestionType::MultipleChoice => {
                    let mut entries: Vec<ValueShare> = question
                        .options
                        .iter()
                        .map(|option| share(option, tally.get(option).copied().unwrap_or(0), total))
                        .collect();
                    entries.extend(
                        tally
                            .iter()
                            .filter(|(key, _)| !question.options.contains(key))
                            .map(|(key, count)| share(key, *count, total)),
                    );
                    breakdown.entries = entries;
                }
                QuestionType::ShortText | QuestionType::LongText => {
                    breakdown.samples = tally
                        .keys()
                        .filter(|key| !key.trim().is_empty())
                        .take(max_text_samples)
                        .cloned()
                        .collect();
                }
            }

            breakdown
        })
        .collect()
}

fn share(value: &str, count: usize, total: usize) -> ValueShare {
    ValueShare {
        value: value.to_string(),
        count,
        percent: percent(count, total),
    }
}

fn declared_options(question: &Question, total: usize) -> Vec<ValueShare> {
    match question.question_type {
        QuestionType::Nps => NpsCategory::ALL
            .iter()
            .map(|category| share(category.label(), 0, total))
            .collect(),
        _ => question
            .options
            .iter()
            .map(|option| share(option, 0, total))
            .collect(),
    }
}

/// Individual-response listing, newest first.
pub fn response_rows(survey: &Survey, responses: &[ResponseRecord], limit: usize) -> Vec<ResponseRow> {
    let rating_id = survey
        .first_of_type(QuestionType::Rating)
        .map(|q| q.id.as_str());

    let mut sorted: Vec<&ResponseRecord> = responses.iter().collect();
    sorted.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

    sorted
        .into_iter()
        .take(limit)
        .map(|r| ResponseRow {
            id: r.id.clone(),
            respondent: r
                .respondent
                .as_ref()
                .and_then(|p| p.label())
                .unwrap_or("Anonymous")
                .to_string(),
            date: r.completed_at.format("%Y-%m-%d").to_string(),
            time: r.completed_at.format("%H:%M").to_string(),
            device: field_or_unknown(r, ContextField::Device),
            browser: field_or_unknown(r, ContextField::Browser),
            location: field_or_unknown(r, ContextField::Location),
            rating: rating_id
                .and_then(|id| r.answers.get(id))
                .map(|answer| answer.display()),
        })
        .collect()
}

fn field_or_unknown(response: &ResponseRecord, field: ContextField) -> String {
    response.field(field).unwrap_or(UNKNOWN_BUCKET).to_string()
}
