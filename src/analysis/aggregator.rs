//! Answer tallying and response bucketing.
//!
//! This module turns raw response records into frequency tables: per-question
//! answer tallies, responses per day, and responses per context field.

use crate::models::{ContextField, DateRange, DayCount, FieldCount, ResponseRecord, Survey};
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Bucket used when a response carries no value for a context field.
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// Answer key to occurrence count, in first-seen order.
pub type Tally = IndexMap<String, usize>;

/// Question id to the tally of its answers.
pub type SurveyTally = IndexMap<String, Tally>;

/// Count every answer value per question.
///
/// List answers count once per element. Keys are canonicalized so that a
/// number and its string spelling land in the same bucket.
pub fn tally_answers(survey: &Survey, responses: &[ResponseRecord]) -> SurveyTally {
    debug!(
        "Tallying {} responses for survey {}",
        responses.len(),
        survey.id
    );

    let mut tallies = SurveyTally::new();

    for response in responses {
        for (question_id, answer) in &response.answers {
            let tally = tallies.entry(question_id.clone()).or_default();
            for scalar in answer.scalars() {
                *tally.entry(scalar.canonical_key()).or_default() += 1;
            }
        }
    }

    for (question_id, tally) in &tallies {
        if survey.question(question_id).is_none() {
            debug!(
                "{} answers to question {} not declared by survey {}",
                tally_total(tally),
                question_id,
                survey.id
            );
        }
    }

    tallies
}

/// Sum of all counts in a tally.
pub fn tally_total(tally: &Tally) -> usize {
    tally.values().sum()
}

/// Number of responses that answered the given question at all.
pub fn answered_count(responses: &[ResponseRecord], question_id: &str) -> usize {
    responses
        .iter()
        .filter(|r| r.answers.contains_key(question_id))
        .count()
}

/// Keep only responses completed inside the window.
pub fn filter_by_range(responses: &[ResponseRecord], range: &DateRange) -> Vec<ResponseRecord> {
    responses
        .iter()
        .filter(|r| range.contains(r.completed_at))
        .cloned()
        .collect()
}

/// Count responses per UTC calendar day inside the window.
///
/// Output is sorted ascending by date; days without responses are omitted.
pub fn bucket_by_day(responses: &[ResponseRecord], range: &DateRange) -> Vec<DayCount> {
    let mut buckets: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    for response in responses.iter().filter(|r| range.contains(r.completed_at)) {
        *buckets.entry(response.completed_at.date_naive()).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|(date, count)| DayCount {
            date: date.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect()
}

/// Count responses per value of a context field.
///
/// Missing values are counted under [`UNKNOWN_BUCKET`]. Entries keep the
/// order in which each value was first seen.
pub fn bucket_by_field(responses: &[ResponseRecord], field: ContextField) -> Vec<FieldCount> {
    let mut buckets: IndexMap<String, usize> = IndexMap::new();

    for response in responses {
        let value = response.field(field).unwrap_or(UNKNOWN_BUCKET);
        *buckets.entry(value.to_string()).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|(value, count)| FieldCount { value, count })
        .collect()
}
