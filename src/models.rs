//! Data models for survey analytics.
//!
//! This module contains the survey schema, the response records collected
//! against it, and the derived structures the aggregation engine produces.

use chrono::{DateTime, Duration, Months, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Type tag of a survey question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    ShortText,
    LongText,
    SingleChoice,
    MultipleChoice,
    Rating,
    Nps,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::ShortText => write!(f, "short-text"),
            QuestionType::LongText => write!(f, "long-text"),
            QuestionType::SingleChoice => write!(f, "single-choice"),
            QuestionType::MultipleChoice => write!(f, "multiple-choice"),
            QuestionType::Rating => write!(f, "rating"),
            QuestionType::Nps => write!(f, "nps"),
        }
    }
}

impl QuestionType {
    /// Whether answers are picked from a declared option list.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }

    /// Whether answers are free-form text.
    pub fn is_text(&self) -> bool {
        matches!(self, QuestionType::ShortText | QuestionType::LongText)
    }
}

/// A single question in a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier, unique within the survey (e.g. "q1").
    pub id: String,
    /// Display text shown to respondents.
    #[serde(rename = "question", alias = "text", default)]
    pub text: String,
    /// Question type.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Option labels for choice questions, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Whether respondents must answer.
    #[serde(default)]
    pub required: bool,
}

/// Lifecycle status of a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Active,
    Completed,
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurveyStatus::Draft => write!(f, "Draft"),
            SurveyStatus::Active => write!(f, "Active"),
            SurveyStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// A survey definition: the schema every response is interpreted against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: SurveyStatus,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Response count as reported by the survey service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses_count: Option<u64>,
}

impl Survey {
    /// Look up a question by identifier.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// The first question of the given type, if any.
    pub fn first_of_type(&self, question_type: QuestionType) -> Option<&Question> {
        self.questions
            .iter()
            .find(|q| q.question_type == question_type)
    }

    /// Check the structural rules a survey must satisfy.
    pub fn check(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err(format!(
                "Survey '{}' must contain at least one question",
                self.id
            ));
        }

        let mut seen = HashSet::new();
        for question in &self.questions {
            if question.id.trim().is_empty() {
                return Err(format!("Survey '{}' has a question without an id", self.id));
            }
            if !seen.insert(question.id.as_str()) {
                return Err(format!(
                    "Survey '{}' has duplicate question id '{}'",
                    self.id, question.id
                ));
            }
        }

        Ok(())
    }
}

/// One scalar answer value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl Scalar {
    /// Convert a JSON value; `None` for null, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            Value::Bool(b) => Some(Scalar::Flag(*b)),
            _ => None,
        }
    }

    /// The key this value is tallied under.
    ///
    /// Numbers and their string spellings share a key: `4`, `4.0` and `"4"`
    /// all map to `"4"`.
    pub fn canonical_key(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => format_number(*n),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

/// Render a number the way it is tallied.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Covers -0.0 as well.
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// Parse a tally key or text answer as a finite number.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// An answer to one question: a single scalar, or a list for multiple choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(Scalar),
    Multi(Vec<Scalar>),
}

impl AnswerValue {
    /// Convert a JSON value, dropping shapes that carry no answer.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(AnswerValue::Multi(
                items.iter().filter_map(Scalar::from_json).collect(),
            )),
            other => Scalar::from_json(other).map(AnswerValue::Single),
        }
    }

    /// All scalars carried by this answer.
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            AnswerValue::Single(s) => std::slice::from_ref(s),
            AnswerValue::Multi(values) => values,
        }
    }

    /// Human-readable form, list elements joined by commas.
    pub fn display(&self) -> String {
        self.scalars()
            .iter()
            .map(Scalar::canonical_key)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn deserialize_answers<'de, D>(deserializer: D) -> Result<IndexMap<String, AnswerValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| AnswerValue::from_json(&value).map(|answer| (key, answer)))
        .collect())
}

/// The person who submitted a response, when known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Respondent {
    /// Name, else email, else `None`.
    pub fn label(&self) -> Option<&str> {
        [self.name.as_str(), self.email.as_str()]
            .into_iter()
            .find(|s| !s.trim().is_empty())
    }
}

/// A submitted response to a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,
    /// Answers keyed by question id.
    #[serde(default, deserialize_with = "deserialize_answers")]
    pub answers: IndexMap<String, AnswerValue>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent: Option<Respondent>,
}

impl ResponseRecord {
    /// The context field's value, if present and non-empty.
    pub fn field(&self, field: ContextField) -> Option<&str> {
        let value = match field {
            ContextField::Device => self.device.as_deref(),
            ContextField::Location => self.location.as_deref(),
            ContextField::Browser => self.browser.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// Optional context fields responses can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextField {
    Device,
    Location,
    Browser,
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextField::Device => write!(f, "Device"),
            ContextField::Location => write!(f, "Location"),
            ContextField::Browser => write!(f, "Browser"),
        }
    }
}

/// Inclusive window of completion timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// One calendar month back from `now`, up to `now`.
    pub fn last_month(now: DateTime<Utc>) -> Self {
        let from = now.checked_sub_months(Months::new(1)).unwrap_or(now);
        Self { from, to: now }
    }

    /// The last `days` days up to `now`.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            from: now - Duration::days(i64::from(days)),
            to: now,
        }
    }

    /// Whether `ts` falls inside the window, both ends included.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts <= self.to
    }
}

/// Response count for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    /// UTC date as `YYYY-MM-DD`.
    pub date: String,
    pub count: usize,
}

/// Response count for one value of a categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCount {
    pub value: String,
    pub count: usize,
}

/// NPS respondent category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpsCategory {
    Detractor,
    Passive,
    Promoter,
}

impl NpsCategory {
    pub const DETRACTORS_LABEL: &'static str = "Detractors (0-6)";
    pub const PASSIVES_LABEL: &'static str = "Passives (7-8)";
    pub const PROMOTERS_LABEL: &'static str = "Promoters (9-10)";

    /// All categories, in display order.
    pub const ALL: [NpsCategory; 3] = [
        NpsCategory::Detractor,
        NpsCategory::Passive,
        NpsCategory::Promoter,
    ];

    /// The label respondent forms submit for this category.
    pub fn label(&self) -> &'static str {
        match self {
            NpsCategory::Detractor => Self::DETRACTORS_LABEL,
            NpsCategory::Passive => Self::PASSIVES_LABEL,
            NpsCategory::Promoter => Self::PROMOTERS_LABEL,
        }
    }

    /// Classify a tallied NPS answer.
    ///
    /// Accepts the three category labels verbatim as well as raw integer
    /// scores from 0 to 10. Anything else is unclassifiable.
    pub fn classify(key: &str) -> Option<Self> {
        match key {
            Self::DETRACTORS_LABEL => return Some(NpsCategory::Detractor),
            Self::PASSIVES_LABEL => return Some(NpsCategory::Passive),
            Self::PROMOTERS_LABEL => return Some(NpsCategory::Promoter),
            _ => {}
        }

        let score = parse_number(key).filter(|n| n.fract() == 0.0 && (0.0..=10.0).contains(n))?;
        Some(match score as u8 {
            0..=6 => NpsCategory::Detractor,
            7 | 8 => NpsCategory::Passive,
            _ => NpsCategory::Promoter,
        })
    }
}

/// Category counts behind an NPS score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpsBreakdown {
    pub detractors: usize,
    pub passives: usize,
    pub promoters: usize,
    /// Classified answers only.
    pub total: usize,
}

impl NpsBreakdown {
    pub fn count(&self, category: NpsCategory) -> usize {
        match category {
            NpsCategory::Detractor => self.detractors,
            NpsCategory::Passive => self.passives,
            NpsCategory::Promoter => self.promoters,
        }
    }
}

/// NPS result for the survey's NPS question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub question_id: String,
    pub score: i32,
    pub breakdown: NpsBreakdown,
    pub detractor_percent: u32,
    pub passive_percent: u32,
    pub promoter_percent: u32,
}

/// Average rating for the survey's rating question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub question_id: String,
    pub average: f64,
    /// Average rounded to one decimal.
    pub display: String,
}

/// One row of a per-question distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueShare {
    pub value: String,
    pub count: usize,
    /// Share of all responses, rounded to a whole percent.
    pub percent: u32,
}

/// Distribution of answers to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBreakdown {
    pub question_id: String,
    pub text: String,
    pub question_type: QuestionType,
    /// Responses with a non-missing answer to this question.
    pub answered: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<ValueShare>,
    /// Distinct text answers, for free-text questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

/// One row of the individual-responses listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub id: String,
    pub respondent: String,
    pub date: String,
    pub time: String,
    pub device: String,
    pub browser: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

/// Survey details shown at the top of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyOverview {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: SurveyStatus,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Survey> for SurveyOverview {
    fn from(survey: &Survey) -> Self {
        Self {
            id: survey.id.clone(),
            title: survey.title.clone(),
            description: survey.description.clone(),
            status: survey.status,
            question_count: survey.questions.len(),
            created_at: survey.created_at,
            published_at: survey.published_at,
        }
    }
}

/// Everything the aggregation engine derives for one survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyAnalytics {
    pub survey: SurveyOverview,
    pub date_range: DateRange,
    /// Whether every metric, not only the daily trend, is windowed.
    pub window_all_metrics: bool,
    pub total_responses: usize,
    /// Completion rate in percent.
    pub completion_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_target: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<NpsSummary>,
    pub responses_by_day: Vec<DayCount>,
    pub responses_by_device: Vec<FieldCount>,
    pub responses_by_location: Vec<FieldCount>,
    pub responses_by_browser: Vec<FieldCount>,
    pub questions: Vec<QuestionBreakdown>,
    pub responses: Vec<ResponseRow>,
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the survey and responses were loaded from.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// A complete analytics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub analytics: SurveyAnalytics,
}
