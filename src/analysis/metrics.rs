//! Derived survey metrics: average rating, NPS and completion rate.

use crate::analysis::aggregator::{SurveyTally, Tally};
use crate::models::{parse_number, NpsBreakdown, NpsCategory, ResponseRecord};

/// Round a ratio to a whole number; halves round toward positive infinity.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// `part / whole` as a whole percent, 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    round_half_up(part as f64 / whole as f64 * 100.0) as u32
}

/// Mean of the numeric keys of a tally, weighted by their counts.
///
/// Keys that do not parse as numbers are left out entirely.
pub fn tally_mean(tally: &Tally) -> f64 {
    let (sum, count) = tally
        .iter()
        .filter_map(|(key, count)| parse_number(key).map(|value| (value, *count)))
        .fold((0.0, 0usize), |(sum, total), (value, count)| {
            (sum + value * count as f64, total + count)
        });

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Average answer to the rating question; 0 when nobody answered it.
pub fn average_rating(tallies: &SurveyTally, rating_question_id: &str) -> f64 {
    tallies
        .get(rating_question_id)
        .map(tally_mean)
        .unwrap_or(0.0)
}

/// Display form of an average rating: one decimal, or "0" for no data.
///
/// Ties round up (`4.25` shows as `"4.3"`).
pub fn format_rating(average: f64) -> String {
    if average == 0.0 {
        "0".to_string()
    } else {
        format!("{:.1}", round_half_up(average * 10.0) / 10.0)
    }
}

/// Count NPS answers per category. Unclassifiable answers are skipped.
pub fn nps_breakdown(tally: &Tally) -> NpsBreakdown {
    let mut breakdown = NpsBreakdown::default();

    for (key, count) in tally {
        match NpsCategory::classify(key) {
            Some(NpsCategory::Detractor) => breakdown.detractors += count,
            Some(NpsCategory::Passive) => breakdown.passives += count,
            Some(NpsCategory::Promoter) => breakdown.promoters += count,
            None => continue,
        }
        breakdown.total += count;
    }

    breakdown
}

/// NPS from category counts, in `[-100, 100]`.
pub fn score_from_breakdown(breakdown: &NpsBreakdown) -> i32 {
    if breakdown.total == 0 {
        return 0;
    }

    let net = breakdown.promoters as f64 - breakdown.detractors as f64;
    round_half_up(net / breakdown.total as f64 * 100.0) as i32
}

/// Net Promoter Score of the NPS question; 0 when nobody answered it.
pub fn nps_score(tallies: &SurveyTally, nps_question_id: &str) -> i32 {
    tallies
        .get(nps_question_id)
        .map(|tally| score_from_breakdown(&nps_breakdown(tally)))
        .unwrap_or(0)
}

/// Completion rate in percent.
///
/// With a target, responses over target, clamped to `[0, 100]`. Without one
/// there is no denominator: 100 when any responses exist, 0 otherwise.
pub fn completion_rate(responses: &[ResponseRecord], target: Option<usize>) -> f64 {
    match target {
        Some(0) => 0.0,
        Some(target) => (responses.len() as f64 / target as f64 * 100.0).clamp(0.0, 100.0),
        None if responses.is_empty() => 0.0,
        None => 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::tally_answers;
    use crate::analysis::aggregator::tests::{num, question, response, survey, text};
    use crate::models::QuestionType;
    use proptest::prelude::*;

    fn tally_of(entries: &[(&str, usize)]) -> Tally {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn survey_tally(question_id: &str, tally: Tally) -> SurveyTally {
        let mut tallies = SurveyTally::new();
        tallies.insert(question_id.to_string(), tally);
        tallies
    }

    #[test]
    fn test_average_rating_scenario() {
        let s = survey(vec![question("q1", QuestionType::Rating)]);
        let responses = vec![
            response("r1", "2025-06-01T10:00:00Z", vec![("q1", num(4.0))]),
            response("r2", "2025-06-01T11:00:00Z", vec![("q1", num(5.0))]),
            response("r3", "2025-06-01T12:00:00Z", vec![("q1", num(4.0))]),
        ];

        let tallies = tally_answers(&s, &responses);
        let average = average_rating(&tallies, "q1");

        assert!((average - 13.0 / 3.0).abs() < 1e-12);
        assert_eq!(format_rating(average), "4.3");
    }

    #[test]
    fn test_format_rating_rounds_ties_up() {
        let s = survey(vec![question("q1", QuestionType::Rating)]);
        let responses: Vec<ResponseRecord> = [4.0, 4.0, 4.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, n)| response(&format!("r{}", i), "2025-06-01T10:00:00Z", vec![("q1", num(*n))]))
            .collect();

        let average = average_rating(&tally_answers(&s, &responses), "q1");

        assert_eq!(average, 4.25);
        assert_eq!(format_rating(average), "4.3");
        assert_eq!(format_rating(3.75), "3.8");
        assert_eq!(format_rating(5.0), "5.0");
    }

    #[test]
    fn test_average_rating_skips_unparseable() {
        let tallies = survey_tally("q1", tally_of(&[("5", 1), ("great", 3), ("3", 1)]));
        assert_eq!(average_rating(&tallies, "q1"), 4.0);
    }

    #[test]
    fn test_average_rating_no_answers() {
        let tallies = SurveyTally::new();
        assert_eq!(average_rating(&tallies, "q1"), 0.0);
        assert_eq!(format_rating(0.0), "0");

        let only_text = survey_tally("q1", tally_of(&[("n/a", 2)]));
        assert_eq!(average_rating(&only_text, "q1"), 0.0);
    }

    #[test]
    fn test_nps_from_category_labels() {
        // Legacy forms submit the category label as the answer.
        let tallies = survey_tally(
            "nps",
            tally_of(&[
                ("Promoters (9-10)", 5),
                ("Passives (7-8)", 3),
                ("Detractors (0-6)", 2),
            ]),
        );

        assert_eq!(nps_score(&tallies, "nps"), 30);
        let breakdown = nps_breakdown(&tallies["nps"]);
        assert_eq!(breakdown.total, 10);
        assert_eq!(breakdown.passives, 3);
    }

    #[test]
    fn test_nps_from_raw_scores() {
        // Raw 0-10 scores are bucketed by the engine.
        let s = survey(vec![question("nps", QuestionType::Nps)]);
        let scores = [10.0, 9.0, 9.0, 10.0, 9.0, 7.0, 8.0, 7.0, 3.0, 6.0];
        let responses: Vec<_> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| response(&format!("r{}", i), "2025-06-01T10:00:00Z", vec![("nps", num(*s))]))
            .collect();

        let tallies = tally_answers(&s, &responses);
        assert_eq!(nps_score(&tallies, "nps"), 30);
    }

    #[test]
    fn test_nps_mixed_inputs_and_garbage() {
        let s = survey(vec![question("nps", QuestionType::Nps)]);
        let responses = vec![
            response("r1", "2025-06-01T10:00:00Z", vec![("nps", text("Promoters (9-10)"))]),
            response("r2", "2025-06-01T10:00:00Z", vec![("nps", num(2.0))]),
            response("r3", "2025-06-01T10:00:00Z", vec![("nps", text("no idea"))]),
            response("r4", "2025-06-01T10:00:00Z", vec![("nps", text("10"))]),
        ];

        let tallies = tally_answers(&s, &responses);
        let breakdown = nps_breakdown(&tallies["nps"]);

        assert_eq!(breakdown.total, 3);
        assert_eq!(breakdown.promoters, 2);
        assert_eq!(breakdown.detractors, 1);
        assert_eq!(nps_score(&tallies, "nps"), 33);
    }

    #[test]
    fn test_nps_zero_responses() {
        assert_eq!(nps_score(&SurveyTally::new(), "nps"), 0);
        assert_eq!(score_from_breakdown(&NpsBreakdown::default()), 0);
    }

    #[test]
    fn test_completion_rate_without_target() {
        let responses = vec![response("r1", "2025-06-01T10:00:00Z", vec![])];
        assert_eq!(completion_rate(&responses, None), 100.0);
        assert_eq!(completion_rate(&[], None), 0.0);
    }

    #[test]
    fn test_completion_rate_with_target() {
        let responses: Vec<_> = (0..3)
            .map(|i| response(&format!("r{}", i), "2025-06-01T10:00:00Z", vec![]))
            .collect();

        assert_eq!(completion_rate(&responses, Some(4)), 75.0);
        assert_eq!(completion_rate(&responses, Some(2)), 100.0);
        assert_eq!(completion_rate(&responses, Some(0)), 0.0);
        assert_eq!(completion_rate(&[], Some(10)), 0.0);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_nps_score_in_bounds(
            promoters in 0usize..500,
            passives in 0usize..500,
            detractors in 0usize..500,
            garbage in 0usize..50,
        ) {
            let tallies = survey_tally("nps", tally_of(&[
                ("Promoters (9-10)", promoters),
                ("Passives (7-8)", passives),
                ("Detractors (0-6)", detractors),
                ("???", garbage),
            ]));
            let score = nps_score(&tallies, "nps");

            prop_assert!((-100..=100).contains(&score));
            if promoters + passives + detractors == 0 {
                prop_assert_eq!(score, 0);
            }
        }

        #[test]
        fn prop_average_rating_permutation_invariant(
            ratings in prop::collection::vec(1u8..=5, 1..50),
            seed in any::<u64>(),
        ) {
            let s = survey(vec![question("q1", QuestionType::Rating)]);
            let build = |values: &[u8]| -> Vec<ResponseRecord> {
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| response(&format!("r{}", i), "2025-06-01T10:00:00Z", vec![("q1", num(f64::from(*v)))]))
                    .collect()
            };

            let mut shuffled = ratings.clone();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();

            let a = average_rating(&tally_answers(&s, &build(&ratings)), "q1");
            let b = average_rating(&tally_answers(&s, &build(&shuffled)), "q1");

            prop_assert!((a - b).abs() < 1e-9);
            prop_assert_eq!(format_rating(a), format_rating(b));
        }
    }
}
