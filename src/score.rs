use chrono::{DateTime, Duration, Utc};

use crate::models::{BuildingScore, Report, Status, UtilityScore, UtilityScores, UtilityType};

pub const FULL_WEIGHT_DAYS: i64 = 7;
pub const SCORING_WINDOW_DAYS: i64 = 30;

pub fn score_building(reports: &[Report], now: DateTime<Utc>) -> BuildingScore {
    let utilities = UtilityScores {
        power: score_utility(reports, UtilityType::Power, now),
        water: score_utility(reports, UtilityType::Water, now),
        internet: score_utility(reports, UtilityType::Internet, now),
    };

    let scores: Vec<u8> = utilities.iter().filter_map(|(_, utility)| utility.score).collect();
    let composite = if scores.is_empty() {
        None
    } else {
        let total: u32 = scores.iter().map(|score| u32::from(*score)).sum();
        Some(to_score(total as f64 / scores.len() as f64))
    };

    BuildingScore {
        composite,
        utilities,
        has_data: composite.is_some(),
    }
}

pub fn score_utility(reports: &[Report], utility: UtilityType, now: DateTime<Utc>) -> UtilityScore {
    let mut weighted_total = 0.0;
    let mut total_weight = 0.0;
    let mut latest: Option<&Report> = None;

    for report in reports.iter().filter(|report| report.utility_type == utility) {
        let weight = recency_weight(age_in_days(now, report.created_at));
        if weight > 0.0 {
            weighted_total += status_value(report.status) * weight;
            total_weight += weight;
        }

        latest = match latest {
            Some(current) if latest_key(current) >= latest_key(report) => Some(current),
            _ => Some(report),
        };
    }

    let Some(latest) = latest else {
        return UtilityScore::empty();
    };

    UtilityScore {
        score: (total_weight > 0.0).then(|| to_score(weighted_total / total_weight)),
        status: Some(latest.status),
        last_report_at: Some(latest.created_at),
    }
}

/// Whole days between `created_at` and `now`. Reports stamped in the future
/// (clock skew) are treated as brand new.
pub fn age_in_days(now: DateTime<Utc>, created_at: DateTime<Utc>) -> i64 {
    now.signed_duration_since(created_at).num_days().max(0)
}

pub fn recency_weight(days_ago: i64) -> f64 {
    match days_ago {
        i64::MIN..=FULL_WEIGHT_DAYS => 1.0,
        8..=SCORING_WINDOW_DAYS => 0.5,
        _ => 0.0,
    }
}

pub fn status_value(status: Status) -> f64 {
    match status {
        Status::Stable => 100.0,
        Status::Flickering => 50.0,
        Status::Outage | Status::Unknown => 0.0,
    }
}

pub fn in_scoring_window(report: &Report, now: DateTime<Utc>) -> bool {
    recency_weight(age_in_days(now, report.created_at)) > 0.0
}

/// Lower bound for the history a report source loads. Spans past the
/// representable range clamp to the earliest `DateTime<Utc>`.
pub fn history_cutoff(now: DateTime<Utc>, history_days: i64) -> DateTime<Utc> {
    Duration::try_days(history_days.max(1))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// Newest timestamp wins; equal timestamps fall back to the highest id, then
// to the most severe status.
fn latest_key(report: &Report) -> (DateTime<Utc>, uuid::Uuid, u8) {
    let severity = match report.status {
        Status::Stable => 0,
        Status::Flickering => 1,
        Status::Outage => 2,
        Status::Unknown => 3,
    };
    (report.created_at, report.id, severity)
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    Moderate,
    Poor,
    NoData,
}

impl ScoreBand {
    pub fn from_score(score: Option<u8>) -> Self {
        match score {
            None => ScoreBand::NoData,
            Some(75..) => ScoreBand::Good,
            Some(40..=74) => ScoreBand::Moderate,
            Some(_) => ScoreBand::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Good => "good",
            ScoreBand::Moderate => "moderate",
            ScoreBand::Poor => "poor",
            ScoreBand::NoData => "no data",
        }
    }

    pub fn marker_color(&self) -> &'static str {
        match self {
            ScoreBand::Good => "#10b981",
            ScoreBand::Moderate => "#f59e0b",
            ScoreBand::Poor => "#ef4444",
            ScoreBand::NoData => "#9ca3af",
        }
    }
}


#[cfg(test)]
mod properties {
    use super::tests::fixed_now;
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn arb_report() -> impl Strategy<Value = Report> {
        (
            prop::sample::select(UtilityType::ALL.to_vec()),
            prop::sample::select(vec![
                Status::Stable,
                Status::Flickering,
                Status::Outage,
                Status::Unknown,
            ]),
            -5i64 * 24..90 * 24,
            any::<u128>(),
        )
            .prop_map(|(utility_type, status, hours_ago, id)| Report {
                id: Uuid::from_u128(id),
                building_id: "kilimani-plaza".to_string(),
                utility_type,
                status,
                created_at: fixed_now() - Duration::hours(hours_ago),
            })
    }

    proptest! {
        #[test]
        fn scores_stay_in_range(reports in prop::collection::vec(arb_report(), 0..40)) {
            let score = score_building(&reports, fixed_now());
            for (_, utility) in score.utilities.iter() {
                if let Some(value) = utility.score {
                    prop_assert!(value <= 100);
                }
            }
            if let Some(value) = score.composite {
                prop_assert!(value <= 100);
            }
        }

        #[test]
        fn has_data_tracks_composite(reports in prop::collection::vec(arb_report(), 0..40)) {
            let score = score_building(&reports, fixed_now());
            prop_assert_eq!(score.has_data, score.composite.is_some());
        }

        #[test]
        fn single_utility_composite_equals_its_score(reports in prop::collection::vec(arb_report(), 1..40)) {
            let power_only: Vec<Report> = reports
                .into_iter()
                .map(|mut report| {
                    report.utility_type = UtilityType::Power;
                    report
                })
                .collect();
            let score = score_building(&power_only, fixed_now());
            prop_assert_eq!(score.composite, score.utilities.power.score);
        }

        #[test]
        fn stale_report_keeps_status_without_score(days_ago in 31i64..400, id in any::<u128>()) {
            let report = Report {
                id: Uuid::from_u128(id),
                building_id: "upperhill-towers".to_string(),
                utility_type: UtilityType::Water,
                status: Status::Flickering,
                created_at: fixed_now() - Duration::days(days_ago),
            };
            let score = score_utility(std::slice::from_ref(&report), UtilityType::Water, fixed_now());
            prop_assert_eq!(score.score, None);
            prop_assert_eq!(score.status, Some(Status::Flickering));
            prop_assert_eq!(score.last_report_at, Some(report.created_at));
        }

        #[test]
        fn scoring_is_repeatable(reports in prop::collection::vec(arb_report(), 0..40)) {
            prop_assert_eq!(score_building(&reports, fixed_now()), score_building(&reports, fixed_now()));
        }

        #[test]
        fn scoring_ignores_input_order(reports in prop::collection::vec(arb_report(), 0..40)) {
            let mut reversed = reports.clone();
            reversed.reverse();
            let mut sorted = reports.clone();
            sorted.sort_by_key(|report| report.created_at);
            let expected = score_building(&reports, fixed_now());
            prop_assert_eq!(score_building(&reversed, fixed_now()), expected);
            prop_assert_eq!(score_building(&sorted, fixed_now()), expected);
        }
    }
}
