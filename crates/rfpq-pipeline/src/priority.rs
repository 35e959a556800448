//! Urgency + keyword density score, bucketed into Low/Medium/High.

use chrono::{DateTime, Utc};
use rfpq_core::{KeywordSet, OpportunityRecord, PriorityLevel, PriorityThresholds};

pub const POINTS_PER_KEYWORD: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityBreakdown {
    pub urgency_points: i64,
    pub keyword_points: i64,
    pub score: i64,
    pub level: PriorityLevel,
}

/// Calendar days from `now` to `due`, both taken as UTC dates. Negative when past due.
pub fn days_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (due.date_naive() - now.date_naive()).num_days()
}

pub fn urgency_points(days: i64) -> i64 {
    if days <= 7 {
        30
    } else if days <= 14 {
        20
    } else if days <= 30 {
        10
    } else {
        0
    }
}

pub struct PriorityScorer {
    keywords: KeywordSet,
    thresholds: PriorityThresholds,
}

impl PriorityScorer {
    pub fn new(keywords: KeywordSet, thresholds: PriorityThresholds) -> Self {
        Self {
            keywords,
            thresholds,
        }
    }

    pub fn level_for(&self, score: i64) -> PriorityLevel {
        self.thresholds.level_for(score)
    }

    pub fn score(&self, record: &OpportunityRecord, now: DateTime<Utc>) -> PriorityBreakdown {
        // A missing or unparseable due date adds no urgency.
        let urgency_points = record
            .due_date()
            .map(|due| urgency_points(days_until(due, now)))
            .unwrap_or(0);
        let keyword_points =
            self.keywords.found_in(&record.searchable_text()).len() as i64 * POINTS_PER_KEYWORD;
        let score = urgency_points + keyword_points;
        PriorityBreakdown {
            urgency_points,
            keyword_points,
            score,
            level: self.level_for(score),
        }
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(KeywordSet::default(), PriorityThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 23, 30, 0).single().unwrap()
    }

    fn record(value: serde_json::Value) -> OpportunityRecord {
        OpportunityRecord::from_json(value).unwrap()
    }

    #[test]
    fn urgency_buckets_follow_days_remaining() {
        assert_eq!(urgency_points(-3), 30);
        assert_eq!(urgency_points(0), 30);
        assert_eq!(urgency_points(7), 30);
        assert_eq!(urgency_points(8), 20);
        assert_eq!(urgency_points(14), 20);
        assert_eq!(urgency_points(15), 10);
        assert_eq!(urgency_points(30), 10);
        assert_eq!(urgency_points(31), 0);
    }

    #[test]
    fn days_are_counted_in_calendar_days() {
        let due = Utc.with_ymd_and_hms(2026, 10, 16, 0, 15, 0).single().unwrap();
        assert_eq!(days_until(due, now()), 1);
        assert_eq!(days_until(now() - Duration::days(2), now()), -2);
    }

    #[test]
    fn missing_or_garbled_due_dates_add_no_urgency() {
        let scorer = PriorityScorer::default();
        for value in [
            json!({"title": "Parks mowing"}),
            json!({"title": "Parks mowing", "due_date": null}),
            json!({"title": "Parks mowing", "due_date": "TBD"}),
            json!({"title": "Parks mowing", "due_date": {"date": "2026-10-20"}}),
        ] {
            let breakdown = scorer.score(&record(value), now());
            assert_eq!(breakdown.urgency_points, 0);
            assert_eq!(breakdown.score, 0);
            assert_eq!(breakdown.level, PriorityLevel::Low);
        }
    }

    #[test]
    fn extreme_numeric_due_dates_add_no_urgency() {
        let scorer = PriorityScorer::default();
        for due in [json!(i64::MIN), json!(-1.0e30), json!(1.0e300)] {
            let breakdown = scorer.score(&record(json!({"title": "WiFi", "due_date": due})), now());
            assert_eq!(breakdown.urgency_points, 0);
            assert_eq!(breakdown.score, 5);
        }
    }

    #[test]
    fn keyword_points_are_a_sum_over_the_keyword_list() {
        let scorer = PriorityScorer::default();
        let rec = record(json!({
            "title": "WiFi WiFi WiFi",
            "description": "wireless network",
            "due_date": "2027-06-01",
        }));
        let breakdown = scorer.score(&rec, now());
        assert_eq!(breakdown.keyword_points, 15);
        assert_eq!(breakdown.urgency_points, 0);
    }

    #[test]
    fn urgency_and_density_combine() {
        let scorer = PriorityScorer::default();
        let due = (now() + Duration::days(10)).to_rfc3339();
        let rec = record(json!({"title": "Fiber broadband expansion", "due_date": due}));
        let breakdown = scorer.score(&rec, now());
        assert_eq!(breakdown.urgency_points, 20);
        assert_eq!(breakdown.keyword_points, 10);
        assert_eq!(breakdown.score, 30);
        assert_eq!(breakdown.level, PriorityLevel::Medium);
    }

    #[test]
    fn level_boundaries_are_exact() {
        let scorer = PriorityScorer::default();
        assert_eq!(scorer.level_for(19), PriorityLevel::Low);
        assert_eq!(scorer.level_for(20), PriorityLevel::Medium);
        assert_eq!(scorer.level_for(39), PriorityLevel::Medium);
        assert_eq!(scorer.level_for(40), PriorityLevel::High);
    }

    #[test]
    fn thresholds_can_be_substituted() {
        let scorer = PriorityScorer::new(
            KeywordSet::new(["paving"]),
            PriorityThresholds { high: 10, medium: 5 },
        );
        let breakdown = scorer.score(&record(json!({"title": "Paving"})), now());
        assert_eq!(breakdown.score, 5);
        assert_eq!(breakdown.level, PriorityLevel::Medium);
    }
}
