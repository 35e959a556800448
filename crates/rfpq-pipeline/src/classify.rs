//! Fit signals: is the bid open, and is it somewhere we sell.

use rfpq_core::{FilterConfig, OpportunityRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitSignals {
    pub status_open: bool,
    pub location_match: bool,
    pub good_fit: bool,
}

pub fn status_open(record: &OpportunityRecord) -> bool {
    record
        .opportunity_status()
        .trim()
        .eq_ignore_ascii_case("open")
}

pub fn location_match(record: &OpportunityRecord, filter: &FilterConfig) -> bool {
    let jurisdiction = record.jurisdiction_title();
    !jurisdiction.trim().is_empty() && filter.targets(&jurisdiction)
}

pub fn classify(record: &OpportunityRecord, filter: &FilterConfig) -> FitSignals {
    let status_open = status_open(record);
    let location_match = location_match(record, filter);
    FitSignals {
        status_open,
        location_match,
        good_fit: status_open && location_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> OpportunityRecord {
        OpportunityRecord::from_json(value).unwrap()
    }

    #[test]
    fn status_is_trimmed_and_case_insensitive() {
        assert!(status_open(&record(json!({"opportunity_status": "Open "}))));
        assert!(status_open(&record(json!({"opportunity_status": "OPEN"}))));
        assert!(!status_open(&record(json!({"opportunity_status": "Opening soon"}))));
        assert!(!status_open(&record(json!({"opportunity_status": "closed"}))));
        assert!(!status_open(&record(json!({}))));
        assert!(!status_open(&record(json!({"opportunity_status": null}))));
    }

    #[test]
    fn location_is_membership_in_target_set() {
        let filter = FilterConfig::default();
        assert!(location_match(&record(json!({"jurisdiction_title": "Sunnyvale"})), &filter));
        assert!(location_match(&record(json!({"jurisdiction_title": " CALIFORNIA "})), &filter));
        assert!(!location_match(&record(json!({"jurisdiction_title": "Sunnyvale, CA"})), &filter));
        assert!(!location_match(&record(json!({"jurisdiction_title": ""})), &filter));
        assert!(!location_match(&record(json!({})), &filter));
    }

    #[test]
    fn good_fit_is_the_conjunction() {
        let filter = FilterConfig::new(["claremont"]);
        let cases = [
            (json!({"opportunity_status": "open", "jurisdiction_title": "Claremont"}), true, true),
            (json!({"opportunity_status": "open", "jurisdiction_title": "Fresno"}), true, false),
            (json!({"opportunity_status": "closed", "jurisdiction_title": "Claremont"}), false, true),
            (json!({"jurisdiction_title": 12}), false, false),
        ];
        for (value, open, located) in cases {
            let signals = classify(&record(value), &filter);
            assert_eq!(signals.status_open, open);
            assert_eq!(signals.location_match, located);
            assert_eq!(signals.good_fit, signals.status_open && signals.location_match);
        }
    }
}
