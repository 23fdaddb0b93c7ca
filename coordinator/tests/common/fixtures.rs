//! Test data: rule configurations and pointing events

use chrono::Utc;
use coordinator::RuleSet;
use shared::{PointingEvent, ScanType};

/// One rule listening for AS203, with configured placeholder coordinates
/// that live event coordinates must override.
pub const SINGLE_RULE: &str = r#"{
    "projects": {
        "T001": { "ttype": "triggerobs", "exptime": 896, "inttime": 8, "ra": 0.0, "dec": 0.0 }
    },
    "rules": [
        { "alias": "vast", "source_project_ids": ["AS203"], "destination_project_id": "T001" }
    ]
}"#;

/// Two wildcard rules on different destinations; one event fans out to both.
pub const TWO_WILDCARD_RULES: &str = r#"{
    "projects": {
        "T001": { "ttype": "triggerobs" },
        "D0009": { "ttype": "triggervcs" }
    },
    "rules": [
        { "alias": "vast", "source_project_ids": null, "destination_project_id": "T001" },
        { "alias": "gw", "source_project_ids": null, "destination_project_id": "D0009" }
    ]
}"#;

/// A rule that also schedules a calibrator follow-up.
pub const CALIBRATED_RULE: &str = r#"{
    "projects": {
        "T001": { "ttype": "triggerobs", "exptime": 896 }
    },
    "rules": [
        { "alias": "vast", "source_project_ids": ["AS203"], "destination_project_id": "T001",
          "calibration": { "calexptime": 120, "nobs": 1 } }
    ]
}"#;

pub fn rule_set(raw: &str) -> RuleSet {
    RuleSet::from_json_str(raw).expect("fixture config is valid")
}

pub fn science_event(event_id: &str) -> PointingEvent {
    PointingEvent {
        event_id: event_id.to_string(),
        source_project_id: "AS203".to_string(),
        field_ra: 10.5,
        field_dec: -30.0,
        scan_type: ScanType::Science,
        observed_at: Utc::now(),
    }
}

pub fn beamform_event(event_id: &str) -> PointingEvent {
    PointingEvent {
        scan_type: ScanType::Beamform,
        ..science_event(event_id)
    }
}

pub fn event_for_project(event_id: &str, source_project_id: &str) -> PointingEvent {
    PointingEvent {
        source_project_id: source_project_id.to_string(),
        ..science_event(event_id)
    }
}
