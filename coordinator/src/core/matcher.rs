//! Pure event-to-intent matching
//!
//! No side effects here: given the same event and rule set, `evaluate`
//! always produces the same outcome. All bookkeeping happens downstream.

use crate::core::rules::{RuleSet, TriggerRule};
use serde_json::{json, Value};
use shared::{dedup_key, DispatchKind, PointingEvent};
use std::collections::BTreeMap;

/// A single dispatch the coordinator intends to perform.
///
/// Ephemeral: exists only between matching and dispatch bookkeeping.
#[derive(Clone, Debug)]
pub struct DispatchIntent {
    pub event_id: String,
    pub alias: String,
    pub kind: DispatchKind,
    pub destination_project_id: String,
    /// Merged destination parameters with the event's live coordinates
    pub params: BTreeMap<String, Value>,
}

impl DispatchIntent {
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.alias, &self.event_id, self.kind)
    }

    /// Observation name shown on the destination schedule
    pub fn obsname(&self) -> String {
        match self.kind {
            DispatchKind::Target => self.alias.clone(),
            DispatchKind::Calibration => format!("{}_cal", self.alias),
        }
    }
}

/// Outcome of evaluating one event against the rule set
#[derive(Clone, Debug)]
pub enum MatchOutcome {
    /// No rule listens for the event's source project; nothing is recorded
    NoMatch,
    /// Rules matched but the scan type is hard-excluded; the matched aliases
    /// get auditable skipped records
    Excluded { aliases: Vec<String> },
    /// Intents to dispatch, in rule declaration order
    Matched(Vec<DispatchIntent>),
}

/// Evaluate an event against the rule set.
///
/// The scan-type exclusion is a hard filter: an excluded scan never produces
/// an intent, whatever the rules say. Live event coordinates always override
/// configured `ra`/`dec` values: the rule's coordinates are placeholders at
/// best, the event's are where the telescope is actually pointing.
pub fn evaluate(event: &PointingEvent, rules: &RuleSet) -> MatchOutcome {
    let matched = rules.match_event(event);
    if matched.is_empty() {
        return MatchOutcome::NoMatch;
    }

    if event.scan_type.is_excluded() {
        return MatchOutcome::Excluded {
            aliases: matched.iter().map(|rule| rule.alias.clone()).collect(),
        };
    }

    let mut intents = Vec::new();
    for rule in matched {
        intents.push(target_intent(event, rule));
        if rule.calibration.is_some() {
            intents.push(calibration_intent(event, rule));
        }
    }
    MatchOutcome::Matched(intents)
}

fn target_intent(event: &PointingEvent, rule: &TriggerRule) -> DispatchIntent {
    let mut params = rule.destination_params.clone();
    overlay_coordinates(&mut params, event);
    DispatchIntent {
        event_id: event.event_id.clone(),
        alias: rule.alias.clone(),
        kind: DispatchKind::Target,
        destination_project_id: rule.destination_project_id.clone(),
        params,
    }
}

fn calibration_intent(event: &PointingEvent, rule: &TriggerRule) -> DispatchIntent {
    let mut params = rule.destination_params.clone();
    if let Some(calibration) = &rule.calibration {
        params.extend(calibration.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    params.insert("calibrator".to_string(), json!(true));
    overlay_coordinates(&mut params, event);
    DispatchIntent {
        event_id: event.event_id.clone(),
        alias: rule.alias.clone(),
        kind: DispatchKind::Calibration,
        destination_project_id: rule.destination_project_id.clone(),
        params,
    }
}

fn overlay_coordinates(params: &mut BTreeMap<String, Value>, event: &PointingEvent) {
    params.insert("ra".to_string(), json!(event.field_ra));
    params.insert("dec".to_string(), json!(event.field_dec));
}
