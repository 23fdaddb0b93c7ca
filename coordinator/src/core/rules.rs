//! Trigger rule configuration: loading, validation, and matching
//!
//! The configuration file has two sections: a `projects` table carrying the
//! base destination parameters per destination project, and a `rules` list
//! mapping source projects to destinations. Validation happens entirely at
//! load time; the resulting `RuleSet` is an immutable snapshot for the
//! process lifetime.

use crate::error::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::PointingEvent;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Parameter names the destination trigger service understands.
///
/// Unknown names are rejected at load time instead of being deferred to the
/// destination service's own validation.
const KNOWN_PARAMS: &[&str] = &[
    "ttype",
    "pretend",
    "ra",
    "dec",
    "alt",
    "az",
    "creator",
    "obsname",
    "nobs",
    "freqspecs",
    "avoidsun",
    "inttime",
    "freqres",
    "exptime",
    "calibrator",
    "calexptime",
    "groupid",
    "vcsmode",
    "buffered",
];

/// Parameters the coordinator itself owns. Configuration may not set them;
/// the secret in particular lives in the key file, never in rule config.
const RESERVED_PARAMS: &[&str] = &["project_id", "secure_key"];

/// One configured monitoring rule
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TriggerRule {
    pub alias: String,

    /// Source projects this rule listens for; `None` matches any project
    #[serde(default)]
    pub source_project_ids: Option<Vec<String>>,

    pub destination_project_id: String,

    /// Effective destination parameters. In the configuration file these are
    /// per-rule overrides; after load they hold the destination project's
    /// base parameters merged with those overrides.
    #[serde(default)]
    pub destination_params: BTreeMap<String, Value>,

    /// When present, a calibrator follow-up observation is dispatched
    /// alongside the target observation, with these parameters overlaid.
    #[serde(default)]
    pub calibration: Option<BTreeMap<String, Value>>,
}

/// On-disk configuration document
#[derive(Debug, Deserialize)]
struct RuleConfig {
    /// Base destination parameters per destination project id
    #[serde(default)]
    projects: BTreeMap<String, BTreeMap<String, Value>>,

    rules: Vec<TriggerRule>,
}

/// Validated, immutable snapshot of the configured rules
#[derive(Clone, Debug)]
pub struct RuleSet {
    rules: Vec<TriggerRule>,
}

impl RuleSet {
    /// Load and validate a rule configuration file.
    pub fn load(path: &Path) -> CoordinatorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoordinatorError::config(format!(
                "cannot read rule configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a configuration document from its JSON text.
    pub fn from_json_str(raw: &str) -> CoordinatorResult<Self> {
        let config: RuleConfig = serde_json::from_str(raw)
            .map_err(|e| CoordinatorError::config(format!("malformed rule configuration: {e}")))?;
        Self::from_config(config)
    }

    fn from_config(config: RuleConfig) -> CoordinatorResult<Self> {
        if config.rules.is_empty() {
            return Err(CoordinatorError::config("no rules configured"));
        }

        for (project_id, params) in &config.projects {
            validate_params(&format!("project {project_id}"), params)?;
        }

        let mut seen_aliases = BTreeSet::new();
        let mut rules = Vec::with_capacity(config.rules.len());

        for mut rule in config.rules {
            if rule.alias.trim().is_empty() {
                return Err(CoordinatorError::config("rule with empty alias"));
            }
            if !seen_aliases.insert(rule.alias.clone()) {
                return Err(CoordinatorError::config(format!(
                    "duplicate rule alias {}",
                    rule.alias
                )));
            }
            if rule.destination_project_id.trim().is_empty() {
                return Err(CoordinatorError::config(format!(
                    "rule {} has no destination project id",
                    rule.alias
                )));
            }

            let base = config.projects.get(&rule.destination_project_id).ok_or_else(|| {
                CoordinatorError::config(format!(
                    "destination project {} (rule {}) has no parameter configuration",
                    rule.destination_project_id, rule.alias
                ))
            })?;

            validate_params(&format!("rule {}", rule.alias), &rule.destination_params)?;
            if let Some(calibration) = &rule.calibration {
                validate_params(&format!("rule {} calibration", rule.alias), calibration)?;
            }

            // Merge: project base first, per-rule overrides on top.
            let mut merged = base.clone();
            merged.append(&mut rule.destination_params);
            rule.destination_params = merged;

            rules.push(rule);
        }

        Ok(Self { rules })
    }

    /// Restrict the active rule set to a single configured alias.
    pub fn select_alias(self, alias: &str) -> CoordinatorResult<Self> {
        let rules: Vec<TriggerRule> = self
            .rules
            .into_iter()
            .filter(|rule| rule.alias == alias)
            .collect();
        if rules.is_empty() {
            return Err(CoordinatorError::config(format!(
                "no rule configured for alias {alias}"
            )));
        }
        Ok(Self { rules })
    }

    /// Rules whose source-project filter admits this event, in declaration
    /// order. A `None` filter is a wildcard.
    pub fn match_event(&self, event: &PointingEvent) -> Vec<&TriggerRule> {
        self.rules
            .iter()
            .filter(|rule| match &rule.source_project_ids {
                None => true,
                Some(ids) => ids.iter().any(|id| id == &event.source_project_id),
            })
            .collect()
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }
}

fn validate_params(context: &str, params: &BTreeMap<String, Value>) -> CoordinatorResult<()> {
    for name in params.keys() {
        if RESERVED_PARAMS.contains(&name.as_str()) {
            return Err(CoordinatorError::config(format!(
                "{context}: parameter {name} is managed by the coordinator and may not be configured"
            )));
        }
        if !KNOWN_PARAMS.contains(&name.as_str()) {
            return Err(CoordinatorError::config(format!(
                "{context}: unknown destination parameter {name}"
            )));
        }
    }
    Ok(())
}
