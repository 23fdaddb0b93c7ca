//! Pure coordination logic: rule configuration, matching, lifecycle state

pub mod matcher;
pub mod rules;
pub mod state;

pub use matcher::{evaluate, DispatchIntent, MatchOutcome};
pub use rules::{RuleSet, TriggerRule};
pub use state::{CoordinatorState, Phase};
