use std::fmt::Display;

/// Predicate every rule starts with so the monitor also receives messages not
/// addressed to it. It goes first: a later `eavesdrop=false` in the user part
/// still turns it off.
pub const EAVESDROPPING_RULE: &str = "eavesdrop=true";

/// A match rule in the bus daemon's rule grammar. Not validated locally, the
/// daemon rejects malformed rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule(String);

impl MatchRule {
    pub fn new(filter: &str) -> Self {
        MatchRule(format!("{},{}", EAVESDROPPING_RULE, filter))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turns raw command line filters into match rules, keeping their order.
pub fn build_rules<S: AsRef<str>>(filters: &[S]) -> Vec<MatchRule> {
    filters
        .iter()
        .map(|f| MatchRule::new(f.as_ref()))
        .collect()
}
