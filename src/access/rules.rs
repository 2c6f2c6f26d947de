//! Temporary allowances
//!
//! A rule is stored only when a prompt grants more than a single approval.
//! Keys name an exact path, never a prefix or a pattern.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::Deserialize;

use crate::ops::Op;

/// How prompt answers are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
pub enum RuleScope {
    /// One allowance per operation and exact path.
    #[default]
    #[serde(rename = "op")]
    #[value(name = "op")]
    PerOperation,
    /// One allowance per exact path, covering every operation.
    #[serde(rename = "path")]
    #[value(name = "path")]
    PerPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    /// `None` matches any operation.
    op: Option<Op>,
    path: String,
}

impl RuleKey {
    pub fn new(scope: RuleScope, op: Op, path: &str) -> Self {
        let op = match scope {
            RuleScope::PerOperation => Some(op),
            RuleScope::PerPath => None,
        };
        Self {
            op,
            path: path.to_string(),
        }
    }

    pub fn op(&self) -> Option<Op> {
        self.op
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Some(op) => write!(f, "({}, {})", op, self.path),
            None => write!(f, "(*, {})", self.path),
        }
    }
}

/// A stored allowance: either time bound or use-count bound, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Valid up to and including the instant.
    Until(Instant),
    Remaining(u64),
}

impl Rule {
    pub fn is_valid(&self, now: Instant) -> bool {
        match *self {
            Rule::Until(expires_at) => now <= expires_at,
            Rule::Remaining(uses) => uses > 0,
        }
    }

    /// Spend one approval. Timed rules are unaffected.
    fn consume(&mut self) {
        if let Rule::Remaining(uses) = self {
            *uses = uses.saturating_sub(1);
        }
    }
}

/// Outcome of looking up an allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleLookup {
    /// A valid rule approved the call and was consumed.
    Granted,
    /// A rule existed but had expired or run out; it has been removed.
    Expired,
    Missing,
}

#[derive(Debug, Default)]
pub struct RuleTable {
    rules: HashMap<RuleKey, Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a rule, replacing any earlier one for the same key.
    pub fn grant(&mut self, key: RuleKey, rule: Rule) {
        self.rules.insert(key, rule);
    }

    pub fn get(&self, key: &RuleKey) -> Option<&Rule> {
        self.rules.get(key)
    }

    /// Try to approve one call under `key`, removing the rule lazily once
    /// it is found spent.
    pub fn consume(&mut self, key: &RuleKey, now: Instant) -> RuleLookup {
        let Some(rule) = self.rules.get_mut(key) else {
            return RuleLookup::Missing;
        };
        if rule.is_valid(now) {
            rule.consume();
            RuleLookup::Granted
        } else {
            self.rules.remove(key);
            RuleLookup::Expired
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_scope_keys() {
        let read = RuleKey::new(RuleScope::PerOperation, Op::Read, "/a");
        let write = RuleKey::new(RuleScope::PerOperation, Op::Write, "/a");
        assert_ne!(read, write);
        assert_eq!(read.to_string(), "(read, /a)");

        let any_read = RuleKey::new(RuleScope::PerPath, Op::Read, "/a");
        let any_write = RuleKey::new(RuleScope::PerPath, Op::Write, "/a");
        assert_eq!(any_read, any_write);
        assert_eq!(any_read.to_string(), "(*, /a)");
    }

    #[test]
    fn test_counted_rule_runs_out() {
        let now = Instant::now();
        let key = RuleKey::new(RuleScope::PerOperation, Op::Read, "/a");
        let mut table = RuleTable::new();
        table.grant(key.clone(), Rule::Remaining(2));

        assert_eq!(table.consume(&key, now), RuleLookup::Granted);
        assert_eq!(table.consume(&key, now), RuleLookup::Granted);
        assert_eq!(table.get(&key), Some(&Rule::Remaining(0)));
        assert_eq!(table.consume(&key, now), RuleLookup::Expired);
        assert!(table.is_empty());
        assert_eq!(table.consume(&key, now), RuleLookup::Missing);
    }

    #[test]
    fn test_timed_rule_expiry_is_inclusive() {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(10);
        let key = RuleKey::new(RuleScope::PerPath, Op::Open, "/a");
        let mut table = RuleTable::new();
        table.grant(key.clone(), Rule::Until(expires_at));

        for _ in 0..100 {
            assert_eq!(table.consume(&key, now), RuleLookup::Granted);
        }
        assert_eq!(table.consume(&key, expires_at), RuleLookup::Granted);
        assert_eq!(table.get(&key), Some(&Rule::Until(expires_at)));
        assert_eq!(
            table.consume(&key, expires_at + Duration::from_millis(1)),
            RuleLookup::Expired
        );
        assert_eq!(table.len(), 0);
    }
}
