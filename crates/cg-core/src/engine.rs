//! Host rule engine interface
//!
//! The browser owns rule evaluation. [`RuleEngineClient`] is the narrow
//! surface we need from it: read the registered dynamic rules and apply one
//! atomic batch update. [`MemoryRuleEngine`] implements the same contract in
//! process, including evaluation of a navigation against the registered rules,
//! for tests and offline tooling.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use crate::types::{ResourceType, Rule, RuleAction, RuleUpdate};

/// Error type for rule engine calls.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(i32),
    #[error("Invalid rule id: {0} (ids must be positive)")]
    InvalidRuleId(i32),
    #[error("Rule {id} has an invalid regexFilter: {reason}")]
    InvalidRegex { id: i32, reason: String },
    #[error("Rule limit exceeded: {count} > {limit}")]
    QuotaExceeded { count: usize, limit: usize },
    #[error("Rule engine unavailable: {0}")]
    Unavailable(String),
}

/// Client for the host's dynamic rule registry.
#[async_trait]
pub trait RuleEngineClient: Send + Sync {
    /// All currently registered dynamic rules.
    async fn dynamic_rules(&self) -> Result<Vec<Rule>, EngineError>;

    /// Apply removals then additions as one all-or-nothing batch.
    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError>;
}

// =============================================================================
// Verdicts
// =============================================================================

/// Outcome of evaluating a request against the registered rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Navigation continues. `rule_id` is `None` when no rule matched.
    Allow { rule_id: Option<i32> },
    /// Navigation is replaced by an extension page.
    Redirect { rule_id: i32, extension_path: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    pub fn rule_id(&self) -> Option<i32> {
        match self {
            Self::Allow { rule_id } => *rule_id,
            Self::Redirect { rule_id, .. } => Some(*rule_id),
        }
    }
}

// =============================================================================
// In-memory Engine
// =============================================================================

/// Default cap on dynamic rules, matching the browser's safe-rule limit.
pub const DEFAULT_RULE_LIMIT: usize = 30_000;

struct RegisteredRule {
    rule: Rule,
    regex: Regex,
}

/// In-process rule registry with the host engine's update and evaluation semantics.
pub struct MemoryRuleEngine {
    rules: Mutex<BTreeMap<i32, RegisteredRule>>,
    limit: usize,
    updates: AtomicUsize,
}

impl Default for MemoryRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuleEngine {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_RULE_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            rules: Mutex::new(BTreeMap::new()),
            limit,
            updates: AtomicUsize::new(0),
        }
    }

    /// Registered rules ordered by id.
    pub fn rules(&self) -> Vec<Rule> {
        self.lock().values().map(|r| r.rule.clone()).collect()
    }

    pub fn rule_ids(&self) -> Vec<i32> {
        self.lock().keys().copied().collect()
    }

    /// Number of successfully applied updates.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Apply an update atomically.
    ///
    /// Removing an unknown id is not an error. Adding an id that is still
    /// registered after removals, or adding the same id twice, is.
    pub fn apply(&self, update: RuleUpdate) -> Result<(), EngineError> {
        let mut compiled = Vec::with_capacity(update.add_rules.len());
        let mut adding: HashSet<i32> = HashSet::with_capacity(update.add_rules.len());

        for rule in update.add_rules {
            if rule.id < 1 {
                return Err(EngineError::InvalidRuleId(rule.id));
            }
            if !adding.insert(rule.id) {
                return Err(EngineError::DuplicateRuleId(rule.id));
            }
            let regex = compile_filter(&rule)?;
            compiled.push(RegisteredRule { rule, regex });
        }

        let mut rules = self.lock();
        let removing: HashSet<i32> = update.remove_rule_ids.into_iter().collect();

        if let Some(&id) = adding
            .iter()
            .find(|&&id| rules.contains_key(&id) && !removing.contains(&id))
        {
            return Err(EngineError::DuplicateRuleId(id));
        }

        let remaining = rules.keys().filter(|id| !removing.contains(*id)).count();
        let count = remaining + compiled.len();
        if count > self.limit {
            return Err(EngineError::QuotaExceeded { count, limit: self.limit });
        }

        rules.retain(|id, _| !removing.contains(id));
        for registered in compiled {
            rules.insert(registered.rule.id, registered);
        }

        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Decide a request the way the host engine does: the highest-priority
    /// matching rule wins, allow beats redirect at equal priority, and a
    /// request no rule matches is allowed.
    pub fn evaluate(&self, url: &str, resource_type: ResourceType) -> Verdict {
        let rules = self.lock();

        let winner = rules
            .values()
            .filter(|r| r.rule.applies_to(resource_type) && r.regex.is_match(url))
            .max_by_key(|r| (r.rule.priority, r.rule.action.is_allow(), Reverse(r.rule.id)));

        match winner {
            None => Verdict::Allow { rule_id: None },
            Some(r) => match &r.rule.action {
                RuleAction::Allow => Verdict::Allow {
                    rule_id: Some(r.rule.id),
                },
                RuleAction::Redirect { redirect } => Verdict::Redirect {
                    rule_id: r.rule.id,
                    extension_path: redirect.extension_path.clone(),
                },
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<i32, RegisteredRule>> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn compile_filter(rule: &Rule) -> Result<Regex, EngineError> {
    // Host regex filters are case-insensitive unless a rule opts out.
    RegexBuilder::new(&rule.condition.regex_filter)
        .case_insensitive(true)
        .build()
        .map_err(|e| EngineError::InvalidRegex {
            id: rule.id,
            reason: e.to_string(),
        })
}

#[async_trait]
impl RuleEngineClient for MemoryRuleEngine {
    async fn dynamic_rules(&self) -> Result<Vec<Rule>, EngineError> {
        Ok(self.rules())
    }

    async fn update_dynamic_rules(&self, update: RuleUpdate) -> Result<(), EngineError> {
        self.apply(update)
    }
}
