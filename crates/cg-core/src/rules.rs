//! Rule construction and update planning
//!
//! Builds the fixed base tier and the whitelist tier, and plans the single
//! atomic update that replaces whatever the host engine currently holds for
//! either tier.

use std::collections::HashSet;

use log::{debug, warn};

use crate::config::*;
use crate::domain::{self, normalize};
use crate::pattern::{tld_pattern, to_match_pattern, ANY_WEB_URL};
use crate::types::{Rule, RuleUpdate};

// =============================================================================
// Base Rules
// =============================================================================

/// The three base rules: allow `.com`, allow `.org`/`.in`, redirect the rest.
pub fn base_rules() -> Vec<Rule> {
    vec![
        Rule::allow(ALLOW_COM_RULE_ID, BASE_ALLOW_PRIORITY, tld_pattern(COM_TLDS)),
        Rule::allow(ALLOW_ORG_RULE_ID, BASE_ALLOW_PRIORITY, tld_pattern(ORG_TLDS)),
        Rule::redirect(BLOCK_OTHERS_RULE_ID, BLOCK_PRIORITY, ANY_WEB_URL, BLOCKED_PAGE_PATH),
    ]
}

#[inline]
pub fn is_base_id(id: i32) -> bool {
    BASE_RULE_IDS.contains(&id)
}

#[inline]
pub fn is_dynamic_id(id: i32) -> bool {
    id >= DYNAMIC_RULE_START_ID
}

// =============================================================================
// Whitelist Rules
// =============================================================================

/// Counters from compiling a whitelist into rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Entries read from storage
    pub entries: usize,
    /// Rules produced
    pub rules: usize,
    /// Entries dropped because an earlier entry normalized to the same domain
    pub duplicates: usize,
    /// Entries dropped because they are not valid hostnames
    pub invalid: usize,
}

/// Compile whitelist entries into allow rules.
///
/// Entries are normalized first. Duplicates (after normalization) keep their
/// first occurrence and invalid entries are skipped, so a hand-edited store
/// cannot make the host reject the whole batch. Ids are positional within the
/// surviving entries: `DYNAMIC_RULE_START_ID + index`.
pub fn compile_whitelist(whitelist: &[String]) -> (Vec<Rule>, CompileStats) {
    let mut stats = CompileStats {
        entries: whitelist.len(),
        ..CompileStats::default()
    };
    let mut seen: HashSet<String> = HashSet::with_capacity(whitelist.len());
    let mut rules = Vec::with_capacity(whitelist.len());

    for entry in whitelist {
        let domain = normalize(entry);

        if let Err(e) = domain::check(&domain) {
            warn!("Skipping invalid whitelist entry {:?}: {}", entry, e);
            stats.invalid += 1;
            continue;
        }

        if !seen.insert(domain.clone()) {
            debug!("Skipping duplicate whitelist entry {:?}", entry);
            stats.duplicates += 1;
            continue;
        }

        let id = DYNAMIC_RULE_START_ID + rules.len() as i32;
        rules.push(Rule::allow(id, WHITELIST_PRIORITY, to_match_pattern(&domain)));
    }

    stats.rules = rules.len();
    (rules, stats)
}

/// Allow rules for a whitelist. See [`compile_whitelist`].
pub fn whitelist_rules(whitelist: &[String]) -> Vec<Rule> {
    compile_whitelist(whitelist).0
}

// =============================================================================
// Update Planning
// =============================================================================

/// Replace any registered base rules with a fresh base tier.
pub fn plan_base_update(existing_ids: &[i32]) -> RuleUpdate {
    RuleUpdate {
        add_rules: base_rules(),
        remove_rule_ids: existing_ids.iter().copied().filter(|&id| is_base_id(id)).collect(),
    }
}

/// Replace every registered dynamic-range rule with rules for `whitelist`.
pub fn plan_whitelist_update(existing_ids: &[i32], whitelist: &[String]) -> (RuleUpdate, CompileStats) {
    let (add_rules, stats) = compile_whitelist(whitelist);
    let update = RuleUpdate {
        add_rules,
        remove_rule_ids: existing_ids.iter().copied().filter(|&id| is_dynamic_id(id)).collect(),
    };
    (update, stats)
}
