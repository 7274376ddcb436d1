//! Cyber Guardian Core Library
//!
//! This crate holds everything about the navigation filter that does not need
//! an async runtime: the rule model shared with the host's declarative
//! request-filtering engine, domain validation, regex construction and the
//! planning of atomic rule updates.
//!
//! # Architecture
//!
//! The host engine evaluates rules against every top-level navigation; this
//! crate never sees live requests. It only decides which rules should be
//! registered:
//!
//! - three fixed base rules (allow `.com`, allow `.org`/`.in`, redirect the rest)
//! - one allow rule per whitelisted domain, at a priority above the base tier
//!
//! # Modules
//!
//! - `config`: rule ids, priorities and other fixed constants
//! - `types`: rules and rule updates in the host engine's JSON shape
//! - `domain`: whitelist entry normalization and validation
//! - `pattern`: anchored regex construction for domains and TLDs
//! - `rules`: base/whitelist rule construction and update planning
//! - `engine`: host rule engine interface and an in-memory evaluator
//! - `store`: host key-value store interface and an in-memory store
//! - `page`: blocked page navigation helpers

pub mod config;
pub mod domain;
pub mod engine;
pub mod page;
pub mod pattern;
pub mod rules;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use domain::{is_valid, normalize, DomainError};
pub use engine::{EngineError, MemoryRuleEngine, RuleEngineClient, Verdict};
pub use pattern::to_match_pattern;
pub use rules::{base_rules, plan_base_update, plan_whitelist_update, whitelist_rules, CompileStats};
pub use store::{KeyValueStore, MemoryStore, StorageArea, StorageChange, StoreError};
pub use types::{ResourceType, Rule, RuleAction, RuleCondition, RuleUpdate};
