//! Core type definitions for Cyber Guardian
//!
//! These types serialize to the JSON shape the host's declarative
//! request-filtering engine accepts for dynamic rules.

use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Types
// =============================================================================

/// Resource type a rule condition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Top-level document of a tab
    MainFrame,
    /// iframe/frame document
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Other,
}

impl ResourceType {
    /// Parse from the browser's resource type name.
    pub fn from_name(s: &str) -> Self {
        match s {
            "main_frame" | "document" => Self::MainFrame,
            "sub_frame" | "subdocument" => Self::SubFrame,
            "stylesheet" => Self::Stylesheet,
            "script" => Self::Script,
            "image" => Self::Image,
            "font" => Self::Font,
            "object" => Self::Object,
            "xmlhttprequest" | "xhr" => Self::Xmlhttprequest,
            "ping" => Self::Ping,
            "csp_report" => Self::CspReport,
            "media" => Self::Media,
            "websocket" => Self::Websocket,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MainFrame => "main_frame",
            Self::SubFrame => "sub_frame",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Object => "object",
            Self::Xmlhttprequest => "xmlhttprequest",
            Self::Ping => "ping",
            Self::CspReport => "csp_report",
            Self::Media => "media",
            Self::Websocket => "websocket",
            Self::Other => "other",
        }
    }
}

// =============================================================================
// Rule Actions
// =============================================================================

/// Redirect target inside the extension bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub extension_path: String,
}

/// Action the host engine performs when a rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    /// Let the navigation continue
    Allow,
    /// Load a page from the extension bundle instead
    Redirect { redirect: Redirect },
}

impl RuleAction {
    pub fn redirect_to(extension_path: impl Into<String>) -> Self {
        Self::Redirect {
            redirect: Redirect {
                extension_path: extension_path.into(),
            },
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

// =============================================================================
// Rules
// =============================================================================

/// URL condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// RE2-compatible regular expression matched against the full URL
    pub regex_filter: String,
    pub resource_types: Vec<ResourceType>,
}

/// A prioritized match/action rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub id: i32,
    pub priority: i32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl Rule {
    /// Allow rule scoped to top-level navigations.
    pub fn allow(id: i32, priority: i32, regex_filter: impl Into<String>) -> Self {
        Self::navigation(id, priority, RuleAction::Allow, regex_filter)
    }

    /// Redirect rule scoped to top-level navigations.
    pub fn redirect(
        id: i32,
        priority: i32,
        regex_filter: impl Into<String>,
        extension_path: impl Into<String>,
    ) -> Self {
        Self::navigation(id, priority, RuleAction::redirect_to(extension_path), regex_filter)
    }

    fn navigation(id: i32, priority: i32, action: RuleAction, regex_filter: impl Into<String>) -> Self {
        Self {
            id,
            priority,
            action,
            condition: RuleCondition {
                regex_filter: regex_filter.into(),
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }

    pub fn applies_to(&self, resource_type: ResourceType) -> bool {
        self.condition.resource_types.contains(&resource_type)
    }
}

// =============================================================================
// Rule Updates
// =============================================================================

/// One atomic batch for the host engine: removals are applied before additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub add_rules: Vec<Rule>,
    pub remove_rule_ids: Vec<i32>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.add_rules.is_empty() && self.remove_rule_ids.is_empty()
    }
}
