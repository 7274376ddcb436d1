//! Blocked page navigation helpers

pub use crate::config::BLOCKED_PAGE_PATH;

/// Where "go back" lands when the tab has no history to return to.
pub const FALLBACK_URL: &str = "https://www.google.com";

/// Instructions shown when the options page cannot be opened programmatically.
pub const SETTINGS_INSTRUCTIONS: &str = "To access settings:\n\n\
    1. Go to chrome://extensions/\n\
    2. Find \"Cyber Guardian\"\n\
    3. Click \"Details\" then \"Extension options\"";

/// What the blocked page's "go back" button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackAction {
    /// Step back in the tab's history
    History,
    /// Load a fixed URL instead
    Navigate(&'static str),
}

/// Pick the back action for a tab whose history holds `history_len` entries.
/// The blocked page itself is one of them.
pub fn back_action(history_len: u32) -> BackAction {
    if history_len > 1 {
        BackAction::History
    } else {
        BackAction::Navigate(FALLBACK_URL)
    }
}
