//! Fixed identifiers, priorities and names shared by every component.

// =============================================================================
// Rule Identifiers
// =============================================================================

/// Base rule allowing hosts under `.com`.
pub const ALLOW_COM_RULE_ID: i32 = 1;
/// Base rule allowing hosts under `.org` and `.in`.
pub const ALLOW_ORG_RULE_ID: i32 = 2;
/// Catch-all rule redirecting every other navigation to the blocked page.
pub const BLOCK_OTHERS_RULE_ID: i32 = 3;

/// All base rule ids, in registration order.
pub const BASE_RULE_IDS: [i32; 3] = [ALLOW_COM_RULE_ID, ALLOW_ORG_RULE_ID, BLOCK_OTHERS_RULE_ID];

/// First id of the dynamic whitelist range. Whitelist rule `i` gets `DYNAMIC_RULE_START_ID + i`.
pub const DYNAMIC_RULE_START_ID: i32 = 1000;

// =============================================================================
// Priorities
// =============================================================================

/// Whitelist rules override both base tiers.
pub const WHITELIST_PRIORITY: i32 = 200;
/// Priority of the TLD allow tier.
pub const BASE_ALLOW_PRIORITY: i32 = 100;
/// Priority of the catch-all redirect.
pub const BLOCK_PRIORITY: i32 = 1;

// =============================================================================
// Allowed TLDs
// =============================================================================

pub const COM_TLDS: &[&str] = &["com"];
pub const ORG_TLDS: &[&str] = &["org", "in"];

// =============================================================================
// Storage & Pages
// =============================================================================

/// Key of the whitelist array in the synced store.
pub const WHITELIST_KEY: &str = "whitelist";

/// Per-item quota of the browser's synced storage area, in bytes.
pub const SYNC_QUOTA_BYTES_PER_ITEM: usize = 8192;

/// Extension-relative path of the page shown for blocked navigations.
pub const BLOCKED_PAGE_PATH: &str = "/blocked.html";

pub const MAX_DOMAIN_LEN: usize = 253;
pub const MAX_LABEL_LEN: usize = 63;
