//! Whitelist management behind the options page
//!
//! List, add and remove over the stored whitelist. Input is validated before
//! any write; every outcome maps to a toast the page can show as-is.

use std::sync::Arc;

use log::{error, info};

use cg_core::domain::{self, normalize, DomainError, EMPTY_INPUT_MESSAGE, INVALID_INPUT_MESSAGE};
use cg_core::store::{read_whitelist, write_whitelist, KeyValueStore, StoreError};

/// Error type for whitelist edits. The display text is the user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum WhitelistError {
    #[error("{}", EMPTY_INPUT_MESSAGE)]
    Empty,
    #[error("{}", INVALID_INPUT_MESSAGE)]
    Invalid {
        domain: String,
        #[source]
        reason: DomainError,
    },
    #[error("Domain already exists")]
    Duplicate(String),
    #[error("Failed to load data")]
    Load(#[source] StoreError),
    #[error("Failed to add domain")]
    Add(#[source] StoreError),
    #[error("Failed to remove domain")]
    Remove(#[source] StoreError),
}

// =============================================================================
// Toasts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// Transient feedback message for the options page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }
}

impl From<&WhitelistError> for Toast {
    fn from(e: &WhitelistError) -> Self {
        Toast::error(e.to_string())
    }
}

// =============================================================================
// Outcomes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Added {
    pub domain: String,
    pub total: usize,
}

impl Added {
    pub fn toast(&self) -> Toast {
        Toast::success(format!("Added \"{}\" to whitelist", self.domain))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { domain: String, remaining: usize },
    /// The confirmation prompt was declined.
    Cancelled,
    /// Nothing matched; storage was not written.
    NotPresent,
}

impl RemoveOutcome {
    pub fn toast(&self) -> Option<Toast> {
        match self {
            Self::Removed { domain, .. } => Some(Toast::success(format!("Removed \"{}\"", domain))),
            Self::Cancelled | Self::NotPresent => None,
        }
    }
}

/// Toast for the result of an add.
pub fn add_toast(result: &Result<Added, WhitelistError>) -> Toast {
    match result {
        Ok(added) => added.toast(),
        Err(e) => e.into(),
    }
}

// =============================================================================
// Manager
// =============================================================================

pub struct WhitelistManager {
    store: Arc<dyn KeyValueStore>,
}

impl WhitelistManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<String>, WhitelistError> {
        read_whitelist(self.store.as_ref()).await.map_err(|e| {
            error!("Failed to load whitelist: {}", e);
            WhitelistError::Load(e)
        })
    }

    /// Normalize, validate and append `raw`. Rejected input never reaches storage.
    pub async fn add(&self, raw: &str) -> Result<Added, WhitelistError> {
        let domain = normalize(raw);
        if domain.is_empty() {
            return Err(WhitelistError::Empty);
        }
        domain::check(&domain).map_err(|reason| WhitelistError::Invalid {
            domain: domain.clone(),
            reason,
        })?;

        let mut whitelist = read_whitelist(self.store.as_ref()).await.map_err(|e| {
            error!("Failed to add domain {}: {}", domain, e);
            WhitelistError::Add(e)
        })?;

        if whitelist.iter().any(|entry| normalize(entry) == domain) {
            return Err(WhitelistError::Duplicate(domain));
        }

        whitelist.push(domain.clone());
        write_whitelist(self.store.as_ref(), &whitelist).await.map_err(|e| {
            error!("Failed to add domain {}: {}", domain, e);
            WhitelistError::Add(e)
        })?;

        info!("Added domain: {}", domain);
        Ok(Added {
            domain,
            total: whitelist.len(),
        })
    }

    /// Remove every entry equal to `domain` after normalization, once
    /// `confirm` accepts the prompt it is given.
    pub async fn remove<F>(&self, domain: &str, confirm: F) -> Result<RemoveOutcome, WhitelistError>
    where
        F: FnOnce(&str) -> bool,
    {
        if !confirm(&format!("Remove \"{}\" from whitelist?", domain)) {
            return Ok(RemoveOutcome::Cancelled);
        }

        let target = normalize(domain);
        let whitelist = read_whitelist(self.store.as_ref()).await.map_err(|e| {
            error!("Failed to remove domain {}: {}", domain, e);
            WhitelistError::Remove(e)
        })?;

        let remaining: Vec<String> = whitelist
            .iter()
            .filter(|entry| normalize(entry) != target)
            .cloned()
            .collect();
        if remaining.len() == whitelist.len() {
            return Ok(RemoveOutcome::NotPresent);
        }

        write_whitelist(self.store.as_ref(), &remaining).await.map_err(|e| {
            error!("Failed to remove domain {}: {}", domain, e);
            WhitelistError::Remove(e)
        })?;

        info!("Removed domain: {} ({} remaining)", domain, remaining.len());
        Ok(RemoveOutcome::Removed {
            domain: domain.to_string(),
            remaining: remaining.len(),
        })
    }
}
