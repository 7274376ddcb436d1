//! Cyber Guardian Rule Synchronization
//!
//! This crate keeps the host engine's dynamic rules in step with the stored
//! whitelist and hosts the logic behind the options page.
//!
//! # Modules
//!
//! - `synchronizer`: serialized, coalescing base/whitelist rule installation
//! - `events`: lifecycle and storage-change subscriptions
//! - `whitelist`: validated add/remove/list with user-facing toasts
//! - `file_store`: JSON file backed key-value store

pub mod events;
pub mod file_store;
pub mod synchronizer;
pub mod whitelist;

pub use events::{handle_lifecycle, spawn_storage_listener, Background, LifecycleEvent};
pub use file_store::FileStore;
pub use synchronizer::{RebuildOutcome, RuleSynchronizer, SyncError};
pub use whitelist::{Toast, ToastKind, WhitelistError, WhitelistManager};
