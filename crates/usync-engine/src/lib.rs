//! Sync orchestration engine for usync.
//!
//! This crate drives a fixed, ordered collection of per-resource
//! synchronizers under a single status/error model:
//! - [`SyncOrchestrator`] for fully automatic pull/merge/push passes
//! - [`ManualSyncTask`] for the interactive preview/resolve workflow
//! - storage implementations for the engine's bookkeeping

pub mod manual;
pub mod orchestrator;
pub mod storage;

pub use manual::ManualSyncTask;
pub use orchestrator::{SyncOrchestrator, SyncTask};
pub use storage::{FileStorage, MemoryStorage};
