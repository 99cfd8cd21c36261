//! Core types and contracts for the usync user-data synchronization engine.
//!
//! This crate provides the shared data model, the error taxonomy, and the
//! collaborator traits (synchronizers, remote store client, durable storage,
//! telemetry) that the engine crate orchestrates.

pub mod error;
pub mod manifest;
pub mod synchronizer;
pub mod types;

// Re-export commonly used types
pub use crate::error::{SyncError, SyncResult};
pub use crate::manifest::{Manifest, SyncHeaders, HEADER_EXECUTION_ID};
pub use crate::synchronizer::{KeyValueStorage, RemoteStoreClient, Synchronizer, TelemetrySink};
pub use crate::types::{
    Change, ResourcePreview, SyncResource, SyncResourceConflicts, SyncResourceHandle,
    SyncResourcePreview, SyncStatus,
};

/// Storage key holding the last successful sync time in epoch milliseconds.
pub const LAST_SYNC_TIME_KEY: &str = "sync.lastSyncTime";
