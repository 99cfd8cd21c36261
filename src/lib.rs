//! usync user-data synchronization engine.
//!
//! Keeps a user's settings, keybindings, snippets, extensions, and other
//! global state consistent between a local machine and a remote store, with
//! conflict detection and human-mediated resolution. The concrete
//! per-resource synchronizers, the remote store client, durable storage, and
//! the telemetry backend are supplied by the embedder behind the contracts
//! in [`usync_core`].

pub use usync_core::{
    Change, KeyValueStorage, Manifest, RemoteStoreClient, ResourcePreview, SyncError, SyncHeaders,
    SyncResource, SyncResourceConflicts, SyncResourceHandle, SyncResourcePreview, SyncResult,
    SyncStatus, Synchronizer, TelemetrySink, HEADER_EXECUTION_ID, LAST_SYNC_TIME_KEY,
};
pub use usync_engine::{FileStorage, ManualSyncTask, MemoryStorage, SyncOrchestrator, SyncTask};

/// Initialize logging for the entire system
pub fn init() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();
}

/// Version of the usync system
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
