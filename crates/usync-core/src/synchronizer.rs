//! Contracts between the engine and its external collaborators.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::manifest::{Manifest, SyncHeaders};
use crate::types::{
    ResourcePreview, SyncResource, SyncResourceHandle, SyncResourcePreview, SyncStatus,
};

/// Per-resource synchronization engine.
///
/// One instance exists per [`SyncResource`]; it owns the private diff/merge
/// algorithm for that resource type and is driven strictly sequentially by
/// the orchestrator, never concurrently.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// The resource this synchronizer owns
    fn resource(&self) -> SyncResource;

    /// Current status of this synchronizer
    fn status(&self) -> SyncStatus;

    /// Currently conflicting previews
    fn conflicts(&self) -> Vec<ResourcePreview>;

    /// All current previews, conflicting or not
    fn resource_previews(&self) -> Vec<ResourcePreview>;

    /// Take the remote copy, discarding local edits
    async fn pull(&self) -> SyncResult<()>;

    /// Take the local copy, overwriting the remote
    async fn push(&self) -> SyncResult<()>;

    /// Run a full pull/merge/push cycle against the given manifest
    async fn sync(&self, manifest: Option<&Manifest>, headers: &SyncHeaders) -> SyncResult<()>;

    /// Stop any in-flight work
    async fn stop(&self) -> SyncResult<()>;

    /// One-time idempotent recovery of locally persisted state.
    ///
    /// Invoked once per process for the Settings resource before the first
    /// sync pass; must be safe to call repeatedly.
    async fn repair(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Replace the resource named by `resource_id` with its last synced
    /// content. Returns false when this synchronizer does not own the id.
    async fn replace(&self, resource_id: &str) -> SyncResult<bool>;

    /// Accept content for the preview slot named by `resource_id`.
    ///
    /// `force` means the caller takes one side wholesale (local or remote)
    /// rather than an edited merge draft. Returns the updated preview, or
    /// `None` when the resource is fully resolved.
    async fn accept_preview_content(
        &self,
        resource_id: &str,
        content: Option<&str>,
        force: bool,
        headers: &SyncHeaders,
    ) -> SyncResult<Option<SyncResourcePreview>>;

    /// Resolve the content behind `resource_id`, if this synchronizer owns it
    async fn resolve_content(&self, resource_id: &str) -> SyncResult<Option<String>>;

    /// Produce a preview of what a sync would change, without mutating
    /// durable state. `None` means no preview is needed.
    async fn preview(
        &self,
        manifest: Option<&Manifest>,
        headers: &SyncHeaders,
    ) -> SyncResult<Option<SyncResourcePreview>>;

    /// Regenerate the current preview from local state only
    async fn generate_sync_resource_preview(&self) -> SyncResult<Option<SyncResourcePreview>> {
        Ok(None)
    }

    /// Whether any local data exists for this resource
    async fn has_local_data(&self) -> SyncResult<bool>;

    /// Whether this resource has ever completed a sync on this machine
    async fn has_previously_synced(&self) -> SyncResult<bool>;

    /// Whether the remote store holds data for this resource
    async fn has_remote_data(&self) -> SyncResult<bool>;

    /// Remove all locally persisted sync state
    async fn reset_local(&self) -> SyncResult<()>;

    /// Handles to remote revisions of this resource
    async fn remote_sync_resource_handles(&self) -> SyncResult<Vec<SyncResourceHandle>> {
        Ok(Vec::new())
    }

    /// Handles to local backups of this resource
    async fn local_sync_resource_handles(&self) -> SyncResult<Vec<SyncResourceHandle>> {
        Ok(Vec::new())
    }

    /// Resource identifiers stored under the given handle
    async fn associated_resources(
        &self,
        _handle: &SyncResourceHandle,
    ) -> SyncResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Machine that produced the revision behind the given handle
    async fn machine_id(&self, _handle: &SyncResourceHandle) -> SyncResult<Option<String>> {
        Ok(None)
    }
}

/// Client for the remote store (network transport, authentication).
#[async_trait]
pub trait RemoteStoreClient: Send + Sync {
    /// Whether a remote store is configured at all
    fn is_configured(&self) -> bool;

    /// Whether an authenticated session exists
    fn is_authenticated(&self) -> bool;

    /// Fetch the current remote manifest; `None` means no remote data yet
    async fn manifest(&self, headers: &SyncHeaders) -> SyncResult<Option<Manifest>>;

    /// Wipe all remote data
    async fn clear(&self) -> SyncResult<()>;
}

/// Minimal persistent key-value storage used for sync bookkeeping.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get_i64(&self, key: &str) -> SyncResult<Option<i64>>;

    async fn set_i64(&self, key: &str, value: i64) -> SyncResult<()>;

    async fn remove(&self, key: &str) -> SyncResult<()>;
}

/// Sink for sync error telemetry.
///
/// Receives one event whenever a [`crate::SyncError`] escapes to a top-level
/// caller, correlated by the attempt's execution id.
pub trait TelemetrySink: Send + Sync {
    fn report_error(&self, event: &str, resource: Option<SyncResource>, execution_id: &str);
}
