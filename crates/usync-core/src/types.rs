use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synchronizable user-data domain.
///
/// Stable identifier used as a map key throughout the engine. The order of
/// [`SyncResource::ALL`] is the canonical order in which synchronizers are
/// driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncResource {
    /// User settings file
    Settings,
    /// Keyboard shortcut customizations
    Keybindings,
    /// Code snippets
    Snippets,
    /// Cross-device global state (UI state, enablement flags)
    GlobalState,
    /// Installed extensions
    Extensions,
}

impl SyncResource {
    /// Canonical synchronization order.
    pub const ALL: [SyncResource; 5] = [
        SyncResource::Settings,
        SyncResource::Keybindings,
        SyncResource::Snippets,
        SyncResource::GlobalState,
        SyncResource::Extensions,
    ];

    /// Wire name of the resource.
    pub fn name(&self) -> &'static str {
        match self {
            SyncResource::Settings => "settings",
            SyncResource::Keybindings => "keybindings",
            SyncResource::Snippets => "snippets",
            SyncResource::GlobalState => "globalState",
            SyncResource::Extensions => "extensions",
        }
    }
}

impl fmt::Display for SyncResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregate status of the engine or of a single synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// The remote store is not configured
    Uninitialized,
    /// Nothing in flight, no pending conflicts
    Idle,
    /// A synchronization pass is in progress
    Syncing,
    /// At least one resource has unresolved conflicts
    HasConflicts,
}

impl SyncStatus {
    /// Pointwise-worst status across synchronizers.
    ///
    /// `HasConflicts` dominates `Syncing`, which dominates `Idle`. When the
    /// remote store is unconfigured the result is `Uninitialized` regardless
    /// of the individual statuses. Independent of iteration order.
    pub fn aggregate(configured: bool, statuses: impl IntoIterator<Item = SyncStatus>) -> Self {
        if !configured {
            return SyncStatus::Uninitialized;
        }
        let mut aggregate = SyncStatus::Idle;
        for status in statuses {
            match status {
                SyncStatus::HasConflicts => return SyncStatus::HasConflicts,
                SyncStatus::Syncing => aggregate = SyncStatus::Syncing,
                _ => {}
            }
        }
        aggregate
    }
}

/// Kind of change detected on one side of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// No change
    #[default]
    None,
    /// Resource was created
    Added,
    /// Resource content was modified
    Modified,
    /// Resource was deleted
    Deleted,
}

/// One candidate change-set for one resource inside one synchronizer.
///
/// The identifier slots are opaque to the engine; synchronizers mint them and
/// are the only components that interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePreview {
    /// Identifier of the local copy
    pub local_resource: String,
    /// Identifier of the merge-preview draft
    pub preview_resource: String,
    /// Identifier of the remote copy
    pub remote_resource: String,
    /// Identifier of the machine-merged result
    pub merged_resource: String,
    /// Identifier of the accepted result, once resolved
    pub accepted_resource: String,
    /// Change detected on the local side
    pub local_change: Change,
    /// Change detected on the remote side
    pub remote_change: Change,
    /// Whether local and remote changes collide
    pub has_conflicts: bool,
}

impl ResourcePreview {
    /// Whether `id` names the local, preview, or remote slot of this preview.
    pub fn matches(&self, id: &str) -> bool {
        id == self.local_resource || id == self.preview_resource || id == self.remote_resource
    }

    /// Whether accepting `id` takes one side wholesale (local or remote), as
    /// opposed to editing the merge-preview draft.
    pub fn takes_side(&self, id: &str) -> bool {
        id == self.local_resource || id == self.remote_resource
    }
}

/// Preview produced by one synchronizer for one sync attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResourcePreview {
    /// Whether the last remote write came from this machine
    pub is_last_sync_from_current_machine: bool,
    /// Per-resource candidate change-sets
    pub resource_previews: Vec<ResourcePreview>,
}

impl SyncResourcePreview {
    /// Whether any sub-preview still has unresolved conflicts.
    pub fn has_conflicts(&self) -> bool {
        self.resource_previews.iter().any(|p| p.has_conflicts)
    }
}

/// All currently-conflicting previews of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResourceConflicts {
    /// Owning resource
    pub resource: SyncResource,
    /// Conflicting previews
    pub conflicts: Vec<ResourcePreview>,
}

/// Handle to a stored sync snapshot (remote revision or local backup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResourceHandle {
    /// Snapshot creation time
    pub created: DateTime<Utc>,
    /// Opaque snapshot identifier
    pub identifier: String,
}
