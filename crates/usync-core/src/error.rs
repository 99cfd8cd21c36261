use thiserror::Error;

use crate::types::SyncResource;

/// Custom result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Closed error taxonomy for sync operations.
///
/// The abort-class variants (`TooManyRequests`, `LocalTooManyRequests`,
/// `Gone`, `UpgradeRequired`, `Incompatible`) always terminate an in-progress
/// multi-resource pass; `TooLarge` terminates it tagged with the offending
/// resource; everything else is isolated to the resource it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Remote store rejected the payload as too large
    #[error("payload too large for remote store")]
    TooLarge { resource: Option<SyncResource> },

    /// Remote store is rate limiting this account
    #[error("too many requests to remote store")]
    TooManyRequests,

    /// This machine exceeded its local request budget
    #[error("too many requests from this machine")]
    LocalTooManyRequests,

    /// Remote data was wiped since the manifest was fetched
    #[error("remote data is gone")]
    Gone,

    /// Remote store requires a newer client
    #[error("client upgrade required")]
    UpgradeRequired,

    /// Client and remote store speak incompatible versions
    #[error("client is incompatible with remote store")]
    Incompatible,

    /// Remote store is not configured
    #[error("sync is not enabled")]
    NotEnabled,

    /// No authenticated session
    #[error("no authenticated session")]
    Unauthorized,

    /// A sync task's run() was invoked more than once
    #[error("sync task can run only once")]
    TaskAlreadyRun,

    /// A manual sync task was mutated before being previewed
    #[error("task is not previewed yet")]
    PreviewNotReady,

    /// The operation was cancelled cooperatively
    #[error("operation was cancelled")]
    Cancelled,

    /// Resource-local failure, recoverable by the next attempt
    #[error("{resource} sync failed: {message}")]
    Resource {
        resource: SyncResource,
        message: String,
    },

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Create a new unclassified error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SyncError::Other(msg.into())
    }

    /// Create a new resource-local error
    pub fn resource<S: Into<String>>(resource: SyncResource, msg: S) -> Self {
        SyncError::Resource {
            resource,
            message: msg.into(),
        }
    }

    /// Create a payload-too-large error without a resource tag
    pub fn too_large() -> Self {
        SyncError::TooLarge { resource: None }
    }

    /// Whether this error must abort an entire multi-resource pass.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            SyncError::TooManyRequests
                | SyncError::LocalTooManyRequests
                | SyncError::Gone
                | SyncError::UpgradeRequired
                | SyncError::Incompatible
        )
    }

    /// Whether this error reports cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    /// Tag this error with its originating resource.
    ///
    /// Abort-class errors keep their identity; `TooLarge` and unclassified
    /// errors pick up the resource so callers know which one failed.
    pub fn with_resource(self, resource: SyncResource) -> Self {
        match self {
            SyncError::TooLarge { .. } => SyncError::TooLarge {
                resource: Some(resource),
            },
            SyncError::Other(message) => SyncError::Resource { resource, message },
            other => other,
        }
    }

    /// The originating resource, if this error carries one.
    pub fn resource_tag(&self) -> Option<SyncResource> {
        match self {
            SyncError::TooLarge { resource } => *resource,
            SyncError::Resource { resource, .. } => Some(*resource),
            _ => None,
        }
    }

    /// Stable telemetry event name for this error kind.
    pub fn telemetry_event(&self) -> &'static str {
        match self {
            SyncError::TooLarge { .. } => "sync/errorTooLarge",
            SyncError::TooManyRequests => "sync/errorTooManyRequests",
            SyncError::LocalTooManyRequests => "sync/errorLocalTooManyRequests",
            SyncError::Gone => "sync/errorGone",
            SyncError::UpgradeRequired => "sync/errorUpgradeRequired",
            SyncError::Incompatible => "sync/errorIncompatible",
            SyncError::NotEnabled => "sync/errorNotEnabled",
            SyncError::Unauthorized => "sync/errorUnauthorized",
            SyncError::TaskAlreadyRun => "sync/errorTaskAlreadyRun",
            SyncError::PreviewNotReady => "sync/errorPreviewNotReady",
            SyncError::Cancelled => "sync/errorCancelled",
            SyncError::Resource { .. } | SyncError::Other(_) => "sync/errorUnknown",
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Other(err.to_string())
    }
}
