//! Interactive, human-reviewed synchronization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use usync_core::{
    Manifest, SyncError, SyncHeaders, SyncResource, SyncResourcePreview, SyncResult, Synchronizer,
};

/// Two-phase (preview then resolve) synchronization task.
///
/// The cached preview list is the task's implicit state: absent means "not
/// yet previewed" and every mutating operation fails fast; present and
/// non-empty means "awaiting resolution"; present and empty means "fully
/// applied". `stop()` is terminal.
pub struct ManualSyncTask {
    synchronizers: Vec<Arc<dyn Synchronizer>>,
    manifest: Option<Manifest>,
    execution_id: String,
    headers: SyncHeaders,
    previews: Mutex<Option<Vec<(SyncResource, SyncResourcePreview)>>>,
    token: CancellationToken,
    stopped: AtomicBool,
}

impl ManualSyncTask {
    pub(crate) fn new(
        synchronizers: Vec<Arc<dyn Synchronizer>>,
        manifest: Option<Manifest>,
        execution_id: String,
        headers: SyncHeaders,
    ) -> Self {
        Self {
            synchronizers,
            manifest,
            execution_id,
            headers,
            previews: Mutex::new(None),
            token: CancellationToken::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Execution id correlating this task's requests and telemetry
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// The manifest this task was created against
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Fetch (once) the per-resource previews.
    ///
    /// The result is cached; duplicate calls return it without touching the
    /// synchronizers again. Synchronizers reporting no preview needed are
    /// skipped.
    pub async fn preview(&self) -> SyncResult<Vec<(SyncResource, SyncResourcePreview)>> {
        if self.token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let mut cache = self.previews.lock().await;
        if let Some(previews) = cache.as_ref() {
            return Ok(previews.clone());
        }

        let mut previews = Vec::new();
        for synchronizer in &self.synchronizers {
            if self.token.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let resource = synchronizer.resource();
            debug!(%resource, "previewing resource");
            match synchronizer
                .preview(self.manifest.as_ref(), &self.headers)
                .await?
            {
                Some(preview) => previews.push((resource, preview)),
                None => continue,
            }
        }

        info!(count = previews.len(), "preview complete");
        *cache = Some(previews.clone());
        Ok(previews)
    }

    /// Accept content for the preview slot named by `resource_id`.
    ///
    /// Accepting the local or remote slot takes that side wholesale (force);
    /// accepting the merge-preview slot submits an edited draft. The owning
    /// entry is replaced in place, or removed once fully resolved.
    pub async fn accept(&self, resource_id: &str, content: Option<&str>) -> SyncResult<()> {
        let mut cache = self.previews.lock().await;
        let previews = cache.as_mut().ok_or(SyncError::PreviewNotReady)?;

        let index = previews
            .iter()
            .position(|(_, preview)| {
                preview
                    .resource_previews
                    .iter()
                    .any(|p| p.matches(resource_id))
            })
            .ok_or_else(|| SyncError::other(format!("no preview for resource {resource_id}")))?;

        let (resource, preview) = &previews[index];
        let force = preview
            .resource_previews
            .iter()
            .find(|p| p.matches(resource_id))
            .map(|p| p.takes_side(resource_id))
            .unwrap_or(false);

        let synchronizer = self.synchronizer_for(*resource)?;
        match synchronizer
            .accept_preview_content(resource_id, content, force, &self.headers)
            .await?
        {
            Some(updated) => previews[index].1 = updated,
            None => {
                previews.remove(index);
            }
        }
        Ok(())
    }

    /// Auto-resolve every conflict-free sub-preview.
    ///
    /// Conflicted sub-previews are left untouched for manual [`Self::accept`];
    /// resources that fully resolve drop out of the pending list.
    pub async fn merge(&self) -> SyncResult<()> {
        let mut cache = self.previews.lock().await;
        let previews = cache.as_mut().ok_or(SyncError::PreviewNotReady)?;

        let mut remaining = Vec::with_capacity(previews.len());
        for (resource, preview) in previews.iter() {
            let synchronizer = self.synchronizer_for(*resource)?;
            let mut current = Some(preview.clone());
            for sub in preview.resource_previews.iter().filter(|p| !p.has_conflicts) {
                let content = synchronizer.resolve_content(&sub.preview_resource).await?;
                current = synchronizer
                    .accept_preview_content(
                        &sub.preview_resource,
                        content.as_deref(),
                        false,
                        &self.headers,
                    )
                    .await?;
                if current.is_none() {
                    break;
                }
            }
            if let Some(updated) = current {
                remaining.push((*resource, updated));
            }
        }

        *previews = remaining;
        Ok(())
    }

    /// Force-resolve every pending sub-preview toward the remote content,
    /// committing the task.
    pub async fn pull(&self) -> SyncResult<()> {
        let mut cache = self.previews.lock().await;
        let previews = cache.as_mut().ok_or(SyncError::PreviewNotReady)?;

        for (resource, preview) in previews.iter() {
            let synchronizer = self.synchronizer_for(*resource)?;
            for sub in &preview.resource_previews {
                synchronizer
                    .accept_preview_content(&sub.remote_resource, None, true, &self.headers)
                    .await?;
            }
            info!(%resource, "pulled remote content");
        }

        previews.clear();
        Ok(())
    }

    /// Force-resolve every pending sub-preview toward the local content,
    /// committing the task.
    pub async fn push(&self) -> SyncResult<()> {
        let mut cache = self.previews.lock().await;
        let previews = cache.as_mut().ok_or(SyncError::PreviewNotReady)?;

        for (resource, preview) in previews.iter() {
            let synchronizer = self.synchronizer_for(*resource)?;
            for sub in &preview.resource_previews {
                synchronizer
                    .accept_preview_content(&sub.local_resource, None, true, &self.headers)
                    .await?;
            }
            info!(%resource, "pushed local content");
        }

        previews.clear();
        Ok(())
    }

    /// Cancel any in-flight preview, discard the cache, and stop every
    /// synchronizer. Terminal.
    pub async fn stop(&self) -> SyncResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.token.cancel();
        *self.previews.lock().await = None;

        for synchronizer in &self.synchronizers {
            if let Err(err) = synchronizer.stop().await {
                if !err.is_cancelled() {
                    warn!(resource = %synchronizer.resource(), error = %err, "failed to stop synchronizer");
                }
            }
        }
        info!(execution_id = %self.execution_id, "manual sync task stopped");
        Ok(())
    }

    fn synchronizer_for(&self, resource: SyncResource) -> SyncResult<&Arc<dyn Synchronizer>> {
        self.synchronizers
            .iter()
            .find(|s| s.resource() == resource)
            .ok_or_else(|| SyncError::other(format!("no synchronizer for {resource}")))
    }
}
