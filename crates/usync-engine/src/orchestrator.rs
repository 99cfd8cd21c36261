//! Automatic synchronization across all resources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use usync_core::{
    KeyValueStorage, Manifest, RemoteStoreClient, SyncError, SyncHeaders, SyncResource,
    SyncResourceConflicts, SyncResourceHandle, SyncResourcePreview, SyncResult, SyncStatus,
    Synchronizer, TelemetrySink, LAST_SYNC_TIME_KEY,
};

use crate::manual::ManualSyncTask;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Top-level synchronization service.
///
/// Owns a fixed, ordered collection of synchronizers for its process
/// lifetime, aggregates their status and conflicts, and drives automatic
/// pull/merge/push passes. Synchronizers are invoked strictly sequentially;
/// all shared state is only touched between awaited calls into them.
pub struct SyncOrchestrator {
    synchronizers: Vec<Arc<dyn Synchronizer>>,
    store: Arc<dyn RemoteStoreClient>,
    storage: Arc<dyn KeyValueStorage>,
    telemetry: Arc<dyn TelemetrySink>,
    status: RwLock<SyncStatus>,
    conflicts: RwLock<Vec<SyncResourceConflicts>>,
    last_sync_time: RwLock<Option<i64>>,
    settings_repaired: AtomicBool,
    status_tx: broadcast::Sender<SyncStatus>,
    conflicts_tx: broadcast::Sender<Vec<SyncResourceConflicts>>,
    resource_tx: broadcast::Sender<SyncResource>,
    errors_tx: broadcast::Sender<Vec<SyncError>>,
}

impl SyncOrchestrator {
    /// Create a new orchestrator over the given synchronizers.
    ///
    /// Reads the persisted last-sync-time and computes the initial aggregate
    /// status from the synchronizers' current state.
    pub async fn new(
        synchronizers: Vec<Arc<dyn Synchronizer>>,
        store: Arc<dyn RemoteStoreClient>,
        storage: Arc<dyn KeyValueStorage>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let last_sync_time = match storage.get_i64(LAST_SYNC_TIME_KEY).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "failed to read last sync time");
                None
            }
        };

        let initial_status = SyncStatus::aggregate(
            store.is_configured(),
            synchronizers.iter().map(|s| s.status()),
        );
        let initial_conflicts: Vec<SyncResourceConflicts> = synchronizers
            .iter()
            .filter(|s| s.status() == SyncStatus::HasConflicts)
            .filter_map(|s| {
                let conflicts = s.conflicts();
                (!conflicts.is_empty()).then(|| SyncResourceConflicts {
                    resource: s.resource(),
                    conflicts,
                })
            })
            .collect();

        let (status_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (conflicts_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (resource_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (errors_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            synchronizers,
            store,
            storage,
            telemetry,
            status: RwLock::new(initial_status),
            conflicts: RwLock::new(initial_conflicts),
            last_sync_time: RwLock::new(last_sync_time),
            settings_repaired: AtomicBool::new(false),
            status_tx,
            conflicts_tx,
            resource_tx,
            errors_tx,
        }
    }

    /// Current aggregate status
    pub async fn status(&self) -> SyncStatus {
        *self.status.read().await
    }

    /// Current conflicts, grouped by resource
    pub async fn conflicts(&self) -> Vec<SyncResourceConflicts> {
        self.conflicts.read().await.clone()
    }

    /// Last successful sync time in epoch milliseconds
    pub async fn last_sync_time(&self) -> Option<i64> {
        *self.last_sync_time.read().await
    }

    /// Subscribe to aggregate status transitions
    pub fn on_did_change_status(&self) -> broadcast::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to conflict-set changes
    pub fn on_did_change_conflicts(&self) -> broadcast::Receiver<Vec<SyncResourceConflicts>> {
        self.conflicts_tx.subscribe()
    }

    /// Subscribe to "synchronizing resource X" notifications
    pub fn on_sync_resource(&self) -> broadcast::Receiver<SyncResource> {
        self.resource_tx.subscribe()
    }

    /// Subscribe to the per-attempt error list, published once per attempt
    pub fn on_sync_errors(&self) -> broadcast::Receiver<Vec<SyncError>> {
        self.errors_tx.subscribe()
    }

    /// Create a single-use automatic sync task.
    ///
    /// Fetches the remote manifest tagged with a fresh execution id; the
    /// returned task's `run()` succeeds at most once.
    pub async fn create_sync_task(self: &Arc<Self>) -> SyncResult<SyncTask> {
        self.check_enabled()?;
        let (execution_id, headers) = SyncHeaders::fresh();
        let manifest = match self.store.manifest(&headers).await {
            Ok(manifest) => manifest,
            Err(err) => {
                self.report(&err, &execution_id);
                return Err(err);
            }
        };
        debug!(execution_id = %execution_id, "created sync task");
        Ok(SyncTask {
            orchestrator: Arc::clone(self),
            manifest,
            execution_id,
            executed: AtomicBool::new(false),
            token: CancellationToken::new(),
        })
    }

    /// Create an interactive preview/resolve task over the same manifest.
    pub async fn create_manual_sync_task(self: &Arc<Self>) -> SyncResult<ManualSyncTask> {
        self.check_enabled()?;
        let (execution_id, headers) = SyncHeaders::fresh();
        let manifest = match self.store.manifest(&headers).await {
            Ok(manifest) => manifest,
            Err(err) => {
                self.report(&err, &execution_id);
                return Err(err);
            }
        };
        debug!(execution_id = %execution_id, "created manual sync task");
        Ok(ManualSyncTask::new(
            self.synchronizers.clone(),
            manifest,
            execution_id,
            headers,
        ))
    }

    /// Run one automatic synchronization pass.
    ///
    /// Resource-local failures are recorded and the pass continues;
    /// abort-class errors terminate it. The per-attempt error list is
    /// published and status/conflicts recomputed however the pass ends.
    pub async fn sync(
        &self,
        manifest: Option<&Manifest>,
        execution_id: &str,
        token: &CancellationToken,
    ) -> SyncResult<()> {
        self.check_enabled()?;
        self.check_authenticated()?;

        if !self.settings_repaired.swap(true, Ordering::SeqCst) {
            self.repair_settings().await;
        }

        if token.is_cancelled() {
            info!(execution_id = %execution_id, "sync cancelled before start");
            return Ok(());
        }

        if self.status().await != SyncStatus::HasConflicts {
            self.set_status(SyncStatus::Syncing).await;
        }

        info!(execution_id = %execution_id, "starting sync");
        let headers = SyncHeaders::for_execution(execution_id);
        let mut attempt_errors: Vec<SyncError> = Vec::new();

        let result = self
            .sync_resources(manifest, &headers, token, &mut attempt_errors)
            .await;

        // Published however the pass ended, including aborts.
        let _ = self.errors_tx.send(attempt_errors);
        self.update_status_and_conflicts().await;

        result
    }

    async fn sync_resources(
        &self,
        manifest: Option<&Manifest>,
        headers: &SyncHeaders,
        token: &CancellationToken,
        attempt_errors: &mut Vec<SyncError>,
    ) -> SyncResult<()> {
        for synchronizer in &self.synchronizers {
            if token.is_cancelled() {
                info!("sync cancelled, skipping remaining resources");
                return Ok(());
            }

            let resource = synchronizer.resource();
            let _ = self.resource_tx.send(resource);
            debug!(%resource, "synchronizing resource");

            match synchronizer.sync(manifest, headers).await {
                Ok(()) => {}
                Err(err) if err.is_abort() => {
                    error!(%resource, error = %err, "aborting sync");
                    return Err(err);
                }
                Err(err @ SyncError::TooLarge { .. }) => {
                    error!(%resource, error = %err, "payload too large, aborting sync");
                    return Err(err.with_resource(resource));
                }
                Err(err) => {
                    warn!(%resource, error = %err, "resource sync failed, continuing");
                    attempt_errors.push(err.with_resource(resource));
                }
            }

            self.update_status_and_conflicts().await;
        }

        self.update_last_sync_time().await;
        info!("sync completed");
        Ok(())
    }

    /// Take the remote copy of every resource, discarding local edits.
    pub async fn pull(&self) -> SyncResult<()> {
        self.check_enabled()?;
        self.check_authenticated()?;
        for synchronizer in &self.synchronizers {
            if let Err(err) = synchronizer.pull().await {
                error!(resource = %synchronizer.resource(), error = %err, "pull failed");
            }
        }
        self.update_last_sync_time().await;
        self.update_status_and_conflicts().await;
        Ok(())
    }

    /// Take the local copy of every resource, overwriting the remote.
    pub async fn push(&self) -> SyncResult<()> {
        self.check_enabled()?;
        self.check_authenticated()?;
        for synchronizer in &self.synchronizers {
            if let Err(err) = synchronizer.push().await {
                error!(resource = %synchronizer.resource(), error = %err, "push failed");
            }
        }
        self.update_last_sync_time().await;
        self.update_status_and_conflicts().await;
        Ok(())
    }

    /// Stop all in-flight synchronizer work. No-op when idle.
    pub async fn stop(&self) -> SyncResult<()> {
        self.check_enabled()?;
        if self.status().await == SyncStatus::Idle {
            return Ok(());
        }
        for synchronizer in &self.synchronizers {
            if synchronizer.status() != SyncStatus::Idle {
                if let Err(err) = synchronizer.stop().await {
                    warn!(resource = %synchronizer.resource(), error = %err, "failed to stop synchronizer");
                }
            }
        }
        self.update_status_and_conflicts().await;
        Ok(())
    }

    /// Replace `resource_id` with its last synced content.
    ///
    /// At most one synchronizer owns any given identifier; the first one
    /// reporting success short-circuits the rest.
    pub async fn replace(&self, resource_id: &str) -> SyncResult<()> {
        self.check_enabled()?;
        for synchronizer in &self.synchronizers {
            if synchronizer.replace(resource_id).await? {
                return Ok(());
            }
        }
        warn!(resource_id, "no synchronizer owns resource");
        Ok(())
    }

    /// Accept content for the preview slot named by `resource_id`.
    ///
    /// Locates the synchronizer whose current previews match the id against
    /// their local/preview/remote slots and delegates to it.
    pub async fn accept_preview_content(
        &self,
        resource_id: &str,
        content: Option<&str>,
    ) -> SyncResult<Option<SyncResourcePreview>> {
        self.check_enabled()?;
        let (execution_id, headers) = SyncHeaders::fresh();
        for synchronizer in &self.synchronizers {
            let preview = synchronizer
                .resource_previews()
                .into_iter()
                .find(|p| p.matches(resource_id));
            if let Some(preview) = preview {
                let force = preview.takes_side(resource_id);
                let result = synchronizer
                    .accept_preview_content(resource_id, content, force, &headers)
                    .await;
                if let Err(err) = &result {
                    self.report(err, &execution_id);
                }
                let updated = result?;
                self.update_status_and_conflicts().await;
                return Ok(updated);
            }
        }
        Err(SyncError::other(format!(
            "no preview found for resource {resource_id}"
        )))
    }

    /// Resolve the content behind `resource_id`, first non-empty answer wins.
    pub async fn resolve_content(&self, resource_id: &str) -> SyncResult<Option<String>> {
        self.check_enabled()?;
        for synchronizer in &self.synchronizers {
            if let Some(content) = synchronizer.resolve_content(resource_id).await? {
                return Ok(Some(content));
            }
        }
        Ok(None)
    }

    /// Whether any resource has local data.
    ///
    /// GlobalState is excluded: it always has data and would produce false
    /// positives.
    pub async fn has_local_data(&self) -> SyncResult<bool> {
        self.check_enabled()?;
        for synchronizer in &self.synchronizers {
            if synchronizer.resource() == SyncResource::GlobalState {
                continue;
            }
            if synchronizer.has_local_data().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether this machine is about to sync against data written by another
    /// machine for the first time. GlobalState is excluded for the same
    /// reason as in [`Self::has_local_data`].
    pub async fn is_first_time_syncing_with_another_machine(&self) -> SyncResult<bool> {
        self.check_enabled()?;
        let mut has_remote_data = false;
        for synchronizer in &self.synchronizers {
            if synchronizer.resource() == SyncResource::GlobalState {
                continue;
            }
            if synchronizer.has_previously_synced().await? {
                return Ok(false);
            }
            if synchronizer.has_remote_data().await? {
                has_remote_data = true;
            }
        }
        Ok(has_remote_data)
    }

    /// Clear remote and local sync state.
    pub async fn reset(&self) -> SyncResult<()> {
        self.check_enabled()?;
        self.reset_remote().await?;
        self.reset_local().await
    }

    /// Wipe the remote store. Failures are logged, not propagated.
    pub async fn reset_remote(&self) -> SyncResult<()> {
        self.check_enabled()?;
        if let Err(err) = self.store.clear().await {
            error!(error = %err, "failed to clear remote store");
        } else {
            info!("cleared remote store");
        }
        Ok(())
    }

    /// Remove all locally persisted sync state.
    ///
    /// Per-resource failures are isolated so one synchronizer cannot block
    /// the others from resetting.
    pub async fn reset_local(&self) -> SyncResult<()> {
        self.check_enabled()?;
        match self.storage.remove(LAST_SYNC_TIME_KEY).await {
            Ok(()) => *self.last_sync_time.write().await = None,
            Err(err) => warn!(error = %err, "failed to remove last sync time"),
        }
        for synchronizer in &self.synchronizers {
            if let Err(err) = synchronizer.reset_local().await {
                warn!(resource = %synchronizer.resource(), error = %err, "failed to reset local state");
            }
        }
        self.update_status_and_conflicts().await;
        Ok(())
    }

    /// Handles to remote revisions of the given resource.
    pub async fn remote_sync_resource_handles(
        &self,
        resource: SyncResource,
    ) -> SyncResult<Vec<SyncResourceHandle>> {
        self.check_enabled()?;
        self.synchronizer_for(resource)?
            .remote_sync_resource_handles()
            .await
    }

    /// Handles to local backups of the given resource.
    pub async fn local_sync_resource_handles(
        &self,
        resource: SyncResource,
    ) -> SyncResult<Vec<SyncResourceHandle>> {
        self.check_enabled()?;
        self.synchronizer_for(resource)?
            .local_sync_resource_handles()
            .await
    }

    /// Resource identifiers stored under the given handle.
    pub async fn associated_resources(
        &self,
        resource: SyncResource,
        handle: &SyncResourceHandle,
    ) -> SyncResult<Vec<String>> {
        self.check_enabled()?;
        self.synchronizer_for(resource)?
            .associated_resources(handle)
            .await
    }

    /// Machine that produced the revision behind the given handle.
    pub async fn machine_id(
        &self,
        resource: SyncResource,
        handle: &SyncResourceHandle,
    ) -> SyncResult<Option<String>> {
        self.check_enabled()?;
        self.synchronizer_for(resource)?.machine_id(handle).await
    }

    fn check_enabled(&self) -> SyncResult<()> {
        if self.store.is_configured() {
            Ok(())
        } else {
            Err(SyncError::NotEnabled)
        }
    }

    fn check_authenticated(&self) -> SyncResult<()> {
        if self.store.is_authenticated() {
            Ok(())
        } else {
            Err(SyncError::Unauthorized)
        }
    }

    fn synchronizer_for(&self, resource: SyncResource) -> SyncResult<&Arc<dyn Synchronizer>> {
        self.synchronizers
            .iter()
            .find(|s| s.resource() == resource)
            .ok_or_else(|| SyncError::other(format!("no synchronizer for {resource}")))
    }

    pub(crate) fn report(&self, err: &SyncError, execution_id: &str) {
        self.telemetry
            .report_error(err.telemetry_event(), err.resource_tag(), execution_id);
    }

    async fn repair_settings(&self) {
        if let Some(settings) = self
            .synchronizers
            .iter()
            .find(|s| s.resource() == SyncResource::Settings)
        {
            if let Err(err) = settings.repair().await {
                warn!(error = %err, "settings recovery failed");
            }
        }
    }

    /// Recompute aggregate status and conflicts from synchronizer state.
    ///
    /// Synchronizer state only moves during awaited calls into a
    /// synchronizer, so recomputing after each such call is equivalent to
    /// subscribing to change events. Both values are structurally diffed
    /// before an event fires.
    async fn update_status_and_conflicts(&self) {
        let mut conflicts = Vec::new();
        for synchronizer in &self.synchronizers {
            if synchronizer.status() == SyncStatus::HasConflicts {
                let list = synchronizer.conflicts();
                if !list.is_empty() {
                    conflicts.push(SyncResourceConflicts {
                        resource: synchronizer.resource(),
                        conflicts: list,
                    });
                }
            }
        }
        {
            let mut current = self.conflicts.write().await;
            if *current != conflicts {
                *current = conflicts.clone();
                drop(current);
                let _ = self.conflicts_tx.send(conflicts);
            }
        }

        let status = SyncStatus::aggregate(
            self.store.is_configured(),
            self.synchronizers.iter().map(|s| s.status()),
        );
        self.set_status(status).await;
    }

    async fn set_status(&self, status: SyncStatus) {
        let previous = {
            let mut current = self.status.write().await;
            if *current == status {
                return;
            }
            let previous = *current;
            *current = status;
            previous
        };
        // Conflict resolution completing outside an explicit sync pass still
        // counts as a successful sync.
        if previous == SyncStatus::HasConflicts {
            self.update_last_sync_time().await;
        }
        let _ = self.status_tx.send(status);
    }

    async fn update_last_sync_time(&self) {
        let now = Utc::now().timestamp_millis();
        match self.storage.set_i64(LAST_SYNC_TIME_KEY, now).await {
            Ok(()) => *self.last_sync_time.write().await = Some(now),
            Err(err) => warn!(error = %err, "failed to persist last sync time"),
        }
    }
}

/// Single-use handle over one automatic synchronization attempt.
pub struct SyncTask {
    orchestrator: Arc<SyncOrchestrator>,
    manifest: Option<Manifest>,
    execution_id: String,
    executed: AtomicBool,
    token: CancellationToken,
}

impl SyncTask {
    /// The manifest this attempt was created against
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Execution id correlating this attempt's requests and telemetry
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Run the attempt. Fails with [`SyncError::TaskAlreadyRun`] on a second
    /// invocation.
    pub async fn run(&self) -> SyncResult<()> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(SyncError::TaskAlreadyRun);
        }
        let result = self
            .orchestrator
            .sync(self.manifest.as_ref(), &self.execution_id, &self.token)
            .await;
        if let Err(err) = &result {
            self.orchestrator.report(err, &self.execution_id);
        }
        result
    }

    /// Cancel the in-flight attempt, then stop the orchestrator.
    pub async fn stop(&self) -> SyncResult<()> {
        self.token.cancel();
        self.orchestrator.stop().await
    }
}
