#![allow(dead_code)]

//! Hand-written mock collaborators for the integration suite.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use usync::{
    Change, KeyValueStorage, Manifest, MemoryStorage, RemoteStoreClient, ResourcePreview,
    SyncError, SyncHeaders, SyncOrchestrator, SyncResource, SyncResourceHandle,
    SyncResourcePreview, SyncResult, SyncStatus, Synchronizer, TelemetrySink,
};

/// Scriptable synchronizer double recording every call it receives.
pub struct MockSynchronizer {
    resource: SyncResource,
    pub status: Mutex<SyncStatus>,
    pub conflicts: Mutex<Vec<ResourcePreview>>,
    pub resource_previews: Mutex<Vec<ResourcePreview>>,
    pub preview_response: Mutex<Option<SyncResourcePreview>>,
    pub sync_error: Mutex<Option<SyncError>>,
    pub stop_error: Mutex<Option<SyncError>>,
    pub reset_error: Mutex<Option<SyncError>>,
    pub accept_responses: Mutex<VecDeque<Option<SyncResourcePreview>>>,
    pub resolve_response: Mutex<Option<String>>,
    pub remote_handles: Mutex<Vec<SyncResourceHandle>>,
    pub replace_accepts: AtomicBool,
    pub local_data: AtomicBool,
    pub remote_data: AtomicBool,
    pub previously_synced: AtomicBool,
    pub sync_calls: AtomicUsize,
    pub preview_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub push_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub reset_local_calls: AtomicUsize,
    pub repair_calls: AtomicUsize,
    pub replace_calls: AtomicUsize,
    /// (resource_id, content, force) per accept_preview_content call
    pub accept_calls: Mutex<Vec<(String, Option<String>, bool)>>,
}

impl MockSynchronizer {
    pub fn new(resource: SyncResource) -> Arc<Self> {
        Arc::new(Self {
            resource,
            status: Mutex::new(SyncStatus::Idle),
            conflicts: Mutex::new(Vec::new()),
            resource_previews: Mutex::new(Vec::new()),
            preview_response: Mutex::new(None),
            sync_error: Mutex::new(None),
            stop_error: Mutex::new(None),
            reset_error: Mutex::new(None),
            accept_responses: Mutex::new(VecDeque::new()),
            resolve_response: Mutex::new(None),
            remote_handles: Mutex::new(Vec::new()),
            replace_accepts: AtomicBool::new(false),
            local_data: AtomicBool::new(false),
            remote_data: AtomicBool::new(false),
            previously_synced: AtomicBool::new(false),
            sync_calls: AtomicUsize::new(0),
            preview_calls: AtomicUsize::new(0),
            pull_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            reset_local_calls: AtomicUsize::new(0),
            repair_calls: AtomicUsize::new(0),
            replace_calls: AtomicUsize::new(0),
            accept_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: SyncStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_sync_error(&self, error: SyncError) {
        *self.sync_error.lock().unwrap() = Some(error);
    }

    pub fn set_preview(&self, preview: SyncResourcePreview) {
        *self.preview_response.lock().unwrap() = Some(preview);
    }

    pub fn clear_preview(&self) {
        *self.preview_response.lock().unwrap() = None;
    }

    pub fn push_accept_response(&self, response: Option<SyncResourcePreview>) {
        self.accept_responses.lock().unwrap().push_back(response);
    }

    pub fn last_accept_call(&self) -> Option<(String, Option<String>, bool)> {
        self.accept_calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Synchronizer for MockSynchronizer {
    fn resource(&self) -> SyncResource {
        self.resource
    }

    fn status(&self) -> SyncStatus {
        *self.status.lock().unwrap()
    }

    fn conflicts(&self) -> Vec<ResourcePreview> {
        self.conflicts.lock().unwrap().clone()
    }

    fn resource_previews(&self) -> Vec<ResourcePreview> {
        self.resource_previews.lock().unwrap().clone()
    }

    async fn pull(&self) -> SyncResult<()> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn push(&self) -> SyncResult<()> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self, _manifest: Option<&Manifest>, _headers: &SyncHeaders) -> SyncResult<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        match self.sync_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> SyncResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        match self.stop_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn repair(&self) -> SyncResult<()> {
        self.repair_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace(&self, _resource_id: &str) -> SyncResult<bool> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replace_accepts.load(Ordering::SeqCst))
    }

    async fn accept_preview_content(
        &self,
        resource_id: &str,
        content: Option<&str>,
        force: bool,
        _headers: &SyncHeaders,
    ) -> SyncResult<Option<SyncResourcePreview>> {
        self.accept_calls.lock().unwrap().push((
            resource_id.to_string(),
            content.map(str::to_string),
            force,
        ));
        Ok(self
            .accept_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(None))
    }

    async fn resolve_content(&self, _resource_id: &str) -> SyncResult<Option<String>> {
        Ok(self.resolve_response.lock().unwrap().clone())
    }

    async fn preview(
        &self,
        _manifest: Option<&Manifest>,
        _headers: &SyncHeaders,
    ) -> SyncResult<Option<SyncResourcePreview>> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.preview_response.lock().unwrap().clone())
    }

    async fn has_local_data(&self) -> SyncResult<bool> {
        Ok(self.local_data.load(Ordering::SeqCst))
    }

    async fn has_previously_synced(&self) -> SyncResult<bool> {
        Ok(self.previously_synced.load(Ordering::SeqCst))
    }

    async fn has_remote_data(&self) -> SyncResult<bool> {
        Ok(self.remote_data.load(Ordering::SeqCst))
    }

    async fn reset_local(&self) -> SyncResult<()> {
        self.reset_local_calls.fetch_add(1, Ordering::SeqCst);
        match self.reset_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn remote_sync_resource_handles(&self) -> SyncResult<Vec<SyncResourceHandle>> {
        Ok(self.remote_handles.lock().unwrap().clone())
    }
}

/// Remote store double.
pub struct MockStoreClient {
    pub configured: AtomicBool,
    pub authenticated: AtomicBool,
    pub manifest: Mutex<Option<Manifest>>,
    pub manifest_error: Mutex<Option<SyncError>>,
    pub clear_error: Mutex<Option<SyncError>>,
    pub manifest_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub last_execution_id: Mutex<Option<String>>,
}

impl MockStoreClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            configured: AtomicBool::new(true),
            authenticated: AtomicBool::new(true),
            manifest: Mutex::new(Some(Manifest {
                session: "test-session".to_string(),
                latest: None,
            })),
            manifest_error: Mutex::new(None),
            clear_error: Mutex::new(None),
            manifest_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            last_execution_id: Mutex::new(None),
        })
    }
}

#[async_trait]
impl RemoteStoreClient for MockStoreClient {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn manifest(&self, headers: &SyncHeaders) -> SyncResult<Option<Manifest>> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_execution_id.lock().unwrap() =
            headers.execution_id().map(str::to_string);
        match self.manifest_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(self.manifest.lock().unwrap().clone()),
        }
    }

    async fn clear(&self) -> SyncResult<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        match self.clear_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Telemetry double recording every reported error.
#[derive(Default)]
pub struct MockTelemetry {
    pub events: Mutex<Vec<(String, Option<SyncResource>, String)>>,
}

impl MockTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, Option<SyncResource>, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetrySink for MockTelemetry {
    fn report_error(&self, event: &str, resource: Option<SyncResource>, execution_id: &str) {
        self.events.lock().unwrap().push((
            event.to_string(),
            resource,
            execution_id.to_string(),
        ));
    }
}

/// Everything a test needs to drive the orchestrator.
pub struct Harness {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub store: Arc<MockStoreClient>,
    pub storage: Arc<MemoryStorage>,
    pub telemetry: Arc<MockTelemetry>,
}

pub async fn build(mocks: &[Arc<MockSynchronizer>]) -> Harness {
    build_with_store(mocks, MockStoreClient::new()).await
}

pub async fn build_with_store(
    mocks: &[Arc<MockSynchronizer>],
    store: Arc<MockStoreClient>,
) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let telemetry = MockTelemetry::new();
    let synchronizers: Vec<Arc<dyn Synchronizer>> = mocks
        .iter()
        .map(|m| Arc::clone(m) as Arc<dyn Synchronizer>)
        .collect();
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            synchronizers,
            Arc::clone(&store) as Arc<dyn RemoteStoreClient>,
            Arc::clone(&storage) as Arc<dyn KeyValueStorage>,
            Arc::clone(&telemetry) as Arc<dyn TelemetrySink>,
        )
        .await,
    );
    Harness {
        orchestrator,
        store,
        storage,
        telemetry,
    }
}

/// A preview whose slot identifiers follow the `side/name` convention.
pub fn resource_preview(name: &str, has_conflicts: bool) -> ResourcePreview {
    ResourcePreview {
        local_resource: format!("local/{name}"),
        preview_resource: format!("preview/{name}"),
        remote_resource: format!("remote/{name}"),
        merged_resource: format!("merged/{name}"),
        accepted_resource: String::new(),
        local_change: Change::Modified,
        remote_change: Change::Modified,
        has_conflicts,
    }
}

pub fn sync_preview(previews: Vec<ResourcePreview>) -> SyncResourcePreview {
    SyncResourcePreview {
        is_last_sync_from_current_machine: false,
        resource_previews: previews,
    }
}
