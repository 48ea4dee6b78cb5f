// In-memory doubles for the domain ports, used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;

use backend_domain::ports::{OrchestratorConnection, OrchestratorConnector, ScanRepository};
use backend_domain::{
    now_millis, NewScan, OrchestratorConfig, RuntimeConfig, Scan, ScanPatch, ScanStatus,
    WorkflowDescription, WorkflowProgress, WorkflowStart,
};

use crate::{AppState, Metrics, OrchestratorClient};

#[derive(Default)]
struct OrchestratorState {
    submitted: Vec<WorkflowStart>,
    reject: Option<String>,
    progress: HashMap<String, WorkflowProgress>,
    descriptions: HashMap<String, String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    queries: HashMap<String, usize>,
    closes: usize,
}

#[derive(Default)]
pub struct FakeOrchestrator {
    state: Mutex<OrchestratorState>,
}

impl FakeOrchestrator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_submissions(&self, message: &str) {
        self.state.lock().unwrap().reject = Some(message.to_string());
    }

    pub fn set_progress(&self, workflow_id: &str, progress: WorkflowProgress) {
        self.state
            .lock()
            .unwrap()
            .progress
            .insert(workflow_id.to_string(), progress);
    }

    pub fn set_description(&self, workflow_id: &str, status: &str) {
        self.state
            .lock()
            .unwrap()
            .descriptions
            .insert(workflow_id.to_string(), status.to_string());
    }

    pub fn fail_queries_for(&self, workflow_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(workflow_id.to_string());
    }

    pub fn panic_on_query_for(&self, workflow_id: &str) {
        self.state
            .lock()
            .unwrap()
            .panicking
            .insert(workflow_id.to_string());
    }

    pub fn queries_for(&self, workflow_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queries
            .get(workflow_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_queries(&self) -> usize {
        self.state.lock().unwrap().queries.values().sum()
    }

    pub fn submitted(&self) -> Vec<WorkflowStart> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl OrchestratorConnection for FakeOrchestrator {
    async fn submit(&self, start: &WorkflowStart) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.reject {
            bail!("{}", message);
        }
        state.submitted.push(start.clone());
        Ok(())
    }

    async fn query(&self, workflow_id: &str, _query_name: &str) -> anyhow::Result<WorkflowProgress> {
        let should_panic = {
            let mut state = self.state.lock().unwrap();
            *state.queries.entry(workflow_id.to_string()).or_default() += 1;
            if state.failing.contains(workflow_id) {
                bail!("query timed out");
            }
            if let Some(progress) = state.progress.get(workflow_id) {
                return Ok(progress.clone());
            }
            state.panicking.contains(workflow_id)
        };
        if should_panic {
            panic!("orchestrator blew up for {}", workflow_id);
        }
        Err(anyhow!("query not supported for {}", workflow_id))
    }

    async fn describe(&self, workflow_id: &str) -> anyhow::Result<WorkflowDescription> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(workflow_id) {
            bail!("describe timed out");
        }
        state
            .descriptions
            .get(workflow_id)
            .map(|status| WorkflowDescription {
                status: status.clone(),
                start_time: None,
                close_time: None,
            })
            .ok_or_else(|| anyhow!("workflow {} not found", workflow_id))
    }

    async fn close(&self) {
        self.state.lock().unwrap().closes += 1;
    }
}

pub struct FakeConnector {
    orchestrator: Arc<FakeOrchestrator>,
    delay: Duration,
    connects: AtomicUsize,
    fail_remaining: AtomicUsize,
}

impl FakeConnector {
    pub fn new(orchestrator: Arc<FakeOrchestrator>) -> Arc<Self> {
        Self::slow(orchestrator, 0)
    }

    pub fn slow(orchestrator: Arc<FakeOrchestrator>, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            delay: Duration::from_millis(delay_ms),
            connects: AtomicUsize::new(0),
            fail_remaining: AtomicUsize::new(0),
        })
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrchestratorConnector for FakeConnector {
    async fn connect(&self) -> anyhow::Result<Arc<dyn OrchestratorConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            bail!("unreachable");
        }
        Ok(self.orchestrator.clone())
    }
}

#[derive(Default)]
pub struct MemoryScanRepository {
    scans: Mutex<Vec<Scan>>,
    failing_updates: AtomicUsize,
}

impl MemoryScanRepository {
    /// Inserts a record as-is, bypassing the lifecycle checks.
    pub fn insert_raw(&self, scan: Scan) {
        self.scans.lock().unwrap().push(scan);
    }

    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScanRepository for MemoryScanRepository {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn create_scan(&self, new_scan: NewScan) -> anyhow::Result<Scan> {
        let mut scans = self.scans.lock().unwrap();
        let now = now_millis();
        let scan = Scan {
            id: format!("scan-{}", scans.len() + 1),
            workflow_id: None,
            target_url: new_scan.target_url,
            repo_path: new_scan.repo_path,
            config_path: new_scan.config_path,
            status: ScanStatus::Pending,
            current_phase: None,
            current_agent: None,
            completed_agents: Vec::new(),
            error: None,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        scans.push(scan.clone());
        Ok(scan)
    }

    async fn get_scan(&self, id: &str) -> anyhow::Result<Option<Scan>> {
        Ok(self.scans.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn get_scan_by_workflow_id(&self, workflow_id: &str) -> anyhow::Result<Option<Scan>> {
        Ok(self
            .scans
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.workflow_id.as_deref() == Some(workflow_id))
            .cloned())
    }

    async fn list_scans(&self) -> anyhow::Result<Vec<Scan>> {
        let mut scans: Vec<Scan> = self.scans.lock().unwrap().iter().rev().cloned().collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scans)
    }

    async fn update_scan(&self, id: &str, patch: ScanPatch) -> anyhow::Result<Option<Scan>> {
        if self.failing_updates.load(Ordering::SeqCst) > 0 {
            self.failing_updates.fetch_sub(1, Ordering::SeqCst);
            bail!("database is locked");
        }
        let mut scans = self.scans.lock().unwrap();
        let Some(scan) = scans.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(scan.clone()));
        }
        patch.check_against(scan)?;
        patch.apply_to(scan);
        scan.updated_at = now_millis().max(scan.updated_at);
        Ok(Some(scan.clone()))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn runtime_config() -> RuntimeConfig {
    RuntimeConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        max_body_bytes: 1024 * 1024,
        request_timeout_seconds: 5,
        sync_interval_seconds: 0,
        pipeline_testing_mode: false,
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub repo: Arc<MemoryScanRepository>,
    pub orchestrator: Arc<FakeOrchestrator>,
    pub connector: Arc<FakeConnector>,
}

pub fn harness() -> TestHarness {
    let orchestrator = FakeOrchestrator::new();
    let connector = FakeConnector::new(orchestrator.clone());
    let repo = Arc::new(MemoryScanRepository::default());
    let state = AppState {
        config: runtime_config(),
        scan_repo: repo.clone(),
        orchestrator: Arc::new(OrchestratorClient::new(
            connector.clone(),
            OrchestratorConfig::default(),
        )),
        metrics: Arc::new(Metrics::default()),
    };
    TestHarness {
        state,
        repo,
        orchestrator,
        connector,
    }
}
