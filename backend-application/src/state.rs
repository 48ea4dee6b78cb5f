use std::sync::Arc;

use backend_domain::ports::ScanRepository;
use backend_domain::RuntimeConfig;

use crate::{Metrics, OrchestratorClient};

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub scan_repo: Arc<dyn ScanRepository>,
    pub orchestrator: Arc<OrchestratorClient>,
    pub metrics: Arc<Metrics>,
}
