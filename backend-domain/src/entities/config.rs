// Runtime configuration handed to the inner layers

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub sync_interval_seconds: u64,
    pub pipeline_testing_mode: bool,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: String,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub url: String,
    pub namespace: String,
    pub task_queue: String,
    pub workflow_type: String,
    pub progress_query: String,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7243".to_string(),
            namespace: "default".to_string(),
            task_queue: "scan-pipeline".to_string(),
            workflow_type: "pipelineWorkflow".to_string(),
            progress_query: "getProgress".to_string(),
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
        }
    }
}
