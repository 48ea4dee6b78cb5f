use async_trait::async_trait;

use crate::entities::{NewScan, Scan, ScanPatch};

/// Durable scan storage. Lookups return `Ok(None)` for unknown keys; errors
/// are reserved for storage faults and rejected patches.
#[async_trait]
pub trait ScanRepository: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;
    async fn create_scan(&self, new_scan: NewScan) -> anyhow::Result<Scan>;
    async fn get_scan(&self, id: &str) -> anyhow::Result<Option<Scan>>;
    async fn get_scan_by_workflow_id(&self, workflow_id: &str) -> anyhow::Result<Option<Scan>>;
    /// Newest first; scans created in the same millisecond keep insertion order.
    async fn list_scans(&self) -> anyhow::Result<Vec<Scan>>;
    /// An empty patch returns the stored record without touching `updated_at`.
    async fn update_scan(&self, id: &str, patch: ScanPatch) -> anyhow::Result<Option<Scan>>;
    async fn ping(&self) -> anyhow::Result<()>;
}
