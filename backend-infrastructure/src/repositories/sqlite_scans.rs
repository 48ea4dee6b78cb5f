use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use backend_domain::{
    now_millis, NewScan, Scan, ScanPatch, ScanRepository, ScanStatus, ScanSummary,
};

use crate::utils::millis_to_utc;

const SCAN_COLUMNS: &str = "id, workflow_id, target_url, repo_path, config_path, status, \
     current_phase, current_agent, completed_agents, error, summary, created_at, updated_at";

/// SQLite-backed scan store. All access goes through one connection behind a
/// mutex, so writes are serialized and visible to the next read.
#[derive(Clone)]
pub struct SqliteScanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScanRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create database dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open scan database {}", path.display()))?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("scan store connection poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("scan store task failed")?
    }
}

struct ScanRecord {
    id: String,
    workflow_id: Option<String>,
    target_url: String,
    repo_path: String,
    config_path: Option<String>,
    status: String,
    current_phase: Option<String>,
    current_agent: Option<String>,
    completed_agents: String,
    error: Option<String>,
    summary: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl ScanRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            workflow_id: row.get(1)?,
            target_url: row.get(2)?,
            repo_path: row.get(3)?,
            config_path: row.get(4)?,
            status: row.get(5)?,
            current_phase: row.get(6)?,
            current_agent: row.get(7)?,
            completed_agents: row.get(8)?,
            error: row.get(9)?,
            summary: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn encode(scan: &Scan) -> Result<Self> {
        let summary = scan
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("encode summary")?;
        Ok(Self {
            id: scan.id.clone(),
            workflow_id: scan.workflow_id.clone(),
            target_url: scan.target_url.clone(),
            repo_path: scan.repo_path.clone(),
            config_path: scan.config_path.clone(),
            status: scan.status.as_str().to_string(),
            current_phase: scan.current_phase.clone(),
            current_agent: scan.current_agent.clone(),
            completed_agents: serde_json::to_string(&scan.completed_agents)
                .context("encode completed_agents")?,
            error: scan.error.clone(),
            summary,
            created_at: scan.created_at.timestamp_millis(),
            updated_at: scan.updated_at.timestamp_millis(),
        })
    }

    /// Parses the stored text columns back, failing loudly on drift.
    fn decode(self) -> Result<Scan> {
        let status = ScanStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("scan {}: unknown status '{}'", self.id, self.status))?;
        let completed_agents: Vec<String> = serde_json::from_str(&self.completed_agents)
            .with_context(|| format!("scan {}: invalid completed_agents", self.id))?;
        let summary = match self.summary.as_deref() {
            Some(raw) => Some(
                serde_json::from_str::<ScanSummary>(raw)
                    .with_context(|| format!("scan {}: invalid summary", self.id))?,
            ),
            None => None,
        };
        Ok(Scan {
            workflow_id: self.workflow_id,
            target_url: self.target_url,
            repo_path: self.repo_path,
            config_path: self.config_path,
            status,
            current_phase: self.current_phase,
            current_agent: self.current_agent,
            completed_agents,
            error: self.error,
            summary,
            created_at: millis_to_utc(self.created_at)?,
            updated_at: millis_to_utc(self.updated_at)?,
            id: self.id,
        })
    }
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS scans (
    id TEXT PRIMARY KEY NOT NULL,
    workflow_id TEXT UNIQUE,
    target_url TEXT NOT NULL,
    repo_path TEXT NOT NULL,
    config_path TEXT,
    status TEXT NOT NULL,
    current_phase TEXT,
    current_agent TEXT,
    completed_agents TEXT NOT NULL DEFAULT '[]',
    error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    summary TEXT
);
CREATE INDEX IF NOT EXISTS idx_scans_created_at ON scans (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_scans_status ON scans (status);
"#,
    )?;
    Ok(())
}

fn load_scan(conn: &Connection, column: &str, key: &str) -> Result<Option<Scan>> {
    let sql = format!("SELECT {} FROM scans WHERE {} = ?1", SCAN_COLUMNS, column);
    conn.query_row(&sql, params![key], ScanRecord::from_row)
        .optional()?
        .map(ScanRecord::decode)
        .transpose()
}

fn insert_scan(conn: &Connection, scan: &Scan) -> Result<()> {
    let record = ScanRecord::encode(scan)?;
    conn.execute(
        &format!(
            "INSERT INTO scans ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            SCAN_COLUMNS
        ),
        params![
            record.id,
            record.workflow_id,
            record.target_url,
            record.repo_path,
            record.config_path,
            record.status,
            record.current_phase,
            record.current_agent,
            record.completed_agents,
            record.error,
            record.summary,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(())
}

fn write_mutable_fields(conn: &Connection, scan: &Scan) -> Result<()> {
    let record = ScanRecord::encode(scan)?;
    conn.execute(
        "UPDATE scans SET workflow_id = ?2, status = ?3, current_phase = ?4, current_agent = ?5, \
         completed_agents = ?6, error = ?7, summary = ?8, updated_at = ?9 WHERE id = ?1",
        params![
            record.id,
            record.workflow_id,
            record.status,
            record.current_phase,
            record.current_agent,
            record.completed_agents,
            record.error,
            record.summary,
            record.updated_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ScanRepository for SqliteScanRepository {
    async fn ensure_schema(&self) -> Result<()> {
        self.with_conn(|conn| ensure_schema(conn)).await
    }

    async fn create_scan(&self, new_scan: NewScan) -> Result<Scan> {
        let now = now_millis();
        let scan = Scan {
            id: Uuid::new_v4().to_string(),
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
        let stored = scan.clone();
        self.with_conn(move |conn| insert_scan(conn, &stored))
            .await
            .context("insert scan")?;
        debug!(scan_id = %scan.id, "scan persisted");
        Ok(scan)
    }

    async fn get_scan(&self, id: &str) -> Result<Option<Scan>> {
        let id = id.to_string();
        self.with_conn(move |conn| load_scan(conn, "id", &id)).await
    }

    async fn get_scan_by_workflow_id(&self, workflow_id: &str) -> Result<Option<Scan>> {
        let workflow_id = workflow_id.to_string();
        self.with_conn(move |conn| load_scan(conn, "workflow_id", &workflow_id))
            .await
    }

    async fn list_scans(&self) -> Result<Vec<Scan>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM scans ORDER BY created_at DESC, rowid DESC",
                SCAN_COLUMNS
            ))?;
            let records = stmt
                .query_map([], ScanRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            records.into_iter().map(ScanRecord::decode).collect()
        })
        .await
    }

    async fn update_scan(&self, id: &str, patch: ScanPatch) -> Result<Option<Scan>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut scan) = load_scan(&tx, "id", &id)? else {
                return Ok(None);
            };
            if patch.is_empty() {
                return Ok(Some(scan));
            }
            patch.check_against(&scan)?;
            let previous = scan.updated_at;
            patch.apply_to(&mut scan);
            scan.updated_at = now_millis().max(previous);
            write_mutable_fields(&tx, &scan)
                .with_context(|| format!("update scan {}", scan.id))?;
            tx.commit()?;
            Ok(Some(scan))
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::ScanTransitionError;

    async fn repo() -> SqliteScanRepository {
        let repo = SqliteScanRepository::in_memory().expect("open");
        repo.ensure_schema().await.expect("schema");
        repo
    }

    fn new_scan(target_url: &str) -> NewScan {
        NewScan {
            target_url: target_url.to_string(),
            repo_path: "r".to_string(),
            config_path: None,
        }
    }

    async fn exec(repo: &SqliteScanRepository, sql: &'static str) {
        repo.with_conn(move |conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
        .await
        .expect("exec");
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = repo().await;
        let created = repo.create_scan(new_scan("https://example.com")).await.expect("create");
        let fetched = repo.get_scan(&created.id).await.expect("get").expect("exists");

        assert_eq!(fetched, created);
        assert_eq!(fetched.status, ScanStatus::Pending);
        assert!(fetched.completed_agents.is_empty());
        assert!(fetched.config_path.is_none());
        assert!(fetched.workflow_id.is_none());
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[tokio::test]
    async fn unknown_keys_are_none() {
        let repo = repo().await;
        assert!(repo.get_scan("missing").await.expect("get").is_none());
        assert!(repo.get_scan_by_workflow_id("wf-x").await.expect("get").is_none());
        assert!(repo
            .update_scan("missing", ScanPatch::started("wf-x"))
            .await
            .expect("update")
            .is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_with_ties_in_insertion_order() {
        let repo = repo().await;
        let first = repo.create_scan(new_scan("https://a.example.com")).await.unwrap();
        let second = repo.create_scan(new_scan("https://b.example.com")).await.unwrap();
        let third = repo.create_scan(new_scan("https://c.example.com")).await.unwrap();
        exec(&repo, "UPDATE scans SET created_at = 1000").await;
        exec(&repo, "UPDATE scans SET created_at = 500 WHERE target_url = 'https://c.example.com'").await;

        let ids: Vec<String> = repo.list_scans().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id, third.id]);
    }

    #[tokio::test]
    async fn update_applies_patch_and_is_immediately_visible() {
        let repo = repo().await;
        let scan = repo.create_scan(new_scan("https://example.com")).await.unwrap();

        let updated = repo
            .update_scan(&scan.id, ScanPatch::started("wf-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ScanStatus::Running);
        assert!(updated.updated_at >= scan.updated_at);

        let by_workflow = repo.get_scan_by_workflow_id("wf-1").await.unwrap().unwrap();
        assert_eq!(by_workflow, updated);

        let summary = ScanSummary {
            total_cost_usd: 3.5,
            total_duration_ms: 90_000,
            total_turns: 140,
            agent_count: 5,
        };
        let completed = repo
            .update_scan(
                &scan.id,
                ScanPatch {
                    status: Some(ScanStatus::Completed),
                    completed_agents: Some(vec!["a".to_string(), "b".to_string()]),
                    summary: Some(Some(summary.clone())),
                    ..ScanPatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        let listed = repo.list_scans().await.unwrap();
        assert_eq!(listed, vec![completed.clone()]);
        assert_eq!(completed.summary, Some(summary));
    }

    #[tokio::test]
    async fn empty_patch_keeps_updated_at() {
        let repo = repo().await;
        let scan = repo.create_scan(new_scan("https://example.com")).await.unwrap();
        exec(&repo, "UPDATE scans SET updated_at = updated_at - 60000").await;
        let before = repo.get_scan(&scan.id).await.unwrap().unwrap();

        let same = repo
            .update_scan(&scan.id, ScanPatch::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same, before);
        assert_eq!(repo.get_scan(&scan.id).await.unwrap().unwrap().updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn updated_at_never_moves_backwards() {
        let repo = repo().await;
        let scan = repo.create_scan(new_scan("https://example.com")).await.unwrap();
        exec(&repo, "UPDATE scans SET updated_at = updated_at + 3600000").await;
        let before = repo.get_scan(&scan.id).await.unwrap().unwrap();

        let after = repo
            .update_scan(&scan.id, ScanPatch::started("wf-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn workflow_ids_are_unique() {
        let repo = repo().await;
        let a = repo.create_scan(new_scan("https://a.example.com")).await.unwrap();
        let b = repo.create_scan(new_scan("https://b.example.com")).await.unwrap();
        repo.update_scan(&a.id, ScanPatch::started("wf-1")).await.unwrap();

        let err = repo.update_scan(&b.id, ScanPatch::started("wf-1")).await;
        assert!(err.is_err());
        assert_eq!(
            repo.get_scan(&b.id).await.unwrap().unwrap().status,
            ScanStatus::Pending
        );
    }

    #[tokio::test]
    async fn terminal_scan_rejects_updates() {
        let repo = repo().await;
        let scan = repo.create_scan(new_scan("https://example.com")).await.unwrap();
        repo.update_scan(&scan.id, ScanPatch::start_failed("unreachable"))
            .await
            .unwrap();

        let err = repo
            .update_scan(&scan.id, ScanPatch::started("wf-1"))
            .await
            .expect_err("terminal");
        assert!(matches!(
            err.downcast_ref::<ScanTransitionError>(),
            Some(ScanTransitionError::Terminal { .. })
        ));
    }

    #[tokio::test]
    async fn corrupted_columns_are_reported() {
        let repo = repo().await;
        let scan = repo.create_scan(new_scan("https://example.com")).await.unwrap();
        exec(&repo, "UPDATE scans SET completed_agents = '{\"not\":\"a list\"}'").await;

        let err = repo.get_scan(&scan.id).await.expect_err("drift");
        assert!(format!("{:#}", err).contains("invalid completed_agents"));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let path = std::env::temp_dir()
            .join(format!("scansync-{}", Uuid::new_v4()))
            .join("scans.db");
        let scan = {
            let repo = SqliteScanRepository::open(&path).expect("open");
            repo.ensure_schema().await.unwrap();
            repo.create_scan(new_scan("https://example.com")).await.unwrap()
        };

        let reopened = SqliteScanRepository::open(&path).expect("reopen");
        reopened.ensure_schema().await.unwrap();
        assert_eq!(reopened.get_scan(&scan.id).await.unwrap(), Some(scan));
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
