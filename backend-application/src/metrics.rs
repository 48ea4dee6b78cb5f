use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    scans_created: AtomicU64,
    start_failures: AtomicU64,
    sync_attempts: AtomicU64,
    sync_applied: AtomicU64,
    sync_skipped: AtomicU64,
    sync_errors: AtomicU64,
}

impl Metrics {
    pub fn record_scan_created(&self) {
        self.scans_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_attempt(&self) {
        self.sync_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_applied(&self) {
        self.sync_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_skipped(&self) {
        self.sync_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_error(&self) {
        self.sync_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_errors(&self) -> u64 {
        self.sync_errors.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let created = self.scans_created.load(Ordering::Relaxed);
        let start_failures = self.start_failures.load(Ordering::Relaxed);
        let attempts = self.sync_attempts.load(Ordering::Relaxed);
        let applied = self.sync_applied.load(Ordering::Relaxed);
        let skipped = self.sync_skipped.load(Ordering::Relaxed);
        let errors = self.sync_errors.load(Ordering::Relaxed);

        format!(
            "# TYPE scansync_scans_created_total counter\n\
scansync_scans_created_total {}\n\
# TYPE scansync_start_failures_total counter\n\
scansync_start_failures_total {}\n\
# TYPE scansync_sync_attempts_total counter\n\
scansync_sync_attempts_total {}\n\
# TYPE scansync_sync_applied_total counter\n\
scansync_sync_applied_total {}\n\
# TYPE scansync_sync_skipped_total counter\n\
scansync_sync_skipped_total {}\n\
# TYPE scansync_sync_errors_total counter\n\
scansync_sync_errors_total {}\n",
            created, start_failures, attempts, applied, skipped, errors
        )
    }
}
