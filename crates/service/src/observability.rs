use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder};

// Prometheus metrics (default registry)
pub static BACKUPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "snapkv_backups_total",
        "Snapshot backups written successfully"
    )
    .expect("register backups_total")
});

pub static BACKUP_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "snapkv_backup_failures_total",
        "Snapshot backups that failed"
    )
    .expect("register backup_failures_total")
});

pub static BACKUPS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "snapkv_backups_skipped_total",
        "Backup ticks skipped because a backup was still running"
    )
    .expect("register backups_skipped_total")
});

pub static RESTORED_KEYS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "snapkv_restored_keys_total",
        "Keys written into the store by snapshot restores"
    )
    .expect("register restored_keys_total")
});

pub static RESTORE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "snapkv_restore_failures_total",
        "Snapshot restores that failed"
    )
    .expect("register restore_failures_total")
});

pub static BACKUP_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "snapkv_backup_duration_seconds",
        "Time spent writing a snapshot",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("register backup_duration")
});

/// Force registration so every series shows up on the first scrape.
pub fn init_metrics() {
    Lazy::force(&BACKUPS_TOTAL);
    Lazy::force(&BACKUP_FAILURES_TOTAL);
    Lazy::force(&BACKUPS_SKIPPED_TOTAL);
    Lazy::force(&RESTORED_KEYS_TOTAL);
    Lazy::force(&RESTORE_FAILURES_TOTAL);
    Lazy::force(&BACKUP_DURATION);
}

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
