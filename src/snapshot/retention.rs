// src/snapshot/retention.rs
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::RemoteLayout;
use crate::error::Result;
use crate::remote::RemoteStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    pub kept: Vec<NaiveDate>,
    pub deleted: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
}

/// Dated snapshot folders under the sync root, oldest first.
/// A missing sync root has no snapshots.
pub async fn list_snapshot_dates<S: RemoteStore>(
    store: &S,
    layout: &RemoteLayout,
) -> Result<Vec<NaiveDate>> {
    let entries = match store.list_directory(layout.root()).await {
        Ok(entries) => entries,
        Err(e) if e.is_not_found() => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut dates: Vec<NaiveDate> = entries
        .iter()
        .filter(|entry| entry.is_dir())
        .filter_map(|entry| layout.parse_folder_date(&entry.name))
        .collect();
    dates.sort();
    dates.dedup();
    Ok(dates)
}

/// Delete the oldest snapshot folders until at most `limit` remain.
///
/// Listing failures propagate. Each deletion is independent: a failed delete
/// is logged, recorded in the report, and does not stop the others.
pub async fn enforce_retention<S: RemoteStore>(
    store: &S,
    layout: &RemoteLayout,
    limit: usize,
) -> Result<RetentionReport> {
    let dates = list_snapshot_dates(store, layout).await?;
    let excess = dates.len().saturating_sub(limit);
    let (expired, kept) = dates.split_at(excess);

    let mut report = RetentionReport {
        kept: kept.to_vec(),
        ..RetentionReport::default()
    };

    for date in expired {
        let path = layout.folder_path(*date);
        match store.delete_folder(&path).await {
            Ok(()) => {
                debug!(folder = %path, "Deleted expired snapshot");
                report.deleted.push(*date);
            }
            Err(e) => {
                warn!(folder = %path, error = %e, "Failed to delete expired snapshot");
                report.failed.push(*date);
            }
        }
    }

    if excess > 0 {
        info!(
            limit,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Retention applied"
        );
    }
    Ok(report)
}
