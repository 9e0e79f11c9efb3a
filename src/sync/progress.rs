use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Preparing,
    Uploading,
    Retention,
    Locating,
    Downloading,
    Reconciling,
    Merging,
    Saving,
    Done,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Preparing => "preparing",
            SyncStage::Uploading => "uploading",
            SyncStage::Retention => "retention",
            SyncStage::Locating => "locating",
            SyncStage::Downloading => "downloading",
            SyncStage::Reconciling => "reconciling",
            SyncStage::Merging => "merging",
            SyncStage::Saving => "saving",
            SyncStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Coarse progress event: the stage being entered and an overall percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub stage: SyncStage,
    pub percent: u8,
}

impl SyncProgress {
    pub fn new(stage: SyncStage, percent: u8) -> Self {
        Self {
            stage,
            percent: percent.min(100),
        }
    }
}

pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;
