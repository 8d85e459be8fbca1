//! Tells finished instance folders from ones a sync still has to write.

use crate::archive::INSTANCE_FILENAME;
use std::path::{Path, PathBuf};

/// Whether an instance folder has already been archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Done,
    Pending,
}

/// Decides, from the filesystem alone, which instances a sync can skip.
///
/// `instance.json` is the last file the projector writes, so a non-empty one
/// means the folder was completed by an earlier run.
#[derive(Debug, Clone)]
pub struct ResumeGuard {
    instances_dir: PathBuf,
}

impl ResumeGuard {
    pub fn new(instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            instances_dir: instances_dir.into(),
        }
    }

    pub fn marker_path(&self, folder_name: &str) -> PathBuf {
        self.instances_dir.join(folder_name).join(INSTANCE_FILENAME)
    }

    pub async fn check(&self, folder_name: &str) -> Verdict {
        if is_non_empty_file(&self.marker_path(folder_name)).await {
            Verdict::Done
        } else {
            Verdict::Pending
        }
    }
}

async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
