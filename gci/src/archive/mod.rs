//! Mirrors task definitions and task instances into a local directory tree.
//!
//! Layout below the data directory:
//! - `tasks/<id>-<name>.json`, one file per task definition
//! - `instances/<folder>/`, one folder per task instance, see [`project`]
//!
//! A sync can be interrupted at any point and rerun; instances whose
//! `instance.json` already exists are skipped by the [`resume::ResumeGuard`].

pub mod fetch;
pub mod project;
pub mod resume;

use crate::config::Settings;
use crate::connectors::{self, GciApi};
use crate::model::{Task, TaskInstance};
use crate::sanitize::sanitize;
use project::{Projector, folder_name};
use resume::{ResumeGuard, Verdict};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const INSTANCE_SUMMARY_FILENAME: &str = "instance.txt";
pub const INSTANCE_FILENAME: &str = "instance.json";
pub const INSTANCE_ACTIVITY_FILENAME: &str = "activity.json";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Remote call failed: {0}")]
    Connector(#[from] connectors::Error),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Creates `path`, treating an existing directory as success.
pub async fn ensure_dir(path: &Path) -> Result<(), Error> {
    match tokio::fs::create_dir(path).await {
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("{} already exists", path.display());
            Ok(())
        }
        result => Ok(result?),
    }
}

/// Writes `value` as JSON indented with four spaces.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    tokio::fs::write(path, buffer).await?;
    Ok(())
}

/// File name of an archived task definition. Only the stem is sanitized, so a
/// truncated name still ends in `.json`.
pub fn task_file_name(task: &Task) -> String {
    let id = task.id.map(|id| id.to_string()).unwrap_or_default();
    let stem = sanitize(&format!("{id}-{}", task.name.replace('"', "")));
    format!("{stem}.json")
}

/// Counts of a finished instance sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSummary {
    pub archived: usize,
    pub skipped: usize,
}

/// What happened to a single instance during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Archived(PathBuf),
    Skipped,
}

/// Runs the archive operations against one data directory.
pub struct Archiver<'a, API: GciApi, P: Projector> {
    api: &'a API,
    projector: &'a P,
    tasks_dir: PathBuf,
    instances_dir: PathBuf,
    guard: ResumeGuard,
    throttle: Duration,
}

impl<'a, API: GciApi, P: Projector> Archiver<'a, API, P> {
    pub fn new(api: &'a API, projector: &'a P, settings: &Settings) -> Self {
        Self {
            api,
            projector,
            tasks_dir: settings.tasks_dir(),
            instances_dir: settings.instances_dir(),
            guard: ResumeGuard::new(settings.instances_dir()),
            throttle: settings.throttle(),
        }
    }

    /// Downloads every task definition into `tasks/`.
    #[tracing::instrument(skip(self))]
    pub async fn save_tasks(&self) -> Result<usize, Error> {
        info!("downloading tasks");
        let api = self.api;
        let tasks = fetch::fetch_all(|page| api.list_tasks(page), self.throttle).await?;
        info!("downloaded {} tasks", tasks.len());

        ensure_dir(&self.tasks_dir).await?;
        info!("saving tasks to [{}]", self.tasks_dir.display());
        for task in &tasks {
            write_json(&self.tasks_dir.join(task_file_name(task)), task).await?;
        }
        Ok(tasks.len())
    }

    /// Downloads every task instance not archived yet into `instances/`.
    #[tracing::instrument(skip(self))]
    pub async fn save_instances(&self) -> Result<SyncSummary, Error> {
        ensure_dir(&self.instances_dir).await?;
        info!("saving instances to [{}]", self.instances_dir.display());

        let api = self.api;
        let instances =
            fetch::fetch_all(|page| api.list_task_instances(page), self.throttle).await?;

        let mut summary = SyncSummary::default();
        for (count, instance) in instances.into_iter().enumerate() {
            info!("#{count:05}: {}", instance.task_definition_name);
            match self.save_instance(instance).await? {
                Outcome::Archived(_) => summary.archived += 1,
                Outcome::Skipped => {
                    info!("skipped, already done");
                    summary.skipped += 1;
                }
            }
        }
        info!(
            "archived {} instances, skipped {}",
            summary.archived, summary.skipped
        );
        Ok(summary)
    }

    /// Archives one listed instance unless the resume guard reports it done.
    pub async fn save_instance(&self, instance: TaskInstance) -> Result<Outcome, Error> {
        if self.guard.check(&folder_name(&instance)).await == Verdict::Done {
            return Ok(Outcome::Skipped);
        }
        let path = self.enrich_and_project(instance).await?;
        Ok(Outcome::Archived(path))
    }

    /// Fetches a single instance by id and archives it even if it was archived before.
    #[tracing::instrument(skip(self))]
    pub async fn save_single_instance(&self, id: u64) -> Result<PathBuf, Error> {
        ensure_dir(&self.instances_dir).await?;
        let instance = self.api.get_task_instance(id).await?;
        info!("#{id}: {}", instance.task_definition_name);
        self.enrich_and_project(instance).await
    }

    async fn enrich_and_project(&self, mut instance: TaskInstance) -> Result<PathBuf, Error> {
        let task = self.api.get_task(instance.task_definition_id).await?;
        tokio::time::sleep(self.throttle).await;
        instance.enrich(&task);
        self.projector.project(&instance).await
    }
}
