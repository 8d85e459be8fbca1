//! Posts locally stored task definitions to the program API.

use crate::connectors::{self, GciApi};
use crate::model::RawTask;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// The API rejects a capacity of 0 even though its web interface allows it.
pub const DEFAULT_MAX_INSTANCES: u32 = 1;

const MAX_INSTANCES_KEY: &str = "max_instances";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Data directory does not exist: {0}")]
    MissingDataDir(PathBuf),
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Submitting task '{name}' failed: {source}")]
    Rejected {
        name: String,
        source: connectors::Error,
    },
}

/// Sets `max_instances` to [`DEFAULT_MAX_INSTANCES`] when it is missing, `null`
/// or zero. Every other key is left as it is.
pub fn with_default_capacity(mut task: RawTask) -> RawTask {
    let unset = match task.get(MAX_INSTANCES_KEY) {
        None | Some(Value::Null) => true,
        Some(capacity) => capacity.as_f64() == Some(0.0),
    };
    if unset {
        task.insert(MAX_INSTANCES_KEY.to_string(), DEFAULT_MAX_INSTANCES.into());
    }
    task
}

fn task_name(task: &RawTask) -> String {
    task.get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string()
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Reads every `*.json` file in `task_dir`, in file name order.
pub async fn read_tasks(task_dir: &Path) -> Result<Vec<RawTask>, Error> {
    let read_err = |source| Error::Read {
        path: task_dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(task_dir).await.map_err(read_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && is_file(&path).await {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tasks = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })?;
        let task = serde_json::from_str(&contents)
            .map_err(|source| Error::Parse { path, source })?;
        tasks.push(task);
    }
    Ok(tasks)
}

/// Submits the task files of one data directory.
pub struct TaskSubmitter<'a, API: GciApi> {
    api: &'a API,
    datadir: PathBuf,
}

impl<'a, API: GciApi> TaskSubmitter<'a, API> {
    pub fn new(api: &'a API, datadir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            datadir: datadir.into(),
        }
    }

    /// Submits every task below `<datadir>/tasks`, stopping at the first rejection.
    #[tracing::instrument(skip(self), fields(datadir = %self.datadir.display()))]
    pub async fn submit_all(&self) -> Result<usize, Error> {
        let datadir_exists = tokio::fs::metadata(&self.datadir)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if !datadir_exists {
            return Err(Error::MissingDataDir(self.datadir.clone()));
        }
        let task_dir = self.datadir.join("tasks");
        info!("reading tasks from [{}]", task_dir.display());
        let tasks = read_tasks(&task_dir).await?;
        info!("read {} tasks", tasks.len());

        let mut submitted = 0;
        for task in tasks {
            self.submit(with_default_capacity(task)).await?;
            submitted += 1;
        }
        info!("submitted {submitted} tasks");
        Ok(submitted)
    }

    async fn submit(&self, task: RawTask) -> Result<Value, Error> {
        match self.api.new_task(&task).await {
            Ok(created) => {
                info!("submitted '{}'", task_name(&task));
                Ok(created)
            }
            Err(source) => {
                let body = serde_json::to_string_pretty(&task).unwrap_or_else(|e| e.to_string());
                match &source {
                    connectors::Error::Server { status, body: response } => {
                        error!("task rejected with {status}:\n{body}\nserver said: {response}")
                    }
                    other => error!("task not submitted:\n{body}\n{other}"),
                }
                Err(Error::Rejected {
                    name: task_name(&task),
                    source,
                })
            }
        }
    }
}
