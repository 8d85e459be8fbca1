//! Writes one task instance into its own folder.

use crate::archive::{
    Error, INSTANCE_ACTIVITY_FILENAME, INSTANCE_FILENAME, INSTANCE_SUMMARY_FILENAME, ensure_dir,
    write_json,
};
use crate::connectors::{Download, GciApi};
use crate::model::{Activity, Attachment, Category, InstanceStatus, TaskInstance};
use crate::sanitize::sanitize;
use mockall::automock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Stands in for an instance that was never modified.
pub const UNMODIFIED_SENTINEL: &str = "0000-00-00 00_00_00";

/// Turns an enriched instance into an archived folder.
#[automock]
pub trait Projector {
    /// Writes the folder for `instance` and returns its path.
    async fn project<'p, 'i>(&'p self, instance: &'i TaskInstance) -> Result<PathBuf, Error>;
}

/// Timestamp used in folder names, with the sentinel for never-modified instances.
pub fn modified_or_sentinel(instance: &TaskInstance) -> &str {
    match instance.modified.as_deref() {
        None | Some("None") => UNMODIFIED_SENTINEL,
        Some(modified) => modified,
    }
}

/// Stable folder name: `<modified>-<id>-<task name>_-_<organization>`, sanitized.
pub fn folder_name(instance: &TaskInstance) -> String {
    let raw = format!(
        "{}-{}-{}_-_{}",
        modified_or_sentinel(instance),
        instance.id,
        instance.task_definition_name.replace('"', ""),
        instance.organization_name
    );
    let underscored: String = raw
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    sanitize(&underscored)
}

/// File name for an attachment: the last directory of its URL path, `_`, then its own name.
pub fn attachment_file_name(attachment: &Attachment) -> String {
    let path = attachment
        .url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let parent = Path::new(path)
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize(&format!("{parent}_{}", attachment.filename))
}

fn join(items: &[String]) -> String {
    items.join(", ")
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Renders the human-readable `instance.txt` summary.
pub fn summary(instance: &TaskInstance) -> String {
    let categories: Vec<String> = instance
        .categories
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|code| Category::describe(*code))
        .collect();
    let is_beginner = if instance.is_beginner.unwrap_or(false) {
        "Yes"
    } else {
        "No"
    };
    let status = match (&instance.status, &instance.deadline) {
        (InstanceStatus::Completed, Some(deadline)) => format!("{} ({deadline})", instance.status),
        _ => instance.status.to_string(),
    };

    let mut output = String::new();
    output += &format!(
        "{} (Org ID {})\n",
        instance.organization_name, instance.organization_id
    );
    output += &format!(
        "Task ID {} | Task Definition ID {}\n",
        instance.id, instance.task_definition_id
    );
    output += &format!("Max instances: {}\n", or_dash(instance.max_instances));
    output += "\n";
    output += &format!("Title: {}\n", instance.task_definition_name);
    output += &format!(
        "Description: {}\n",
        instance.description.as_deref().unwrap_or_default()
    );
    output += &format!(
        "Tags: {}\n",
        join(instance.tags.as_deref().unwrap_or_default())
    );
    output += "\n";
    output += &format!("Categories: {}\n", categories.join(", "));
    output += &format!("Is Beginner: {is_beginner}\n");
    output += &format!(
        "Time given to complete: {} days\n",
        or_dash(instance.time_to_complete_in_days)
    );
    output += "\n";
    output += &format!(
        "Mentors: {}\n",
        join(instance.mentors.as_deref().unwrap_or_default())
    );
    output += &format!(
        "Student: {} (ID {})\n",
        instance.student_display_name.as_deref().unwrap_or_default(),
        or_dash(instance.student_id)
    );
    output += "\n";
    output += &format!("Status: {status}\n");
    output += &format!("Last modified: {}\n", modified_or_sentinel(instance));
    output
}

/// Projects instances below `instances_dir`, fetching activity and attachments through `api`.
pub struct InstanceProjector<'a, API: GciApi> {
    api: &'a API,
    instances_dir: PathBuf,
}

impl<'a, API: GciApi> InstanceProjector<'a, API> {
    pub fn new(api: &'a API, instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            instances_dir: instances_dir.into(),
        }
    }

    async fn download_attachments(&self, folder: &Path, activity: &Activity) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for attachment in activity.attachments() {
            let file_name = attachment_file_name(attachment);
            if !seen.insert(file_name.clone()) {
                warn!("{file_name} appears twice, {} overwrites it", attachment.url);
            }
            info!("getting {file_name}");
            let destination = folder.join(&file_name);
            match self
                .api
                .download_attachment(&attachment.url, &destination)
                .await?
            {
                Download::Saved { bytes } => info!("saved {file_name} ({bytes} bytes)"),
                Download::Failed { status } => {
                    warn!("{} failed with status {status}", attachment.url)
                }
            }
        }
        Ok(())
    }
}

impl<API: GciApi> Projector for InstanceProjector<'_, API> {
    #[tracing::instrument(skip_all, fields(instance = instance.id))]
    async fn project<'p, 'i>(&'p self, instance: &'i TaskInstance) -> Result<PathBuf, Error> {
        let mut record = instance.clone();
        record.modified = Some(modified_or_sentinel(instance).to_string());

        let folder = self.instances_dir.join(folder_name(&record));
        ensure_dir(&folder).await?;
        info!("@ {}", folder.display());

        tokio::fs::write(folder.join(INSTANCE_SUMMARY_FILENAME), summary(&record)).await?;

        let activity = Activity::from_response(self.api.get_instance_activity(record.id).await?);
        write_json(&folder.join(INSTANCE_ACTIVITY_FILENAME), &activity.raw).await?;

        self.download_attachments(&folder, &activity).await?;

        write_json(&folder.join(INSTANCE_FILENAME), &record).await?;
        Ok(folder)
    }
}
