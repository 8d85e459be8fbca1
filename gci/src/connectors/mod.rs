//! Connectivity to the GCI program service.
//!
//! This module provides abstractions for talking to the remote service:
//! - Error types for transport and HTTP failures
//! - The `GciApi` trait describing every remote call the tool makes
//! - Session cookie loading for the dashboard endpoints
//!
//! A concrete implementation using `reqwest` lives in the `http` submodule.
//! Tests substitute the generated `MockGciApi`.

use crate::model::{Page, RawTask, Task, TaskInstance};
use mockall::automock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub mod http;

pub use http::HttpGciApi;

/// Name of the dashboard session cookie.
pub const SESSION_COOKIE_NAME: &str = "SACSID";

/// Errors that can occur while talking to the GCI service.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status
    #[error("Server responded with {status}: {body}")]
    Server { status: u16, body: String },
    /// The response body did not have the expected shape
    #[error("Cannot decode response: {0}")]
    Decode(String),
    /// A URL could not be built from the configured base and a path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Writing a downloaded file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of an attachment download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    /// The file was written with this many bytes
    Saved { bytes: u64 },
    /// The service refused the download; nothing was written
    Failed { status: u16 },
}

/// Every call the archiver and submitter make against the remote service.
#[automock]
pub trait GciApi {
    /// Lists one page of task definitions, starting at page 1.
    async fn list_tasks(&self, page: u32) -> Result<Page<Task>, Error>;

    /// Lists one page of task instances, starting at page 1.
    async fn list_task_instances(&self, page: u32) -> Result<Page<TaskInstance>, Error>;

    async fn get_task(&self, id: u64) -> Result<Task, Error>;

    async fn get_task_instance(&self, id: u64) -> Result<TaskInstance, Error>;

    /// Creates a new task definition from the body of a local task file and
    /// returns the service's reply.
    async fn new_task<'api, 'task>(&'api self, task: &'task RawTask) -> Result<Value, Error>;

    /// Fetches the raw activity feed (discussion and status changes) of an instance.
    async fn get_instance_activity(&self, instance_id: u64) -> Result<Value, Error>;

    /// Streams an attachment to `destination`.
    ///
    /// # Arguments
    ///
    /// * `url` - Attachment URL as listed in the activity feed, relative to the service root
    /// * `destination` - File to create; left untouched when the service refuses the download
    ///
    /// # Returns
    ///
    /// * `Result<Download, Error>` - What happened to the file, or a transport error
    async fn download_attachment<'api, 'url, 'dest>(
        &'api self,
        url: &'url str,
        destination: &'dest Path,
    ) -> Result<Download, Error>;
}

/// Cookies sent along with dashboard requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionCookies {
    cookies: BTreeMap<String, String>,
}

impl SessionCookies {
    /// Builds the `{"SACSID": <value>}` map from a session cookie value.
    pub fn sacsid(value: impl Into<String>) -> Self {
        let mut cookies = BTreeMap::new();
        cookies.insert(SESSION_COOKIE_NAME.to_string(), value.into());
        Self { cookies }
    }

    /// Reads the first line of `path` as the session cookie value.
    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let value = contents.lines().next().unwrap_or_default();
        Ok(Self::sacsid(value))
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Renders the map as a `Cookie` header value.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
