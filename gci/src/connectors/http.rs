//! `reqwest`-based implementation of the GCI connector.

use crate::connectors::{Download, Error, GciApi, SessionCookies};
use crate::model::{Page, RawTask, Task, TaskInstance};
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const PROGRAM_API_PATH: &str = "api/program/current/";

/// Talks to the program API with the bearer API key and to the dashboard
/// endpoints with the session cookies.
pub struct HttpGciApi {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    cookies: SessionCookies,
}

impl HttpGciApi {
    /// Creates a new connector.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Service root, e.g. `https://codein.withgoogle.com`
    /// * `api_key` - Program API key sent as a bearer token
    /// * `cookies` - Dashboard session cookies; may be empty when only the program API is used
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        cookies: SessionCookies,
    ) -> Result<Self, Error> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
            cookies,
        })
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    fn program_url(&self, path: &str) -> Result<Url, Error> {
        self.url(&format!("{PROGRAM_API_PATH}{path}"))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    /// Session cookies only go to the service's own origin.
    fn sends_session_to(&self, url: &Url) -> bool {
        !self.cookies.is_empty() && url.origin() == self.base_url.origin()
    }

    fn dashboard_get(&self, url: Url) -> RequestBuilder {
        if !self.sends_session_to(&url) {
            debug!("GET {url} without session cookie");
            return self.http.get(url);
        }
        self.http
            .get(url)
            .header(COOKIE, self.cookies.header_value())
    }

    /// Parse an API response, mapping HTTP errors to `Error::Server`.
    async fn parse<R: DeserializeOwned>(resp: Response) -> Result<R, Error> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Server {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<R>()
            .await
            .map_err(|e| Error::Decode(format!("response body: {e}")))
    }

    async fn get_program<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, Error> {
        let url = self.program_url(path)?;
        debug!("GET {url}");
        let resp = self.authed(self.http.get(url)).query(query).send().await?;
        Self::parse(resp).await
    }
}

impl GciApi for HttpGciApi {
    async fn list_tasks(&self, page: u32) -> Result<Page<Task>, Error> {
        self.get_program("tasks/", &[("page", page.to_string())]).await
    }

    async fn list_task_instances(&self, page: u32) -> Result<Page<TaskInstance>, Error> {
        self.get_program("instances/", &[("page", page.to_string())]).await
    }

    async fn get_task(&self, id: u64) -> Result<Task, Error> {
        self.get_program(&format!("tasks/{id}/"), &[]).await
    }

    async fn get_task_instance(&self, id: u64) -> Result<TaskInstance, Error> {
        self.get_program(&format!("instances/{id}/"), &[]).await
    }

    async fn new_task<'api, 'task>(&'api self, task: &'task RawTask) -> Result<Value, Error> {
        let url = self.program_url("tasks/")?;
        debug!("POST {url}");
        let resp = self.authed(self.http.post(url)).json(task).send().await?;
        Self::parse(resp).await
    }

    async fn get_instance_activity(&self, instance_id: u64) -> Result<Value, Error> {
        let url = self.program_url("taskupdate/")?;
        debug!("GET {url} for instance {instance_id}");
        let resp = self
            .dashboard_get(url)
            .query(&[("task_instance", instance_id.to_string())])
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn download_attachment<'api, 'url, 'dest>(
        &'api self,
        url: &'url str,
        destination: &'dest Path,
    ) -> Result<Download, Error> {
        let url = self.url(url.trim_start_matches('/'))?;
        debug!("GET {url} -> {}", destination.display());
        let mut resp = self.dashboard_get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(Download::Failed {
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut bytes = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(Download::Saved { bytes })
    }
}
