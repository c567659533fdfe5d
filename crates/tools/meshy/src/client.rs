//! Meshy API client: task submission, retrieval and listing
//!
//! Polling lives in [`crate::poller`]; this module holds the single-request
//! operations it is built from.

use crate::auth::ApiKey;
use crate::config::ClientConfig;
use crate::endpoint::{EndpointRouter, JobFamily, Operation};
use crate::error::{MeshyError, Result};
use crate::request::TaskRequest;
use crate::transport::{Headers, HttpResponse, RequestBody, ReqwestTransport, Transport};
use crate::types::{SortOrder, TaskId, TaskResponse, TaskResult};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Identity of a submitted task: its family selects the endpoint, its id
/// the task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub family: JobFamily,
    pub id: TaskId,
}

impl TaskRef {
    pub fn new(family: JobFamily, id: impl Into<TaskId>) -> Self {
        Self {
            family,
            id: id.into(),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family, self.id)
    }
}

/// Paging and ordering of a task listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number
    pub page_num: Option<u32>,
    pub page_size: Option<u32>,
    pub sort: Option<SortOrder>,
}

impl ListQuery {
    /// Server defaults for paging and order
    pub fn new() -> Self {
        Self::default()
    }

    /// Request page `page_num`, counting from 1
    pub fn page(mut self, page_num: u32) -> Self {
        self.page_num = Some(page_num);
        self
    }

    /// Tasks per page
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Order by creation time
    pub fn sort(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    fn to_pairs(self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page_num {
            pairs.push(("pageNum", page.to_string()));
        }
        if let Some(size) = self.page_size {
            pairs.push(("pageSize", size.to_string()));
        }
        if let Some(order) = self.sort {
            pairs.push(("sortBy", order.as_query().to_string()));
        }
        pairs
    }
}

/// Async client for the Meshy task API
///
/// Cloning is cheap; clones share the transport.
///
/// # Example
///
/// ```no_run
/// use meshy::{ApiKey, MeshyClient, PreviewRequest};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MeshyClient::new(ApiKey::new("msy_...")?)?;
///
///     let task = client.submit(&PreviewRequest::new("Lantern").into()).await?;
///     let result = client
///         .poll(&task, |r| println!("{}", r.progress_report()), &CancellationToken::new())
///         .await?;
///
///     println!("{:?}", result.model_urls);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MeshyClient {
    transport: Arc<dyn Transport>,
    router: EndpointRouter,
    pub(crate) config: ClientConfig,
    api_key: Option<ApiKey>,
}

impl MeshyClient {
    /// Client with default settings and the `reqwest` transport
    pub fn new(api_key: ApiKey) -> Result<Self> {
        Self::with_config(Some(api_key), ClientConfig::default())
    }

    /// Configuration from the environment, key from the default lookup
    /// chain (see [`ApiKey::load_default`])
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Self::with_config(Some(ApiKey::load_default()?), config)
    }

    pub fn with_config(api_key: Option<ApiKey>, config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new().with_timeout(config.request_timeout);
        Self::with_transport(Arc::new(transport), api_key, config)
    }

    /// Client over any [`Transport`]
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        api_key: Option<ApiKey>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let router = EndpointRouter::new(&config.base_url())?;
        Ok(Self {
            transport,
            router,
            config,
            api_key,
        })
    }

    /// Settings the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// URL builder for the configured domain
    pub fn router(&self) -> &EndpointRouter {
        &self.router
    }

    pub fn has_valid_authentication(&self) -> bool {
        self.api_key.is_some()
    }

    fn headers(&self) -> Result<Headers> {
        let key = self.api_key.as_ref().ok_or_else(|| {
            MeshyError::Authentication(
                "You must provide an API key before calling the Meshy API".to_string(),
            )
        })?;
        Ok(vec![
            ("Authorization".to_string(), key.bearer()),
            ("User-Agent".to_string(), self.config.user_agent.clone()),
        ])
    }

    /// Create a task and return its identity
    ///
    /// Requests with an attached file are sent as multipart forms, all
    /// others as JSON. Nothing is retried here: a missing id in a
    /// successful response is a [`MeshyError::Protocol`] error, and any
    /// non-2xx status, 429 included, is a [`MeshyError::Remote`] carrying
    /// the status and body.
    pub async fn submit(&self, request: &TaskRequest) -> Result<TaskRef> {
        let headers = self.headers()?;
        request.validate()?;

        let family = request.family();
        let url = self.router.url(family, Operation::Create, &[]);
        let body = request.to_body()?;
        let encoding = match &body {
            RequestBody::Json(_) => "json",
            RequestBody::Multipart(_) => "multipart",
        };
        tracing::debug!("POST {} ({})", url, encoding);

        let response = self
            .transport
            .post(&url, &headers, body)
            .await?
            .error_for_status_remote()?;

        let id = serde_json::from_str::<TaskResponse>(&response.body)
            .ok()
            .and_then(|r| r.result)
            .map(TaskId::new)
            .filter(|id| !id.is_blank())
            .ok_or_else(|| {
                MeshyError::Protocol(format!(
                    "Failed to get a valid task id from response: {}",
                    response.body
                ))
            })?;

        tracing::info!("Created {} task {}", family, id);
        Ok(TaskRef { family, id })
    }

    /// Fetch the current snapshot of a task
    ///
    /// A blank id is rejected before any request is made.
    pub async fn retrieve(&self, task: &TaskRef) -> Result<TaskResult> {
        let url = self.task_url(task)?;
        self.get_json(&url, "task").await
    }

    /// Single retrieval for the poll loop; a 429 stays
    /// [`MeshyError::RateLimited`] so the loop can back off
    pub(crate) async fn fetch_task(&self, task: &TaskRef) -> Result<TaskResult> {
        let url = self.task_url(task)?;
        let response = self.get_response(&url).await?.error_for_status()?;
        parse_json(&response.body, "task")
    }

    fn task_url(&self, task: &TaskRef) -> Result<String> {
        if task.id.is_blank() {
            return Err(MeshyError::Validation(format!(
                "Cannot retrieve a {} task without an id",
                task.family
            )));
        }
        Ok(self
            .router
            .url(task.family, Operation::Retrieve(&task.id), &[]))
    }

    /// List tasks of a family in the order the server returns them
    ///
    /// Image-to-3D tasks cannot be listed.
    pub async fn list(&self, family: JobFamily, query: &ListQuery) -> Result<Vec<TaskResult>> {
        if !family.supports_listing() {
            return Err(MeshyError::Unsupported(format!(
                "listing {} tasks is not supported by the API",
                family
            )));
        }
        let url = self.router.url(family, Operation::List, &query.to_pairs());
        self.get_json(&url, "task list").await
    }

    /// GET `url` and decode the body; every non-2xx status is `Remote`
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self.get_response(url).await?.error_for_status_remote()?;
        parse_json(&response.body, what)
    }

    async fn get_response(&self, url: &str) -> Result<HttpResponse> {
        let headers = self.headers()?;
        tracing::debug!("GET {}", url);
        self.transport.get(url, &headers).await
    }
}

fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| MeshyError::Protocol(format!("Failed to parse {} response: {}", what, e)))
}

impl fmt::Debug for MeshyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshyClient")
            .field("base_url", &self.router.base_url().as_str())
            .field("config", &self.config)
            .field("api_key", &self.api_key)
            .finish()
    }
}
