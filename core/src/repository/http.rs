use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};

use crate::config::ClientConfig;
use crate::error::RepositoryError;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};
use crate::repository::traits::{RepositoryResult, TaskRepository};

const TASK_RESOURCE: &str = "task";

/// REST client for the task API.
#[derive(Clone)]
pub struct HttpTaskRepository {
    client: Client,
    base_url: String,
}

impl HttpTaskRepository {
    pub fn new(config: &ClientConfig) -> RepositoryResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, TASK_RESOURCE)
    }

    fn item_url(&self, id: TaskId) -> String {
        format!("{}/{}/{}", self.base_url, TASK_RESOURCE, id)
    }

    fn request(&self, method: Method, url: String, token: &str) -> RequestBuilder {
        tracing::debug!(%method, %url, "task api request");
        self.client.request(method, url).bearer_auth(token)
    }
}

/// Turns a non-2xx response into `RepositoryError::Status`, keeping the body for logs.
async fn check_status(response: Response) -> RepositoryResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "task api rejected request");
    Err(RepositoryError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TaskRepository for HttpTaskRepository {
    async fn list(&self, token: &str) -> RepositoryResult<Vec<Task>> {
        let response = self
            .request(Method::GET, self.collection_url(), token)
            .send()
            .await?;
        let tasks = check_status(response).await?.json::<Vec<Task>>().await?;
        Ok(tasks)
    }

    async fn create(&self, token: &str, task: &NewTask) -> RepositoryResult<Task> {
        let response = self
            .request(Method::POST, self.collection_url(), token)
            .json(task)
            .send()
            .await?;
        let created = check_status(response).await?.json::<Task>().await?;
        Ok(created)
    }

    async fn update(&self, token: &str, id: TaskId, patch: TaskPatch) -> RepositoryResult<Option<Task>> {
        let response = self
            .request(Method::PATCH, self.item_url(id), token)
            .json(&patch)
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }
        // Some deployments answer with `{}` or a status envelope; the
        // optimistic record stays in place in that case.
        match serde_json::from_slice::<Task>(&body) {
            Ok(task) => Ok(Some(task)),
            Err(e) => {
                tracing::debug!(id, error = %e, "update response carried no task record");
                Ok(None)
            }
        }
    }

    async fn delete(&self, token: &str, id: TaskId) -> RepositoryResult<()> {
        let response = self
            .request(Method::DELETE, self.item_url(id), token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
