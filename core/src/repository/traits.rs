use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Remote task API, parameterized by the caller's bearer token.
///
/// Timeouts and retry counts are the implementation's business; the store
/// treats every failure alike except an authorization failure.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list(&self, token: &str) -> RepositoryResult<Vec<Task>>;

    async fn create(&self, token: &str, task: &NewTask) -> RepositoryResult<Task>;

    /// Returns the server's copy of the record when the response carries one.
    async fn update(&self, token: &str, id: TaskId, patch: TaskPatch) -> RepositoryResult<Option<Task>>;

    async fn delete(&self, token: &str, id: TaskId) -> RepositoryResult<()>;
}

#[async_trait]
impl<T: TaskRepository + ?Sized> TaskRepository for std::sync::Arc<T> {
    async fn list(&self, token: &str) -> RepositoryResult<Vec<Task>> {
        (**self).list(token).await
    }

    async fn create(&self, token: &str, task: &NewTask) -> RepositoryResult<Task> {
        (**self).create(token, task).await
    }

    async fn update(&self, token: &str, id: TaskId, patch: TaskPatch) -> RepositoryResult<Option<Task>> {
        (**self).update(token, id, patch).await
    }

    async fn delete(&self, token: &str, id: TaskId) -> RepositoryResult<()> {
        (**self).delete(token, id).await
    }
}
