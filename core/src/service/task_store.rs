use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{RepositoryError, StoreError, ValidationError};
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};
use crate::repository::TaskRepository;
use crate::service::projector::ViewQuery;
use crate::session::SessionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StorePhase {
    Uninitialized,
    Loading,
    Ready,
    Error,
    /// Terminal for this store instance. A new token needs a new store.
    Unauthenticated,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub phase: StorePhase,
    pub tasks: Vec<Task>,
    pub error: Option<String>,
}

impl StoreSnapshot {
    fn initial() -> Self {
        Self {
            phase: StorePhase::Uninitialized,
            tasks: Vec::new(),
            error: None,
        }
    }

    pub fn view(&self, query: &ViewQuery) -> Vec<Task> {
        query.project(&self.tasks).into_iter().cloned().collect()
    }
}

struct Inner {
    phase: StorePhase,
    tasks: Vec<Task>,
    error: Option<String>,
    token: Option<String>,
    // Last requested fetch wins; older responses are dropped on arrival.
    fetch_generation: u64,
    // Bumped on every collection change, used to decide how a toggle rolls back.
    revision: u64,
    signed_out: bool,
    toggles: HashMap<TaskId, PendingToggle>,
}

/// Toggles of one record still waiting for the server.
struct PendingToggle {
    // Last record the server agreed with, restored when a toggle fails.
    settled: Task,
    in_flight: usize,
}

impl Inner {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            phase: self.phase,
            tasks: self.tasks.clone(),
            error: self.error.clone(),
        }
    }

    fn active_token(&self) -> Result<String, StoreError> {
        if self.phase == StorePhase::Unauthenticated {
            return Err(StoreError::NotSignedIn);
        }
        self.token.clone().ok_or(StoreError::NotSignedIn)
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Discards everything tied to the session.
    fn end_session(&mut self) {
        self.phase = StorePhase::Unauthenticated;
        self.tasks.clear();
        self.error = None;
        self.token = None;
        self.toggles.clear();
        self.revision += 1;
    }

    /// Returns true the first time only, so the session is logged out once.
    fn mark_signed_out(&mut self) -> bool {
        self.end_session();
        !std::mem::replace(&mut self.signed_out, true)
    }

    fn begin_toggle(&mut self, before: &Task) {
        self.toggles
            .entry(before.id)
            .and_modify(|t| t.in_flight += 1)
            .or_insert_with(|| PendingToggle {
                settled: before.clone(),
                in_flight: 1,
            });
    }

    /// Records one finished toggle and returns the settled record.
    fn finish_toggle(&mut self, id: TaskId, confirmed: Option<Task>) -> Option<Task> {
        let pending = self.toggles.get_mut(&id)?;
        if let Some(task) = confirmed {
            pending.settled = task;
        }
        pending.in_flight -= 1;
        let settled = pending.settled.clone();
        if pending.in_flight == 0 {
            self.toggles.remove(&id);
        }
        Some(settled)
    }
}

/// Owns the task collection of one signed-in session.
///
/// Every operation takes `&self` so a presentation layer can keep several
/// requests in flight. The lock is never held across a request.
pub struct TaskStore<R: TaskRepository> {
    repo: R,
    session: Arc<dyn SessionProvider>,
    inner: Mutex<Inner>,
    updates: watch::Sender<StoreSnapshot>,
}

impl<R: TaskRepository> TaskStore<R> {
    pub fn new(repo: R, session: Arc<dyn SessionProvider>) -> Self {
        let (updates, _) = watch::channel(StoreSnapshot::initial());
        Self {
            repo,
            session,
            inner: Mutex::new(Inner {
                phase: StorePhase::Uninitialized,
                tasks: Vec::new(),
                error: None,
                token: None,
                fetch_generation: 0,
                revision: 0,
                signed_out: false,
                toggles: HashMap::new(),
            }),
            updates,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.lock().snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.updates.subscribe()
    }

    pub fn phase(&self) -> StorePhase {
        self.inner.lock().phase
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    pub fn view(&self, query: &ViewQuery) -> Vec<Task> {
        let inner = self.inner.lock();
        query.project(&inner.tasks).into_iter().cloned().collect()
    }

    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.snapshot());
    }

    /// Starts the session. Without a token the store goes straight to
    /// `Unauthenticated` and nothing is fetched.
    pub async fn initialize(&self, token: Option<String>) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock();
            if inner.phase == StorePhase::Unauthenticated {
                return Err(StoreError::NotSignedIn);
            }
            match token.filter(|t| !t.trim().is_empty()) {
                Some(token) => inner.token = Some(token),
                None => {
                    tracing::info!("no session token, store is unauthenticated");
                    inner.end_session();
                    self.publish(&inner);
                    return Err(StoreError::NotSignedIn);
                }
            }
        }
        self.fetch().await
    }

    /// Refetches while the current list stays visible.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.fetch().await
    }

    /// Reloads after a failed fetch. Calling it while a fetch is already in
    /// flight does nothing.
    pub async fn retry(&self) -> Result<(), StoreError> {
        if self.phase() == StorePhase::Loading {
            tracing::debug!("retry ignored, fetch already in flight");
            return Ok(());
        }
        self.fetch().await
    }

    async fn fetch(&self) -> Result<(), StoreError> {
        let (token, generation) = {
            let mut inner = self.inner.lock();
            let token = inner.active_token()?;
            inner.fetch_generation += 1;
            inner.phase = StorePhase::Loading;
            inner.error = None;
            self.publish(&inner);
            (token, inner.fetch_generation)
        };
        tracing::debug!(generation, "fetching tasks");

        let result = self.repo.list(&token).await;

        let mut inner = self.inner.lock();
        if inner.phase == StorePhase::Unauthenticated {
            tracing::debug!(generation, "dropping fetch response after sign-out");
            return Err(StoreError::AuthFailure);
        }
        if let Err(e) = &result {
            if e.is_unauthorized() {
                return Err(self.sign_out(inner));
            }
        }
        if generation != inner.fetch_generation {
            tracing::debug!(generation, latest = inner.fetch_generation, "dropping superseded fetch");
            return Ok(());
        }

        match result {
            Ok(tasks) => {
                tracing::info!(count = tasks.len(), "tasks loaded");
                inner.tasks = tasks;
                inner.phase = StorePhase::Ready;
                inner.revision += 1;
                self.publish(&inner);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load tasks");
                let err = StoreError::Fetch(e);
                inner.phase = StorePhase::Error;
                inner.error = Some(err.to_string());
                self.publish(&inner);
                Err(err)
            }
        }
    }

    /// Creates a task and appends the server's record. A blank title fails
    /// locally without a request.
    pub async fn add_task(&self, title: &str, description: &str) -> Result<Task, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::BlankTitle.into());
        }
        let token = self.inner.lock().active_token()?;

        let result = self.repo.create(&token, &NewTask::new(title, description)).await;

        let mut inner = self.inner.lock();
        let created = self.accept(&inner, result, StoreError::AddTask);
        match created {
            Ok(task) => {
                tracing::info!(id = task.id, "task added");
                inner.tasks.push(task.clone());
                inner.revision += 1;
                self.publish(&inner);
                Ok(task)
            }
            Err(Failure::SignedOut) => Err(self.sign_out(inner)),
            Err(Failure::Late) => Err(StoreError::AuthFailure),
            Err(Failure::Report(err)) => Err(err),
        }
    }

    /// Flips `done` locally, then asks the server. Rolls back on failure.
    ///
    /// Returns `None` when no task has this id.
    pub async fn toggle_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let (token, snapshot, before, done, revision) = {
            let mut inner = self.inner.lock();
            let token = inner.active_token()?;
            let Some(pos) = inner.position(id) else {
                return Ok(None);
            };
            let snapshot = inner.tasks.clone();
            let before = inner.tasks[pos].clone();
            let done = !before.done;
            inner.begin_toggle(&before);
            inner.tasks[pos].done = done;
            inner.revision += 1;
            self.publish(&inner);
            (token, snapshot, before, done, inner.revision)
        };
        tracing::debug!(id, done, "optimistic toggle");

        let result = self.repo.update(&token, id, TaskPatch { done }).await;

        let mut inner = self.inner.lock();
        let outcome = self.accept(&inner, result, |source| {
            StoreError::UpdateTask { id, source }
        });
        match outcome {
            Ok(server_copy) => {
                let server_copy = server_copy.filter(|t| t.id == id);
                let confirmed = server_copy.clone().unwrap_or(Task { done, ..before });
                inner.finish_toggle(id, Some(confirmed));
                let pos = inner.position(id);
                if let (Some(pos), Some(server)) = (pos, server_copy) {
                    // A later toggle of the same record keeps its optimistic value.
                    if inner.tasks[pos].done == done {
                        inner.tasks[pos] = server;
                        inner.revision += 1;
                        self.publish(&inner);
                    }
                }
                Ok(inner.position(id).map(|pos| inner.tasks[pos].clone()))
            }
            Err(Failure::SignedOut) => Err(self.sign_out(inner)),
            Err(Failure::Late) => Err(StoreError::AuthFailure),
            Err(Failure::Report(err)) => {
                tracing::warn!(id, "toggle failed, rolling back");
                let settled = inner.finish_toggle(id, None);
                if inner.revision == revision {
                    inner.tasks = snapshot;
                } else if let (Some(pos), Some(settled)) = (inner.position(id), settled) {
                    // Something else changed the list meanwhile; only undo our flip,
                    // and only if a later toggle has not replaced it.
                    if inner.tasks[pos].done == done {
                        inner.tasks[pos] = settled;
                    }
                }
                inner.revision += 1;
                self.publish(&inner);
                Err(err)
            }
        }
    }

    /// Deletes on the server first, then removes locally.
    ///
    /// Returns the removed task, or `None` when no task has this id.
    pub async fn delete_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let token = {
            let inner = self.inner.lock();
            let token = inner.active_token()?;
            if inner.position(id).is_none() {
                return Ok(None);
            }
            token
        };

        let result = self.repo.delete(&token, id).await;

        let mut inner = self.inner.lock();
        let outcome = self.accept(&inner, result, |source| {
            StoreError::DeleteTask { id, source }
        });
        match outcome {
            Ok(()) => {
                tracing::info!(id, "task deleted");
                let removed = inner.position(id).map(|pos| inner.tasks.remove(pos));
                inner.revision += 1;
                self.publish(&inner);
                Ok(removed)
            }
            Err(Failure::SignedOut) => Err(self.sign_out(inner)),
            Err(Failure::Late) => Err(StoreError::AuthFailure),
            Err(Failure::Report(err)) => Err(err),
        }
    }

    /// Classifies a mutation response: late arrivals after sign-out are
    /// dropped, authorization failures sign out, the rest are reported.
    fn accept<T>(
        &self,
        inner: &Inner,
        result: Result<T, RepositoryError>,
        report: impl FnOnce(RepositoryError) -> StoreError,
    ) -> Result<T, Failure> {
        if inner.phase == StorePhase::Unauthenticated {
            tracing::debug!("dropping response after sign-out");
            return Err(Failure::Late);
        }
        result.map_err(|e| {
            if e.is_unauthorized() {
                Failure::SignedOut
            } else {
                tracing::warn!(error = %e, "task request failed");
                Failure::Report(report(e))
            }
        })
    }

    fn sign_out(&self, mut inner: MutexGuard<'_, Inner>) -> StoreError {
        let first = inner.mark_signed_out();
        self.publish(&inner);
        drop(inner);
        if first {
            tracing::warn!("authorization rejected, signing out");
            self.session.logout();
        }
        StoreError::AuthFailure
    }
}

enum Failure {
    SignedOut,
    Late,
    Report(StoreError),
}
