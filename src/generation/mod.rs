//! Generation client. Submits a prompt, then polls until the backend finishes.
//!
//! DESIGN
//! ======
//! Generation runs out-of-band on the backend. `submit` returns a task id;
//! `await_result` polls the result endpoint sequentially on a fixed
//! interval until the task completes, fails, or the attempt budget runs
//! out. The first poll is immediate and the delay sits between polls, so a
//! timeout is reported after at most `max_attempts * interval`.
//!
//! Every wait (the in-flight request and the inter-poll delay) is raced
//! against a `CancellationToken`; a view that goes away stops polling at
//! once.
//!
//! ERROR HANDLING
//! ==============
//! Submission is never retried: a duplicate submit could start a second
//! backend task. Retryable transport errors on a poll (connection failure,
//! 429, 5xx) are retried a bounded number of times with linear backoff.
//! Timeouts are terminal and reported.
//!
//! Task bookkeeping keeps terminal outcomes, so awaiting a finished task
//! returns the stored result or error without touching the network.
//! Only the most recent `DEFAULT_FINISHED_LIMIT` finished tasks are kept;
//! older ones are evicted oldest first. Cancellation leaves the task
//! pending; it can be awaited again later.
//!
//! A submit that returns a task id the client already tracks is rejected,
//! so a known task is never reset or polled twice at once.

pub mod http;
pub mod types;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::error::ErrorCode;
pub use types::{
    GenerationBackend, GenerationError, GenerationKind, GenerationRequest, GenerationTask, PollResponse, PollStatus,
    SubmitResponse, TaskHandle, TaskId, TaskStatus, ToneParams,
};

/// Finished tasks kept for `await_result` replays before eviction.
pub const DEFAULT_FINISHED_LIMIT: usize = 256;

/// Live and recently finished tasks.
struct TaskBook {
    tasks: HashMap<TaskId, GenerationTask>,
    /// Terminal task ids, oldest first.
    finished: VecDeque<TaskId>,
    finished_limit: usize,
}

impl TaskBook {
    fn new(finished_limit: usize) -> Self {
        Self { tasks: HashMap::new(), finished: VecDeque::new(), finished_limit }
    }

    fn mark_finished(&mut self, task_id: &TaskId) {
        self.finished.push_back(task_id.clone());
        while self.finished.len() > self.finished_limit {
            if let Some(evicted) = self.finished.pop_front() {
                self.tasks.remove(&evicted);
                debug!(task_id = %evicted, "finished task evicted");
            }
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Generation request/poll client. Cheap to clone; clones share bookkeeping.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    policy: PollPolicy,
    book: Arc<Mutex<TaskBook>>,
}

enum PollStart {
    Poll(PollGuard),
    Finished(Result<String, GenerationError>),
}

/// Clears the task's in-flight flag on every exit path.
struct PollGuard {
    book: Arc<Mutex<TaskBook>>,
    task_id: TaskId,
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.book).tasks.get_mut(&self.task_id) {
            task.polling = false;
        }
    }
}

impl GenerationClient {
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>, policy: PollPolicy) -> Self {
        Self::with_finished_limit(backend, policy, DEFAULT_FINISHED_LIMIT)
    }

    /// Like [`GenerationClient::new`], keeping at most `limit` finished tasks.
    #[must_use]
    pub fn with_finished_limit(backend: Arc<dyn GenerationBackend>, policy: PollPolicy, limit: usize) -> Self {
        Self { backend, policy, book: Arc::new(Mutex::new(TaskBook::new(limit))) }
    }

    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Send `request` to the generator for `kind` and record the new task.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Submission`] if the prompt is empty, the
    /// endpoint is unreachable or rejects the request, no task id comes back,
    /// or the returned id belongs to a task this client already tracks.
    pub async fn submit(&self, kind: GenerationKind, request: GenerationRequest) -> Result<TaskHandle, GenerationError> {
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::Submission { reason: "prompt is empty".into() });
        }

        let response = self.backend.submit(kind, &request).await.map_err(|e| {
            warn!(error = %e, %kind, "generation submit failed");
            into_submission_error(e)
        })?;

        let Some(raw_id) = response.task_id.filter(|id| !id.trim().is_empty()) else {
            warn!(%kind, "generation submit returned no task id");
            return Err(GenerationError::Submission { reason: "response missing task_id".into() });
        };

        let task_id = TaskId::new(raw_id);
        match lock(&self.book).tasks.entry(task_id.clone()) {
            Entry::Occupied(existing) => {
                warn!(%task_id, %kind, status = ?existing.get().status, "generation submit returned a known task id");
                return Err(GenerationError::Submission { reason: format!("duplicate task_id {task_id}") });
            }
            Entry::Vacant(slot) => {
                slot.insert(GenerationTask::new(task_id.clone(), kind, &request));
            }
        }
        info!(%task_id, %kind, "generation submitted");
        Ok(TaskHandle { task_id, kind })
    }

    /// Poll until `task_id` completes.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Timeout`] when the attempt budget is exhausted
    /// - [`GenerationError::Transport`] when a poll fails (after retries)
    /// - [`GenerationError::Failed`] when the backend reports failure or an empty result
    /// - [`GenerationError::Cancelled`] when `cancel` fires
    /// - [`GenerationError::AlreadyPolling`] when another caller is polling this task
    pub async fn await_result(&self, task_id: &TaskId, cancel: &CancellationToken) -> Result<String, GenerationError> {
        let guard = match self.begin_polling(task_id)? {
            PollStart::Poll(guard) => guard,
            PollStart::Finished(outcome) => return outcome,
        };

        let outcome = self.poll_loop(task_id, cancel).await;
        self.record_outcome(task_id, &outcome);
        drop(guard);
        outcome
    }

    /// `submit` followed by `await_result`.
    ///
    /// # Errors
    ///
    /// Any error from either step.
    pub async fn generate(
        &self,
        kind: GenerationKind,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let handle = self.submit(kind, request).await?;
        self.await_result(&handle.task_id, cancel).await
    }

    /// Snapshot of the bookkeeping entry for `task_id`.
    #[must_use]
    pub fn task(&self, task_id: &TaskId) -> Option<GenerationTask> {
        lock(&self.book).tasks.get(task_id).cloned()
    }

    fn begin_polling(&self, task_id: &TaskId) -> Result<PollStart, GenerationError> {
        let mut book = lock(&self.book);
        // Tasks submitted elsewhere (e.g. a previous process) are adopted.
        let task = book
            .tasks
            .entry(task_id.clone())
            .or_insert_with(|| GenerationTask::new(task_id.clone(), GenerationKind::General, &GenerationRequest::default()));

        if let Some(outcome) = task.terminal_outcome() {
            debug!(%task_id, status = ?task.status, "task already finished");
            return Ok(PollStart::Finished(outcome));
        }
        if task.polling {
            return Err(GenerationError::AlreadyPolling { task_id: task_id.clone() });
        }
        task.polling = true;
        task.transition(TaskStatus::Pending);
        Ok(PollStart::Poll(PollGuard { book: Arc::clone(&self.book), task_id: task_id.clone() }))
    }

    async fn poll_loop(&self, task_id: &TaskId, cancel: &CancellationToken) -> Result<String, GenerationError> {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled { task_id: task_id.clone() });
            }

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GenerationError::Cancelled { task_id: task_id.clone() }),
                response = self.poll_with_retry(task_id, attempt) => response?,
            };
            if let Some(task) = lock(&self.book).tasks.get_mut(task_id) {
                task.attempts = attempt;
            }

            match response.status {
                PollStatus::Completed => {
                    return match response.response_text() {
                        Some(text) => Ok(text.to_string()),
                        None => Err(GenerationError::Failed {
                            task_id: task_id.clone(),
                            reason: "completed without output".into(),
                        }),
                    };
                }
                PollStatus::Failed => {
                    return Err(GenerationError::Failed {
                        task_id: task_id.clone(),
                        reason: response.error.unwrap_or_else(|| "generation failed".into()),
                    });
                }
                PollStatus::Pending | PollStatus::Unknown => {
                    debug!(%task_id, attempt, max_attempts, status = ?response.status, "task still pending");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(GenerationError::Cancelled { task_id: task_id.clone() }),
                    () = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        Err(GenerationError::Timeout { task_id: task_id.clone(), attempts: max_attempts })
    }

    async fn poll_with_retry(&self, task_id: &TaskId, attempt: u32) -> Result<PollResponse, GenerationError> {
        let mut retry = 0_u32;
        loop {
            match self.backend.poll(task_id).await {
                Err(e) if e.retryable() && retry < self.policy.transport_retries => {
                    retry += 1;
                    warn!(
                        error = %e,
                        %task_id,
                        attempt,
                        retry,
                        total = self.policy.transport_retries,
                        "poll failed; retrying"
                    );
                    tokio::time::sleep(self.policy.retry_base * retry).await;
                }
                other => return other,
            }
        }
    }

    fn record_outcome(&self, task_id: &TaskId, outcome: &Result<String, GenerationError>) {
        let mut book = lock(&self.book);
        let Some(task) = book.tasks.get_mut(task_id) else {
            return;
        };
        let finished = match outcome {
            Ok(text) => {
                task.result = Some(text.clone());
                info!(%task_id, attempts = task.attempts, "generation completed");
                task.transition(TaskStatus::Completed)
            }
            Err(GenerationError::Cancelled { .. }) => {
                info!(%task_id, attempts = task.attempts, "generation polling cancelled");
                false
            }
            Err(e) => {
                task.failure = Some(e.clone());
                warn!(%task_id, error = %e, code = e.error_code(), attempts = task.attempts, "generation failed");
                task.transition(TaskStatus::Failed)
            }
        };
        if finished {
            book.mark_finished(task_id);
        }
    }
}

fn into_submission_error(err: GenerationError) -> GenerationError {
    match err {
        GenerationError::Submission { .. } => err,
        other => GenerationError::Submission { reason: other.to_string() },
    }
}

fn lock(book: &Mutex<TaskBook>) -> MutexGuard<'_, TaskBook> {
    book.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
