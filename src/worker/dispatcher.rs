//! Dispatch boundary around a single task

use crate::error::{Result, WorkerError};
use crate::handlers::{self, HandlerContext, JobContext};
use crate::queue::TaskStore;
use crate::task::{ProgressReporter, Task, TaskPayload};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// How a dispatched task ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Handler returned; the encoded result
    Success(Value),
    /// Handler failed, panicked, timed out, or the task could not be decoded
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Runs claimed tasks and writes exactly one terminal status for each
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    handlers: Arc<HandlerContext>,
    task_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn TaskStore>, handlers: Arc<HandlerContext>) -> Self {
        Self {
            store,
            handlers,
            task_timeout: None,
        }
    }

    /// Fail tasks whose handler runs longer than `timeout`
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Run `task` and record its outcome
    ///
    /// The error case only covers writing the terminal status; handler
    /// failures are part of the returned [`Outcome`].
    pub async fn dispatch(&self, task: &Task) -> Result<Outcome> {
        let outcome = self.execute(task).await;

        match &outcome {
            Outcome::Success(result) => {
                self.store.complete_task(task.id, result.clone()).await?;
            }
            Outcome::Failure(message) => {
                self.store.fail_task(task.id, message).await?;
            }
        }

        Ok(outcome)
    }

    /// Run the handler for `task` without touching its status
    pub async fn execute(&self, task: &Task) -> Outcome {
        let payload = match TaskPayload::decode(&task.task_type, task.task_data.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Task {} rejected: {}", task.id, e);
                return Outcome::Failure(e.to_string());
            }
        };
        debug!("Dispatching task {} as {:?}", task.id, payload.task_type());

        let progress = ProgressReporter::new(Arc::clone(&self.store), task.id);
        let job = JobContext::from_task(task);
        let run = AssertUnwindSafe(handlers::handle(&self.handlers, payload, &job, &progress))
            .catch_unwind();

        let finished = match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(finished) => finished,
                Err(_) => return Outcome::Failure(WorkerError::TaskTimeout(limit).to_string()),
            },
            None => run.await,
        };

        match finished {
            Ok(Ok(result)) => match result.to_value() {
                Ok(value) => Outcome::Success(value),
                Err(e) => Outcome::Failure(e.to_string()),
            },
            Ok(Err(e)) => Outcome::Failure(e.to_string()),
            Err(panic) => Outcome::Failure(format!(
                "Handler panicked: {}",
                panic_message(panic.as_ref())
            )),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
