//! Grant Worker - background task processing for the grant-application assistant
//!
//! The worker polls a shared `task_queue` table, atomically claims one pending
//! task at a time, runs the matching handler and writes a terminal status back.
//!
//! Handlers call out to four collaborators, each behind a trait so the worker
//! can be exercised without a database or network:
//! - [`repository::ProjectRepository`] - project, grant, document and infobit data
//! - [`storage::BlobStorage`] - uploaded and generated files
//! - [`ai::LanguageModel`] - text and structured generation
//! - [`office::DocumentParser`] - text extraction from uploaded files
//!
//! Crash recovery is a startup sweep: tasks left in `processing` longer than
//! the stale threshold are requeued before the poll loop starts.

pub mod ai;
pub mod db;
pub mod error;
pub mod handlers;
pub mod office;
pub mod queue;
pub mod repository;
pub mod storage;
pub mod task;
pub mod worker;

pub use error::{Result, WorkerError};
pub use handlers::HandlerContext;
pub use queue::{InMemoryTaskStore, PgTaskStore, TaskStore};
pub use task::{Language, NewTask, ProgressReporter, Task, TaskPayload, TaskResult, TaskStatus, TaskType, WorkerId};
pub use worker::{setup_signal_handler, Dispatcher, Outcome, TaskRunner, WorkerConfig};
