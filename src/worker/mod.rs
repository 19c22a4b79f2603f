//! Worker module for claiming and running queued tasks
//!
//! This module provides:
//! - TaskRunner: main loop that polls the task store and runs claimed tasks
//! - Dispatcher: error boundary around a single task's handler
//! - recovery: startup sweep that requeues orphaned tasks
//! - WorkerConfig: configuration for the worker

pub mod config;
pub mod dispatcher;
pub mod recovery;
pub mod task_runner;

pub use config::WorkerConfig;
pub use dispatcher::{Dispatcher, Outcome};
pub use recovery::{recover_stale_tasks, recover_stale_tasks_before};
pub use task_runner::{setup_signal_handler, TaskRunner};
