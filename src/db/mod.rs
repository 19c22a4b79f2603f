//! Database module for grant-worker
//!
//! Provides PostgreSQL operations for the task queue and the project data the
//! handlers read and write.

pub mod connection;
pub mod documents;
pub mod grants;
pub mod infobits;
pub mod models;
pub mod projects;
pub mod repository;
pub mod sections;
pub mod task_queue;

pub use connection::{create_pool, create_pool_from_env, ConnectionSettings, DbPool};
pub use models::*;
pub use repository::PgProjectRepository;
