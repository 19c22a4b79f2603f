//! Grant Worker CLI
//!
//! Runs the background worker that processes the grant application's task
//! queue, plus a few commands for inspecting and feeding the queue.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use grant_worker::ai::OptionalLanguageModel;
use grant_worker::db::{create_pool, ConnectionSettings, DbPool, PgProjectRepository};
use grant_worker::office::BuiltinParser;
use grant_worker::storage::storage_from_env;
use grant_worker::worker::recover_stale_tasks;
use grant_worker::{
    setup_signal_handler, Dispatcher, HandlerContext, NewTask, PgTaskStore, TaskRunner, TaskStore,
    TaskType, WorkerConfig, WorkerId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "grant-worker")]
#[command(about = "Background worker for grant application AI tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as worker, polling task_queue for pending tasks
    Worker {
        /// Poll interval in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        poll_interval: u64,

        /// Seconds after which a processing task counts as orphaned (default: 120)
        #[arg(long, default_value = "120")]
        stale_after: u64,

        /// Fail tasks that run longer than this many seconds
        #[arg(short, long)]
        task_timeout: Option<u64>,

        /// Process at most one task and exit (for testing)
        #[arg(long)]
        once: bool,
    },

    /// Requeue orphaned processing tasks and exit
    Recover {
        /// Seconds after which a processing task counts as orphaned (default: 120)
        #[arg(long, default_value = "120")]
        stale_after: u64,
    },

    /// Enqueue a new task
    Submit {
        /// Task type, e.g. evaluation or requirement_extraction
        #[arg(long)]
        task_type: String,

        /// Project the task works on
        #[arg(long)]
        project_id: Option<Uuid>,

        /// User that requested the task
        #[arg(long)]
        user_id: Option<Uuid>,

        /// Task data as JSON
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Show a task
    Status {
        task_id: Uuid,
    },

    /// Cancel a pending task
    Cancel {
        task_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging; RUST_LOG overrides the level
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Worker {
            poll_interval,
            stale_after,
            task_timeout,
            once,
        } => {
            let worker_id = WorkerId::generate();
            info!("[{}] Initializing worker...", worker_id);

            let pool = connect().await?;
            info!("[{}] Database connection established", worker_id);

            let store = PgTaskStore::new(pool.clone());
            match store.count_pending().await {
                Ok(pending) => info!("[{}] {} pending task(s) in queue", worker_id, pending),
                Err(e) => warn!("[{}] Could not count pending tasks: {}", worker_id, e),
            }
            let store: Arc<dyn TaskStore> = Arc::new(store);

            let model = OptionalLanguageModel::from_env();
            if !model.is_enabled() {
                warn!("LLM_API_KEY not set - AI steps will be skipped or fail");
            }

            let handlers = Arc::new(HandlerContext::new(
                Arc::new(PgProjectRepository::new(pool)),
                storage_from_env()?,
                Arc::new(model),
                Arc::new(BuiltinParser),
            ));

            let config = WorkerConfig::builder()
                .poll_interval_secs(poll_interval)
                .stale_after_secs(stale_after)
                .task_timeout(task_timeout.map(Duration::from_secs))
                .build();

            let dispatcher =
                Dispatcher::new(Arc::clone(&store), handlers).with_task_timeout(config.task_timeout);
            let runner = TaskRunner::new(store, dispatcher, config, worker_id);

            if once {
                if runner.run_once().await {
                    println!("Task processed");
                } else {
                    println!("No pending tasks found");
                }
            } else {
                setup_signal_handler(runner.shutdown_handle());
                runner.run().await?;
            }
        }

        Commands::Recover { stale_after } => {
            let store = PgTaskStore::new(connect().await?);
            let requeued = recover_stale_tasks(&store, Duration::from_secs(stale_after)).await;
            println!("Requeued {} stale task(s)", requeued);
        }

        Commands::Submit {
            task_type,
            project_id,
            user_id,
            data,
        } => {
            if task_type.parse::<TaskType>().is_err() {
                warn!("{} is not a known task type; the worker will fail it", task_type);
            }
            let task_data = serde_json::from_str(&data)?;

            let mut new_task = NewTask::new(task_type, task_data);
            new_task.project_id = project_id;
            new_task.user_id = user_id;

            let store = PgTaskStore::new(connect().await?);
            let task = store.create_task(&new_task).await?;
            println!("Created task {} ({})", task.id, task.task_type);
        }

        Commands::Status { task_id } => {
            let store = PgTaskStore::new(connect().await?);
            let Some(task) = store.get_task(task_id).await? else {
                bail!("Task {} not found", task_id);
            };

            println!("Task:     {}", task.id);
            println!("Type:     {}", task.task_type);
            println!("Status:   {}", task.status);
            println!(
                "Progress: {}% {}",
                task.progress,
                task.progress_message.as_deref().unwrap_or("")
            );
            if let Some(worker) = &task.worker_id {
                println!("Worker:   {}", worker);
            }
            if let Some(error) = &task.error_message {
                println!("Error:    {}", error);
            }
            if let Some(result) = &task.result_data {
                println!("Result:   {}", serde_json::to_string_pretty(result)?);
            }
        }

        Commands::Cancel { task_id } => {
            let store = PgTaskStore::new(connect().await?);
            if store.cancel_task(task_id).await? {
                println!("Cancelled task {}", task_id);
            } else {
                println!("Task {} is not pending; left unchanged", task_id);
            }
        }
    }

    Ok(())
}

/// Connect using DATABASE_URL and DATABASE_PASSWORD
async fn connect() -> Result<DbPool> {
    let settings = ConnectionSettings::from_env()?;
    Ok(create_pool(&settings).await?)
}
