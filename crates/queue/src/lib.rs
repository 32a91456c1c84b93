//! Daily background jobs for habitgrid.
//!
//! - **Scheduler**: one task per job, sleeping until its configured `HH:MM` (UTC)
//! - **Executor**: binds the jobs to the core services
//!
//! Every run is claimed through the cron log first, so with several replicas
//! each job still runs once per day.

pub mod executor;
pub mod scheduler;

pub use executor::ServiceExecutor;
pub use scheduler::{DailyJob, JobExecutor, SchedulerConfig, delay_until, run_once, spawn_scheduler};
