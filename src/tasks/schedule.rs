//! Periodic execution of registered tasks

use super::TaskRegistry;
use chrono::{DateTime, Days, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// When a job fires; daily times are UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily { hour: u32, minute: u32 },
    Every(Duration),
}

impl Schedule {
    /// First fire time strictly after `now`
    ///
    /// `None` for a daily time that does not exist (hour > 23 or minute > 59)
    /// or an interval chrono cannot represent.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Schedule::Daily { hour, minute } => {
                let today = now.date_naive().and_hms_opt(hour, minute, 0)?.and_utc();
                if today > now {
                    Some(today)
                } else {
                    today.checked_add_days(Days::new(1))
                }
            }
            Schedule::Every(interval) => {
                let interval = chrono::Duration::from_std(interval).ok()?;
                now.checked_add_signed(interval)
            }
        }
    }
}

/// A task bound to a schedule
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub task: String,
    pub args: Value,
    pub schedule: Schedule,
}

impl Job {
    pub fn new(name: impl Into<String>, task: impl Into<String>, args: Value, schedule: Schedule) -> Self {
        Self {
            name: name.into(),
            task: task.into(),
            args,
            schedule,
        }
    }
}

/// Jobs the application runs out of the box
pub fn default_jobs() -> Vec<Job> {
    vec![Job::new(
        "add_together_daily",
        "add_together",
        json!([1, 2]),
        Schedule::Daily { hour: 0, minute: 0 },
    )]
}

/// Runs jobs until the shutdown signal flips
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            jobs: Vec::new(),
        }
    }

    pub fn job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn jobs(mut self, jobs: impl IntoIterator<Item = Job>) -> Self {
        self.jobs.extend(jobs);
        self
    }

    /// Spawn one loop per job
    pub fn start(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.jobs
            .into_iter()
            .map(|job| {
                let registry = Arc::clone(&self.registry);
                let shutdown = shutdown.clone();
                tokio::spawn(run_job(registry, job, shutdown))
            })
            .collect()
    }
}

async fn run_job(registry: Arc<TaskRegistry>, job: Job, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(job = %job.name, task = %job.task, schedule = ?job.schedule, "job scheduled");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = Utc::now();
        let Some(next) = job.schedule.next_after(now) else {
            tracing::error!(job = %job.name, "schedule has no next fire time, job stopped");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match registry.run(&job.task, job.args.clone()).await {
            Ok(result) => tracing::info!(job = %job.name, %result, "job finished"),
            Err(e) => tracing::error!(job = %job.name, error = %e, "job failed"),
        }
    }
    tracing::info!(job = %job.name, "job stopped");
}
