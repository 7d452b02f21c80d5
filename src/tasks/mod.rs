//! Background tasks
//!
//! Tasks are named async jobs taking and returning JSON. The registry runs
//! them on demand (`dispatch`) and the [`Scheduler`] runs them on a
//! [`Schedule`].

pub mod schedule;

pub use schedule::{Job, Schedule, Scheduler, default_jobs};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, args: Value) -> Result<Value>;
}

/// Named tasks available to the application
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<&'static str, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tasks
    pub fn with_builtin() -> Self {
        Self::new().register(AddTogether)
    }

    /// Add a task; a task with the same name is replaced
    pub fn register(mut self, task: impl Task + 'static) -> Self {
        self.tasks.insert(task.name(), Arc::new(task));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.keys().copied()
    }

    /// Run a task to completion
    pub async fn run(&self, name: &str, args: Value) -> Result<Value> {
        let task = self.get(name).ok_or_else(|| anyhow!("Unknown task: {}", name))?;
        task.run(args).await
    }

    /// Run a task in the background
    pub fn dispatch(&self, name: &str, args: Value) -> Result<JoinHandle<Result<Value>>> {
        let Some(task) = self.get(name) else {
            bail!("Unknown task: {}", name);
        };
        tracing::debug!(task = name, "dispatching task");
        Ok(tokio::spawn(async move { task.run(args).await }))
    }
}

/// Adds two numbers: `[a, b]` or `{"a": .., "b": ..}`
pub struct AddTogether;

#[async_trait]
impl Task for AddTogether {
    fn name(&self) -> &'static str {
        "add_together"
    }

    async fn run(&self, args: Value) -> Result<Value> {
        let (a, b) = match &args {
            Value::Array(items) if items.len() == 2 => (&items[0], &items[1]),
            Value::Object(map) => match (map.get("a"), map.get("b")) {
                (Some(a), Some(b)) => (a, b),
                _ => bail!("add_together expects keys 'a' and 'b'"),
            },
            _ => bail!("add_together expects [a, b], got {}", args),
        };

        if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
            let sum = a
                .checked_add(b)
                .ok_or_else(|| anyhow!("add_together overflowed"))?;
            return Ok(Value::from(sum));
        }
        match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => Ok(serde_json::json!(a + b)),
            _ => bail!("add_together expects two numbers"),
        }
    }
}
