//! Task graph and runner.
//!
//! Tasks declare upstream dependencies by name; the runner orders them
//! topologically (registration order breaks ties, so runs are
//! reproducible) and executes sequentially, stopping at the first
//! failure. There is no retry and no partial-success reporting: a
//! failed task fails the run.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::WarehouseConfig;
use crate::error::{WarehouseError, WarehouseResult};
use crate::rng::RngBank;
use crate::store::WarehouseStore;
use crate::types::RunId;

/// Everything a task may touch. Tasks communicate only through the
/// store and the artifact files, never through in-memory side channels.
pub struct PipelineContext {
    pub store: WarehouseStore,
    pub config: WarehouseConfig,
    pub rng_bank: RngBank,
    pub run_id: RunId,
    /// Directory for the CSV hand-off between generate and load.
    pub artifacts_dir: PathBuf,
    /// Path of the persisted model artifact.
    pub model_path: PathBuf,
    /// Reference date stamped on alerts, scores, and forecasts.
    pub as_of: NaiveDate,
}

pub trait PipelineTask {
    fn name(&self) -> &'static str;

    /// Names of tasks that must complete before this one.
    fn upstream(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()>;
}

#[derive(Default)]
pub struct Pipeline {
    tasks: Vec<Box<dyn PipelineTask>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Box<dyn PipelineTask>) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Topological execution order via Kahn's algorithm. Among ready
    /// tasks, registration order wins.
    pub fn execution_order(&self) -> WarehouseResult<Vec<&'static str>> {
        let names: Vec<&'static str> = self.tasks.iter().map(|t| t.name()).collect();
        let known: HashSet<&str> = names.iter().copied().collect();

        let mut indegree: HashMap<&str, usize> = names.iter().map(|n| (*n, 0)).collect();
        let mut downstream: HashMap<&str, Vec<&'static str>> = HashMap::new();
        for task in &self.tasks {
            for dep in task.upstream() {
                if !known.contains(dep) {
                    return Err(WarehouseError::UnknownDependency {
                        task: task.name().to_string(),
                        dependency: dep.to_string(),
                    });
                }
                *indegree.entry(task.name()).or_default() += 1;
                downstream.entry(dep).or_default().push(task.name());
            }
        }

        let mut order = Vec::with_capacity(names.len());
        let mut done: HashSet<&str> = HashSet::new();
        while order.len() < names.len() {
            let next = names.iter().find(|n| !done.contains(**n) && indegree[**n] == 0);
            let name = match next {
                Some(n) => *n,
                None => {
                    let stuck = names
                        .iter()
                        .find(|n| !done.contains(**n))
                        .copied()
                        .unwrap_or("unknown");
                    return Err(WarehouseError::DependencyCycle {
                        task: stuck.to_string(),
                    });
                }
            };
            done.insert(name);
            order.push(name);
            if let Some(children) = downstream.get(name) {
                for child in children {
                    if let Some(d) = indegree.get_mut(child) {
                        *d -= 1;
                    }
                }
            }
        }
        Ok(order)
    }

    /// Run every task in dependency order, failing fast.
    pub fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        let order = self.execution_order()?;
        log::info!("task order: {}", order.join(" -> "));
        for name in order {
            let task = self
                .tasks
                .iter_mut()
                .find(|t| t.name() == name)
                .ok_or_else(|| WarehouseError::TaskFailed {
                    task: name.to_string(),
                    reason: "task vanished between ordering and execution".to_string(),
                })?;
            log::info!("running task '{name}'");
            task.run(ctx).map_err(|e| {
                log::error!("task '{name}' failed: {e}");
                WarehouseError::TaskFailed {
                    task: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}
