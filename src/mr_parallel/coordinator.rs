use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use tracing::{debug, info, warn};

use crate::common::{Input, Task};
use crate::counters::RunCounters;
use crate::map_reduce::{flatten_sorted, MapReduceApp, Output};

use super::worker_pool::{TaskOutput, WorkerPool};

/// A map task is retried this many times before the run fails.
pub const MAX_MAP_ATTEMPTS: usize = 3;

pub struct Coordinator {
    pub workers_count: usize,
    pub chunk_lines: usize,
}

impl Coordinator {
    pub async fn start_pool(
        &self,
        input: Input,
        mr_app: Arc<dyn MapReduceApp>,
        counters: &RunCounters,
    ) -> anyhow::Result<Output> {
        let workers_count = self.workers_count.max(1);
        let chunk_lines = self.chunk_lines.max(1);
        let (results_tx, results_rx) = async_channel::unbounded();
        let pool = WorkerPool::new(workers_count, Arc::clone(&mr_app), input.clone(), results_tx);

        let total = input.lines.len();
        let mut pending: HashMap<usize, (usize, usize, usize)> = HashMap::new();
        for (task_id, start) in (0..total).step_by(chunk_lines).enumerate() {
            let end = (start + chunk_lines).min(total);
            pending.insert(task_id, (start, end, 1));
        }
        info!(
            "`{}`: {} map tasks over {} lines on {} workers",
            mr_app.name(),
            pending.len(),
            total,
            workers_count
        );

        let mut partitions: Vec<Vec<(String, String)>> = vec![Vec::new(); workers_count];
        let result = async {
            let mut tasks: Vec<_> = pending.iter().map(|(&id, &(s, e, _))| (id, s, e)).collect();
            tasks.sort_unstable();
            for (task_id, start, end) in tasks {
                pool.run_task(Task::Map(task_id, start, end)).await?;
            }

            while !pending.is_empty() {
                match results_rx.recv().await? {
                    TaskOutput::Mapped {
                        task_id,
                        pairs,
                        counters: task_counters,
                    } => {
                        if pending.remove(&task_id).is_none() {
                            continue;
                        }
                        counters.absorb(&task_counters);
                        for (key, value) in pairs {
                            let partition = partition_of(&key, workers_count);
                            partitions[partition].push((key, value));
                        }
                    }
                    TaskOutput::Failed { task_id, reason } => {
                        let Some(entry) = pending.get_mut(&task_id) else {
                            continue;
                        };
                        if entry.2 >= MAX_MAP_ATTEMPTS {
                            bail!("map task {task_id} failed {} times: {reason}", entry.2);
                        }
                        entry.2 += 1;
                        warn!("retrying map task {task_id} (attempt {})", entry.2);
                        let (start, end) = (entry.0, entry.1);
                        pool.run_task(Task::Map(task_id, start, end)).await?;
                    }
                    TaskOutput::Reduced { .. } => bail!("reduce output during map phase"),
                }
            }

            let mut outstanding = 0;
            for (partition, pairs) in partitions.into_iter().enumerate() {
                if pairs.is_empty() {
                    continue;
                }
                pool.run_task(Task::Reduce(partition, pairs)).await?;
                outstanding += 1;
            }

            let mut keyed = Vec::new();
            while outstanding > 0 {
                match results_rx.recv().await? {
                    TaskOutput::Reduced {
                        partition,
                        groups,
                        counters: task_counters,
                    } => {
                        debug!("partition {partition} finalized {} groups", groups.len());
                        counters.absorb(&task_counters);
                        keyed.extend(groups);
                        outstanding -= 1;
                    }
                    TaskOutput::Failed { task_id, reason } => {
                        return Err(anyhow!("reduce partition {task_id} failed: {reason}"));
                    }
                    // a late duplicate of a retried map task
                    TaskOutput::Mapped { .. } => {}
                }
            }
            Ok::<Output, anyhow::Error>(flatten_sorted(keyed))
        }
        .await;

        tokio::task::spawn_blocking(move || pool.shutdown()).await?;
        result
    }
}

fn partition_of(key: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % partitions
}
