mod coordinator;
mod worker_pool;

use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use tracing::info;

use crate::common::{Input, MapReduce, RunReport};
use crate::counters::RunCounters;
use crate::map_reduce::MapReduceApp;
use coordinator::Coordinator;

pub use coordinator::MAX_MAP_ATTEMPTS;

/// Lines handed to one map task unless overridden.
pub const DEFAULT_CHUNK_LINES: usize = 10_000;

/// Worker-pool runner: chunked map tasks with local pre-combining, a hash
/// shuffle of encoded partial values, and one reduce task per partition.
pub struct ParallelMapReduce {
    input: Input,
    mr_app: Arc<dyn MapReduceApp>,
    workers_count: usize,
    chunk_lines: usize,
}

impl ParallelMapReduce {
    pub fn with_workers(mut self, workers_count: usize) -> Self {
        self.workers_count = workers_count.max(1);
        self
    }

    pub fn with_chunk_lines(mut self, chunk_lines: usize) -> Self {
        self.chunk_lines = chunk_lines.max(1);
        self
    }
}

pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

#[async_trait]
impl MapReduce for ParallelMapReduce {
    fn new(input: Input, mr_app: Arc<dyn MapReduceApp>) -> Self {
        Self {
            input,
            mr_app,
            workers_count: default_workers(),
            chunk_lines: DEFAULT_CHUNK_LINES,
        }
    }

    async fn run(self) -> anyhow::Result<RunReport> {
        let variant = self.mr_app.name().to_string();
        info!("running `{variant}` on {} workers", self.workers_count);
        let coord = Coordinator {
            workers_count: self.workers_count,
            chunk_lines: self.chunk_lines,
        };
        let counters = RunCounters::new();
        let output = coord.start_pool(self.input, self.mr_app, &counters).await?;

        Ok(RunReport {
            variant,
            output,
            counters: counters.snapshot(),
        })
    }
}
