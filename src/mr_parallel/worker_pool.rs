use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use async_channel::{Receiver, Sender};
use futures_lite::future;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::common::{Input, Task};
use crate::counters::{Counter, CounterSnapshot, RunCounters};
use crate::map_reduce::{
    combine, finalize_keyed, map_line, merge_into, AggregationKey, MapReduceApp, ResultRow,
};
use crate::partial::PartialValue;

/// What a worker sends back for one task.
pub enum TaskOutput {
    Mapped {
        task_id: usize,
        pairs: Vec<(String, String)>,
        counters: CounterSnapshot,
    },
    Reduced {
        partition: usize,
        groups: Vec<(AggregationKey, Vec<ResultRow>)>,
        counters: CounterSnapshot,
    },
    Failed {
        task_id: usize,
        reason: String,
    },
}

pub struct WorkerPool {
    pub workers: Vec<Worker>,
    sender: Sender<Job>,
    queue: Receiver<Job>,
    results: Sender<TaskOutput>,
    app: Arc<dyn MapReduceApp>,
    input: Input,
}

type Job = Box<dyn FnOnce(&str) + Send + 'static>;

impl WorkerPool {
    pub fn new(
        size: usize,
        app: Arc<dyn MapReduceApp>,
        input: Input,
        results: Sender<TaskOutput>,
    ) -> WorkerPool {
        assert!(size > 0);

        let (sender, receiver) = async_channel::bounded(size);
        let mut workers = Vec::with_capacity(size);

        for _ in 0..size {
            workers.push(Worker::new(receiver.clone()));
        }

        WorkerPool {
            workers,
            sender,
            queue: receiver,
            results,
            app,
            input,
        }
    }

    async fn execute<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let job = Box::new(f);
        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("worker pool is closed"))
    }

    pub async fn run_task(&self, task: Task) -> anyhow::Result<()> {
        let app = Arc::clone(&self.app);
        let input = self.input.clone();
        let results = self.results.clone();
        self.execute(move |worker_id| {
            let task_id = match &task {
                Task::Map(id, _, _) => *id,
                Task::Reduce(partition, _) => *partition,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match task {
                Task::Map(task_id, start, end) => {
                    debug!("worker {worker_id} mapping lines {start}..{end}");
                    let counters = RunCounters::new();
                    let pairs = input.lines[start..end]
                        .iter()
                        .flat_map(|line| map_line(&input.normalizer, app.as_ref(), line, &counters))
                        .collect::<Vec<_>>();
                    let groups = combine(pairs, &counters);
                    let pairs = groups
                        .into_iter()
                        .map(|(key, value)| (key, value.encode()))
                        .collect();
                    TaskOutput::Mapped {
                        task_id,
                        pairs,
                        counters: counters.snapshot(),
                    }
                }
                Task::Reduce(partition, pairs) => {
                    debug!("worker {worker_id} reducing partition {partition} ({} pairs)", pairs.len());
                    let counters = RunCounters::new();
                    let shape = app.shape();
                    let mut groups = std::collections::HashMap::new();
                    for (key, encoded) in pairs {
                        match PartialValue::decode(shape, &encoded) {
                            Ok(value) => merge_into(&mut groups, key, value, &counters),
                            Err(e) => {
                                counters.incr(Counter::MalformedPartials);
                                warn!("dropping partial value for key `{key}`: {e}");
                            }
                        }
                    }
                    TaskOutput::Reduced {
                        partition,
                        groups: finalize_keyed(app.as_ref(), groups),
                        counters: counters.snapshot(),
                    }
                }
            }));
            let output = outcome.unwrap_or_else(|cause| {
                let reason = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                error!("worker {worker_id} failed task {task_id}: {reason}");
                TaskOutput::Failed { task_id, reason }
            });
            if results.send_blocking(output).is_err() {
                error!("worker {worker_id} could not report task {task_id}: coordinator is gone");
            }
        })
        .await
    }

    /// Stops accepting jobs, discards queued ones and waits for every worker
    /// to finish its current job. Blocks.
    pub fn shutdown(self) {
        self.sender.close();
        let mut dropped = 0;
        while self.queue.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("discarded {dropped} queued tasks on shutdown");
        }
        for worker in self.workers {
            if let Some(thread) = worker.thread {
                if thread.join().is_err() {
                    error!("worker {} exited abnormally", worker.id);
                }
            }
        }
    }
}

pub struct Worker {
    pub id: String,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(receiver: Receiver<Job>) -> Worker {
        let id = Uuid::new_v4().to_string();
        let id_clone = id.clone();
        let thread = thread::spawn(move || loop {
            match future::block_on(receiver.recv()) {
                Ok(job) => {
                    job(&id_clone);
                }
                Err(_) => {
                    debug!("worker {id_clone} stopping: job queue closed");
                    break;
                }
            };
        });

        Worker {
            id,
            thread: Some(thread),
        }
    }
}
