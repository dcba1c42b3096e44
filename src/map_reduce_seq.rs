use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::common::{Input, MapReduce, RunReport};
use crate::counters::RunCounters;
use crate::map_reduce::{finalize_groups, map_line, merge_into, MapReduceApp, Output};
use crate::partial::PartialValue;

/// Single-threaded reference runner: no pre-combining, one linear fold
/// per key.
pub struct SequentialMapReduce {
    input: Input,
    mr_app: Arc<dyn MapReduceApp>,
}

impl SequentialMapReduce {
    pub fn run_sync(&self, counters: &RunCounters) -> Output {
        let intermediate_key_values =
            self.input
                .lines
                .iter()
                .fold(Vec::new(), |mut acc, line| {
                    let key_values =
                        map_line(&self.input.normalizer, self.mr_app.as_ref(), line, counters);
                    acc.extend(key_values);
                    acc
                });

        let grouped_key_values: HashMap<String, Vec<PartialValue>> = intermediate_key_values
            .into_iter()
            .fold(HashMap::new(), |mut acc, (key, value)| {
                acc.entry(key).or_default().push(value);
                acc
            });

        let mut merged = HashMap::with_capacity(grouped_key_values.len());
        for (key, values) in grouped_key_values {
            for value in values {
                merge_into(&mut merged, key.clone(), value, counters);
            }
        }

        finalize_groups(self.mr_app.as_ref(), merged)
    }
}

#[async_trait]
impl MapReduce for SequentialMapReduce {
    fn new(input: Input, mr_app: Arc<dyn MapReduceApp>) -> Self {
        Self { input, mr_app }
    }

    async fn run(self) -> anyhow::Result<RunReport> {
        let variant = self.mr_app.name().to_string();
        info!("running `{variant}` sequentially over {} lines", self.input.lines.len());
        let report = tokio::task::spawn_blocking(move || {
            let counters = RunCounters::new();
            let output = self.run_sync(&counters);
            RunReport {
                variant,
                output,
                counters: counters.snapshot(),
            }
        })
        .await?;
        Ok(report)
    }
}
