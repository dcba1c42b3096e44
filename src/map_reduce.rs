//! The generic aggregation engine.
//!
//! An application supplies the map step (`Record -> [(key, partial)]`) and
//! the finalize step (`(key, merged partial) -> rows`). Merging is owned by
//! [`PartialValue::merge`], so every runner combines contributions the same
//! way regardless of how they were partitioned.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::counters::{Counter, RunCounters};
use crate::partial::{PartialValue, Shape};
use crate::record::{LineError, Record, RecordNormalizer};

/// Grouping dimension: a city, skill, education level, label, ...
pub type AggregationKey = String;

/// Finalized rows of one run, sorted by key.
pub type Output = Vec<ResultRow>;

pub trait MapReduceApp: Send + Sync {
    fn name(&self) -> &str;
    fn shape(&self) -> Shape;
    /// Zero pairs means the record is excluded from this application.
    fn map(&self, record: &Record) -> Vec<(AggregationKey, PartialValue)>;
    fn reduce(&self, key: &str, value: PartialValue) -> Vec<ResultRow>;
}

/// A single output metric.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Metric {
    Int(i64),
    /// A percentage, printed with two decimals.
    Ratio(f64),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Int(v) => write!(f, "{}", v),
            Metric::Ratio(v) => write!(f, "{:.2}", v),
        }
    }
}

impl From<i64> for Metric {
    fn from(v: i64) -> Self {
        Metric::Int(v)
    }
}

impl From<u64> for Metric {
    fn from(v: u64) -> Self {
        Metric::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

/// One output line: a key followed by its metric columns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    pub key: AggregationKey,
    pub metrics: Vec<Metric>,
}

impl ResultRow {
    pub fn new(key: impl Into<String>, metrics: Vec<Metric>) -> Self {
        Self {
            key: key.into(),
            metrics,
        }
    }

    /// The first integer column, handed to the result store.
    pub fn primary_metric(&self) -> Option<i64> {
        self.metrics.iter().find_map(|m| match m {
            Metric::Int(v) => Some(*v),
            Metric::Ratio(_) => None,
        })
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for metric in &self.metrics {
            write!(f, "\t{}", metric)?;
        }
        Ok(())
    }
}

/// Runs one raw line through framing, normalization and the map step.
///
/// Never fails: skipped and unparseable lines yield no pairs and are
/// only visible through `counters`.
pub fn map_line(
    normalizer: &RecordNormalizer,
    app: &dyn MapReduceApp,
    line: &[u8],
    counters: &RunCounters,
) -> Vec<(AggregationKey, PartialValue)> {
    counters.incr(Counter::LinesRead);
    let Ok(text) = std::str::from_utf8(line) else {
        counters.incr(Counter::ParseErrors);
        warn!("dropping line that is not valid utf-8");
        return Vec::new();
    };
    let record = match normalizer.read_line(text) {
        Ok(Some(record)) => record,
        Ok(None) => {
            counters.incr(Counter::FramingSkips);
            return Vec::new();
        }
        Err(LineError::NotAnObject) => {
            counters.incr(Counter::ParseErrors);
            warn!("dropping line that is not a json object");
            return Vec::new();
        }
    };
    counters.incr(Counter::Records);
    let pairs = app.map(&record);
    if pairs.is_empty() {
        counters.incr(Counter::Excluded);
    } else {
        counters.add(Counter::Emitted, pairs.len() as u64);
    }
    pairs
}

/// Merges `value` into the group for `key`.
///
/// A value whose shape does not match the group is dropped and counted;
/// the group keeps what it had.
pub fn merge_into(
    groups: &mut HashMap<AggregationKey, PartialValue>,
    key: AggregationKey,
    value: PartialValue,
    counters: &RunCounters,
) {
    match groups.get_mut(&key) {
        Some(current) => match current.merge(value) {
            Ok(merged) => *current = merged,
            Err(e) => {
                counters.incr(Counter::MalformedPartials);
                warn!("dropping partial value for key `{key}`: {e}");
            }
        },
        None => {
            groups.insert(key, value);
        }
    }
}

/// Local pre-reduction of one batch of map output.
pub fn combine(
    pairs: impl IntoIterator<Item = (AggregationKey, PartialValue)>,
    counters: &RunCounters,
) -> HashMap<AggregationKey, PartialValue> {
    let mut groups = HashMap::new();
    for (key, value) in pairs {
        merge_into(&mut groups, key, value, counters);
    }
    groups
}

/// Finalizes every group, keeping each group's rows under its key.
pub fn finalize_keyed(
    app: &dyn MapReduceApp,
    groups: HashMap<AggregationKey, PartialValue>,
) -> Vec<(AggregationKey, Vec<ResultRow>)> {
    groups
        .into_iter()
        .map(|(key, value)| {
            let rows = app.reduce(&key, value);
            (key, rows)
        })
        .collect()
}

/// Orders finalized groups by key and flattens them into output rows.
pub fn flatten_sorted(mut keyed: Vec<(AggregationKey, Vec<ResultRow>)>) -> Output {
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().flat_map(|(_, rows)| rows).collect()
}

/// Finalizes every group and returns the rows sorted by group key.
pub fn finalize_groups(
    app: &dyn MapReduceApp,
    groups: HashMap<AggregationKey, PartialValue>,
) -> Output {
    flatten_sorted(finalize_keyed(app, groups))
}
