use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Categories tracked for every run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    LinesRead,
    FramingSkips,
    ParseErrors,
    Records,
    Excluded,
    Emitted,
    MalformedPartials,
}

impl Counter {
    pub const ALL: [Counter; 7] = [
        Counter::LinesRead,
        Counter::FramingSkips,
        Counter::ParseErrors,
        Counter::Records,
        Counter::Excluded,
        Counter::Emitted,
        Counter::MalformedPartials,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-run counter set shared by all workers of a run.
///
/// A fresh set starts at zero; nothing carries over between runs.
#[derive(Debug, Default)]
pub struct RunCounters {
    values: [AtomicU64; 7],
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.values[counter.index()].fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    /// Adds the counts of a finished work unit.
    pub fn absorb(&self, snapshot: &CounterSnapshot) {
        for (&counter, &n) in &snapshot.0 {
            self.add(counter, n);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot(Counter::ALL.iter().map(|&c| (c, self.get(c))).collect())
    }
}

/// Counter values read at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot(BTreeMap<Counter, u64>);

impl CounterSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        self.0.get(&counter).copied().unwrap_or(0)
    }
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}
