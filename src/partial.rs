//! Per-key accumulators and their text encoding.
//!
//! Every shape merges associatively and commutatively, so contributions may
//! be pre-combined on a worker and combined again on the reducer in any
//! order without changing the result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobStatsError;

/// The reducer strategy a variant uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Count,
    Average,
    Range,
    Ratio,
    Totals,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Count => "count",
            Shape::Average => "average",
            Shape::Range => "range",
            Shape::Ratio => "ratio",
            Shape::Totals => "totals",
        };
        f.write_str(name)
    }
}

/// Running `(sum, count)` for averages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SumCount {
    pub sum: i64,
    pub count: u64,
}

impl SumCount {
    pub fn one(value: i64) -> Self {
        Self { sum: value, count: 1 }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            sum: self.sum.saturating_add(other.sum),
            count: self.count.saturating_add(other.count),
        }
    }

    /// Integer average, 0 for an empty accumulator.
    pub fn average(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.sum / self.count as i64
        }
    }
}

/// Running `(sum, min, max, count)` for range statistics.
///
/// The empty value holds `min = i64::MAX` and `max = i64::MIN`, which any
/// real observation replaces on merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeStats {
    pub sum: i64,
    pub min: i64,
    pub max: i64,
    pub count: u64,
}

impl Default for RangeStats {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl RangeStats {
    pub const EMPTY: RangeStats = RangeStats {
        sum: 0,
        min: i64::MAX,
        max: i64::MIN,
        count: 0,
    };

    pub fn observe(value: i64, min: i64, max: i64) -> Self {
        Self {
            sum: value,
            min,
            max,
            count: 1,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            sum: self.sum.saturating_add(other.sum),
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            count: self.count.saturating_add(other.count),
        }
    }

    pub fn average(&self) -> i64 {
        SumCount {
            sum: self.sum,
            count: self.count,
        }
        .average()
    }
}

/// `(matched, total)` pair. Never a precomputed percentage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RatioPair {
    pub matched: u64,
    pub total: u64,
}

impl RatioPair {
    pub fn one(matched: bool) -> Self {
        Self {
            matched: u64::from(matched),
            total: 1,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            matched: self.matched.saturating_add(other.matched),
            total: self.total.saturating_add(other.total),
        }
    }

    /// `matched / total * 100` rounded to two decimals; 0.00 when empty.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        // basis points, half-up
        let total = u128::from(self.total);
        let bp = (u128::from(self.matched) * 20_000 + total) / (2 * total);
        bp as f64 / 100.0
    }
}

/// Dashboard triple: postings, salary sum, postings with a salary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub jobs: u64,
    pub salary_sum: i64,
    pub salaried: u64,
}

impl Totals {
    pub fn merge(self, other: Self) -> Self {
        Self {
            jobs: self.jobs.saturating_add(other.jobs),
            salary_sum: self.salary_sum.saturating_add(other.salary_sum),
            salaried: self.salaried.saturating_add(other.salaried),
        }
    }

    pub fn average_salary(&self) -> i64 {
        SumCount {
            sum: self.salary_sum,
            count: self.salaried,
        }
        .average()
    }
}

/// One contribution (or merged group of contributions) for a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartialValue {
    Count(u64),
    Average(SumCount),
    Range(RangeStats),
    Ratio(RatioPair),
    Totals(Totals),
}

impl PartialValue {
    pub fn shape(&self) -> Shape {
        match self {
            PartialValue::Count(_) => Shape::Count,
            PartialValue::Average(_) => Shape::Average,
            PartialValue::Range(_) => Shape::Range,
            PartialValue::Ratio(_) => Shape::Ratio,
            PartialValue::Totals(_) => Shape::Totals,
        }
    }

    /// The identity element of `shape`.
    pub fn empty(shape: Shape) -> Self {
        match shape {
            Shape::Count => PartialValue::Count(0),
            Shape::Average => PartialValue::Average(SumCount::default()),
            Shape::Range => PartialValue::Range(RangeStats::EMPTY),
            Shape::Ratio => PartialValue::Ratio(RatioPair::default()),
            Shape::Totals => PartialValue::Totals(Totals::default()),
        }
    }

    /// Combines two values of the same shape.
    pub fn merge(self, other: Self) -> Result<Self, JobStatsError> {
        let merged = match (self, other) {
            (PartialValue::Count(a), PartialValue::Count(b)) => {
                PartialValue::Count(a.saturating_add(b))
            }
            (PartialValue::Average(a), PartialValue::Average(b)) => PartialValue::Average(a.merge(b)),
            (PartialValue::Range(a), PartialValue::Range(b)) => PartialValue::Range(a.merge(b)),
            (PartialValue::Ratio(a), PartialValue::Ratio(b)) => PartialValue::Ratio(a.merge(b)),
            (PartialValue::Totals(a), PartialValue::Totals(b)) => PartialValue::Totals(a.merge(b)),
            (a, b) => {
                return Err(JobStatsError::ShapeMismatch {
                    left: a.shape(),
                    right: b.shape(),
                })
            }
        };
        Ok(merged)
    }

    /// Comma-separated text form used between map and reduce.
    pub fn encode(&self) -> String {
        match self {
            PartialValue::Count(n) => n.to_string(),
            PartialValue::Average(a) => format!("{},{}", a.sum, a.count),
            PartialValue::Range(r) => format!("{},{},{},{}", r.sum, r.min, r.max, r.count),
            PartialValue::Ratio(r) => format!("{},{}", r.matched, r.total),
            PartialValue::Totals(t) => format!("{},{},{}", t.jobs, t.salary_sum, t.salaried),
        }
    }

    /// Parses the text form of a value of `shape`.
    pub fn decode(shape: Shape, encoded: &str) -> Result<Self, JobStatsError> {
        let malformed = || JobStatsError::MalformedPartial {
            shape,
            encoded: encoded.to_string(),
        };
        let parts: Vec<&str> = encoded.trim().split(',').map(str::trim).collect();
        let int = |i: usize| parts[i].parse::<i64>().map_err(|_| malformed());
        let uint = |i: usize| parts[i].parse::<u64>().map_err(|_| malformed());

        let expected = match shape {
            Shape::Count => 1,
            Shape::Average | Shape::Ratio => 2,
            Shape::Totals => 3,
            Shape::Range => 4,
        };
        if parts.len() != expected {
            return Err(malformed());
        }

        let value = match shape {
            Shape::Count => PartialValue::Count(uint(0)?),
            Shape::Average => PartialValue::Average(SumCount {
                sum: int(0)?,
                count: uint(1)?,
            }),
            Shape::Range => PartialValue::Range(RangeStats {
                sum: int(0)?,
                min: int(1)?,
                max: int(2)?,
                count: uint(3)?,
            }),
            Shape::Ratio => {
                let pair = RatioPair {
                    matched: uint(0)?,
                    total: uint(1)?,
                };
                if pair.matched > pair.total {
                    return Err(malformed());
                }
                PartialValue::Ratio(pair)
            }
            Shape::Totals => PartialValue::Totals(Totals {
                jobs: uint(0)?,
                salary_sum: int(1)?,
                salaried: uint(2)?,
            }),
        };
        Ok(value)
    }
}
