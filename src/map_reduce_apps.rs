//! The analysis variants: each one is a key extractor, a value extractor,
//! a reducer shape and a row layout over the shared engine.

use crate::config::NormalizerConfig;
use crate::error::JobStatsError;
use crate::map_reduce::{AggregationKey, MapReduceApp, Metric, ResultRow};
use crate::partial::{PartialValue, RangeStats, RatioPair, Shape, SumCount, Totals};
use crate::record::{Field, Record};

pub type KeysFn = fn(&Record, &NormalizerConfig) -> Vec<AggregationKey>;
pub type ValueFn = fn(&Record) -> PartialValue;
pub type FinalizeFn = fn(&str, PartialValue) -> Vec<ResultRow>;

/// A named analysis.
#[derive(Clone, Copy)]
pub struct Variant {
    pub name: &'static str,
    pub description: &'static str,
    pub shape: Shape,
    /// Column names of each output row, key column first.
    pub columns: &'static [&'static str],
    pub keys_of: KeysFn,
    pub value_of: ValueFn,
    pub finalize: FinalizeFn,
}

impl std::fmt::Debug for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variant")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Label of the single dashboard group.
pub const DASHBOARD_KEY: &str = "ALL";

const SALARY_RANGE_COLUMNS: &[&str] = &["key", "avg_salary", "min_salary", "max_salary", "count"];

pub const VARIANTS: [Variant; 15] = [
    Variant {
        name: "city_count",
        description: "postings per effective city",
        shape: Shape::Count,
        columns: &["city", "count"],
        keys_of: city_key,
        value_of: one,
        finalize: count_row,
    },
    Variant {
        name: "city_salary",
        description: "salary range per effective city",
        shape: Shape::Range,
        columns: SALARY_RANGE_COLUMNS,
        keys_of: salaried_city_key,
        value_of: salary_range,
        finalize: salary_range_row,
    },
    Variant {
        name: "skill_count",
        description: "postings per skill tag",
        shape: Shape::Count,
        columns: &["skill", "count"],
        keys_of: skill_keys,
        value_of: one,
        finalize: count_row,
    },
    Variant {
        name: "skill_salary",
        description: "salary range per skill tag",
        shape: Shape::Range,
        columns: SALARY_RANGE_COLUMNS,
        keys_of: salaried_skill_keys,
        value_of: salary_range,
        finalize: salary_range_row,
    },
    Variant {
        name: "education_count",
        description: "postings per education requirement",
        shape: Shape::Count,
        columns: &["education", "count"],
        keys_of: education_key,
        value_of: one,
        finalize: count_row,
    },
    Variant {
        name: "education_salary",
        description: "salary range per education requirement",
        shape: Shape::Range,
        columns: SALARY_RANGE_COLUMNS,
        keys_of: salaried_education_key,
        value_of: salary_range,
        finalize: salary_range_row,
    },
    Variant {
        name: "company_type",
        description: "postings per company type",
        shape: Shape::Count,
        columns: &["company_type", "count"],
        keys_of: company_type_key,
        value_of: one,
        finalize: count_row,
    },
    Variant {
        name: "recruit_type",
        description: "postings per recruit type",
        shape: Shape::Count,
        columns: &["recruit_type", "count"],
        keys_of: recruit_type_key,
        value_of: one,
        finalize: count_row,
    },
    Variant {
        name: "internship",
        description: "internship postings and average salary per city",
        shape: Shape::Average,
        columns: &["city", "count", "avg_salary"],
        keys_of: internship_city_key,
        value_of: salary_or_zero,
        finalize: count_avg_row,
    },
    Variant {
        name: "dashboard",
        description: "overall totals",
        shape: Shape::Totals,
        columns: &["metric", "value"],
        keys_of: dashboard_key,
        value_of: totals,
        finalize: dashboard_rows,
    },
    Variant {
        name: "high_collection",
        description: "high-collection postings and their collections per city",
        shape: Shape::Average,
        columns: &["city", "count", "total_collection"],
        keys_of: high_collection_city_key,
        value_of: collections,
        finalize: count_sum_row,
    },
    Variant {
        name: "active_jobs",
        description: "active postings and average salary per city",
        shape: Shape::Average,
        columns: &["city", "count", "avg_salary"],
        keys_of: active_city_key,
        value_of: salary_or_zero,
        finalize: count_avg_row,
    },
    Variant {
        name: "negotiable",
        description: "share of negotiable salaries per city",
        shape: Shape::Ratio,
        columns: &["city", "total", "negotiable", "ratio"],
        keys_of: city_key,
        value_of: negotiable,
        finalize: ratio_row,
    },
    Variant {
        name: "skill_collection",
        description: "collections of high-collection postings per skill",
        shape: Shape::Average,
        columns: &["skill", "total_collection", "count"],
        keys_of: high_collection_skill_keys,
        value_of: collections,
        finalize: sum_count_row,
    },
    Variant {
        name: "activity_salary",
        description: "salary range of active versus inactive postings",
        shape: Shape::Range,
        columns: &["activity", "count", "avg_salary", "min_salary", "max_salary"],
        keys_of: activity_key,
        value_of: salary_range,
        finalize: activity_row,
    },
];

pub fn try_named(name: &str) -> Option<Variant> {
    VARIANTS.iter().find(|v| v.name == name).copied()
}

/// Resolves variant names; an empty list selects every variant.
pub fn select(names: &[String]) -> Result<Vec<Variant>, JobStatsError> {
    if names.is_empty() {
        return Ok(VARIANTS.to_vec());
    }
    names
        .iter()
        .map(|name| try_named(name).ok_or_else(|| JobStatsError::UnknownVariant(name.clone())))
        .collect()
}

/// A variant bound to the configuration its keys depend on.
pub struct AnalysisApp {
    variant: Variant,
    config: NormalizerConfig,
}

impl AnalysisApp {
    pub fn new(variant: Variant, config: NormalizerConfig) -> Self {
        Self { variant, config }
    }
}

impl MapReduceApp for AnalysisApp {
    fn name(&self) -> &str {
        self.variant.name
    }

    fn shape(&self) -> Shape {
        self.variant.shape
    }

    fn map(&self, record: &Record) -> Vec<(AggregationKey, PartialValue)> {
        let keys = (self.variant.keys_of)(record, &self.config);
        if keys.is_empty() {
            return Vec::new();
        }
        let value = (self.variant.value_of)(record);
        keys.into_iter().map(|key| (key, value)).collect()
    }

    fn reduce(&self, key: &str, value: PartialValue) -> Vec<ResultRow> {
        (self.variant.finalize)(key, value)
    }
}

// keys

fn non_empty(value: &str) -> Vec<AggregationKey> {
    if value.is_empty() {
        Vec::new()
    } else {
        vec![value.to_string()]
    }
}

fn when(cond: bool, keys: Vec<AggregationKey>) -> Vec<AggregationKey> {
    if cond {
        keys
    } else {
        Vec::new()
    }
}

fn city_key(r: &Record, _: &NormalizerConfig) -> Vec<AggregationKey> {
    vec![r.effective_city().to_string()]
}

fn salaried_city_key(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.salary().is_some(), city_key(r, c))
}

fn skill_keys(r: &Record, _: &NormalizerConfig) -> Vec<AggregationKey> {
    r.skills().to_vec()
}

fn salaried_skill_keys(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.salary().is_some(), skill_keys(r, c))
}

fn education_key(r: &Record, _: &NormalizerConfig) -> Vec<AggregationKey> {
    non_empty(r.field(Field::Education))
}

fn salaried_education_key(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.salary().is_some(), education_key(r, c))
}

fn company_type_key(r: &Record, _: &NormalizerConfig) -> Vec<AggregationKey> {
    non_empty(r.field(Field::CompanyType))
}

fn recruit_type_key(r: &Record, _: &NormalizerConfig) -> Vec<AggregationKey> {
    non_empty(r.field(Field::RecruitType))
}

fn internship_city_key(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.is_internship(), city_key(r, c))
}

fn dashboard_key(_: &Record, _: &NormalizerConfig) -> Vec<AggregationKey> {
    vec![DASHBOARD_KEY.to_string()]
}

fn high_collection_city_key(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.is_high_collection(), city_key(r, c))
}

fn active_city_key(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.is_active(), city_key(r, c))
}

fn high_collection_skill_keys(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    when(r.is_high_collection(), skill_keys(r, c))
}

fn activity_key(r: &Record, c: &NormalizerConfig) -> Vec<AggregationKey> {
    let label = if r.is_active() {
        &c.active_label
    } else {
        &c.inactive_label
    };
    when(r.salary().is_some(), vec![label.clone()])
}

// values

fn one(_: &Record) -> PartialValue {
    PartialValue::Count(1)
}

fn salary_range(r: &Record) -> PartialValue {
    match r.salary() {
        Some(s) => PartialValue::Range(RangeStats::observe(s.avg_monthly(), s.min, s.max)),
        None => PartialValue::Range(RangeStats::EMPTY),
    }
}

fn salary_or_zero(r: &Record) -> PartialValue {
    PartialValue::Average(SumCount::one(r.avg_monthly_salary().unwrap_or(0)))
}

fn collections(r: &Record) -> PartialValue {
    PartialValue::Average(SumCount::one(r.collection_count()))
}

fn negotiable(r: &Record) -> PartialValue {
    PartialValue::Ratio(RatioPair::one(r.is_negotiable()))
}

fn totals(r: &Record) -> PartialValue {
    let salary = r.avg_monthly_salary();
    PartialValue::Totals(Totals {
        jobs: 1,
        salary_sum: salary.unwrap_or(0),
        salaried: u64::from(salary.is_some()),
    })
}

// rows

fn count_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Count(n) => vec![ResultRow::new(key, vec![n.into()])],
        _ => Vec::new(),
    }
}

fn salary_range_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Range(r) if r.count > 0 => vec![ResultRow::new(
            key,
            vec![r.average().into(), r.min.into(), r.max.into(), r.count.into()],
        )],
        _ => Vec::new(),
    }
}

fn activity_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Range(r) if r.count > 0 => vec![ResultRow::new(
            key,
            vec![r.count.into(), r.average().into(), r.min.into(), r.max.into()],
        )],
        _ => Vec::new(),
    }
}

fn count_avg_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Average(a) => vec![ResultRow::new(key, vec![a.count.into(), a.average().into()])],
        _ => Vec::new(),
    }
}

fn count_sum_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Average(a) => vec![ResultRow::new(key, vec![a.count.into(), a.sum.into()])],
        _ => Vec::new(),
    }
}

fn sum_count_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Average(a) => vec![ResultRow::new(key, vec![a.sum.into(), a.count.into()])],
        _ => Vec::new(),
    }
}

fn ratio_row(key: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Ratio(r) => vec![ResultRow::new(
            key,
            vec![r.total.into(), r.matched.into(), Metric::Ratio(r.percent())],
        )],
        _ => Vec::new(),
    }
}

fn dashboard_rows(_: &str, value: PartialValue) -> Vec<ResultRow> {
    match value {
        PartialValue::Totals(t) => vec![
            ResultRow::new("total_jobs", vec![t.jobs.into()]),
            ResultRow::new("avg_salary", vec![t.average_salary().into()]),
            ResultRow::new("valid_salary_jobs", vec![t.salaried.into()]),
        ],
        _ => Vec::new(),
    }
}
