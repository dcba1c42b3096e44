//! Normalization and grouped aggregation over job-posting exports.
//!
//! An export is a JSON array written one object per line. Each line is
//! framed, normalized into a [`record::Record`] and fed to one of the
//! analysis variants in [`map_reduce_apps`], which run on either the
//! sequential or the worker-pool runner with identical output.

pub mod common;
pub mod config;
pub mod counters;
pub mod error;
pub mod extract;
pub mod map_reduce;
pub mod map_reduce_apps;
pub mod map_reduce_seq;
pub mod mr_parallel;
pub mod partial;
pub mod record;
pub mod sink;

pub use common::{Input, MapReduce, RunReport};
pub use config::NormalizerConfig;
pub use error::JobStatsError;
pub use map_reduce::{MapReduceApp, Metric, Output, ResultRow};
pub use map_reduce_apps::{AnalysisApp, Variant, VARIANTS};
pub use map_reduce_seq::SequentialMapReduce;
pub use mr_parallel::ParallelMapReduce;
pub use record::{Record, RecordNormalizer};
