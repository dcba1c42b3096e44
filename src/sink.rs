//! Where finalized rows go: tab-separated files and the result store.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::map_reduce::ResultRow;

/// Writes one `<variant>.tsv` per run under a directory.
pub struct TsvSink {
    dir: PathBuf,
}

impl TsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, variant: &str) -> PathBuf {
        self.dir.join(format!("{variant}.tsv"))
    }

    pub fn write(&self, variant: &str, rows: &[ResultRow]) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create_dir_all {}", self.dir.display()))?;
        let path = self.path_for(variant);
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        write_rows(BufWriter::new(file), rows)?;
        Ok(path)
    }
}

pub fn write_rows<W: Write>(mut writer: W, rows: &[ResultRow]) -> anyhow::Result<()> {
    for row in rows {
        writeln!(writer, "{}", row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Key to primary integer metric, the form the result store accepts.
pub fn metric_map(rows: &[ResultRow]) -> BTreeMap<String, i64> {
    rows.iter()
        .filter_map(|row| row.primary_metric().map(|v| (row.key.clone(), v)))
        .collect()
}

/// Idempotent insert-or-update of per-key metrics.
pub trait ResultStore {
    fn upsert(&mut self, table: &str, metrics: &BTreeMap<String, i64>) -> anyhow::Result<()>;
}

/// In-process store. Re-upserting the same mapping leaves it unchanged.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, BTreeMap<String, i64>>,
}

impl MemoryStore {
    pub fn table(&self, name: &str) -> Option<&BTreeMap<String, i64>> {
        self.tables.get(name)
    }
}

impl ResultStore for MemoryStore {
    fn upsert(&mut self, table: &str, metrics: &BTreeMap<String, i64>) -> anyhow::Result<()> {
        let rows = self.tables.entry(table.to_string()).or_default();
        for (key, value) in metrics {
            rows.insert(key.clone(), *value);
        }
        Ok(())
    }
}

/// Reads back a file written by [`TsvSink`].
pub fn read_tsv(path: impl AsRef<Path>) -> anyhow::Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect())
}
