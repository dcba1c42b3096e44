use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;

use crate::counters::CounterSnapshot;
use crate::map_reduce::{MapReduceApp, Output};
use crate::record::RecordNormalizer;

/// One raw line of the export, not yet checked for UTF-8.
pub type Line = Vec<u8>;

/// Lines to aggregate plus the normalizer that turns them into records.
#[derive(Clone)]
pub struct Input {
    pub lines: Arc<Vec<Line>>,
    pub normalizer: Arc<RecordNormalizer>,
}

impl Input {
    pub fn new(lines: Vec<Line>, normalizer: RecordNormalizer) -> Self {
        Self {
            lines: Arc::new(lines),
            normalizer: Arc::new(normalizer),
        }
    }

    pub fn from_text(text: &str, normalizer: RecordNormalizer) -> Self {
        Self::new(split_lines(text.as_bytes()), normalizer)
    }
}

pub enum Task {
    // task id, first line, one past the last line
    Map(usize, usize, usize),
    // partition id, encoded (key, value) pairs
    Reduce(usize, Vec<(String, String)>),
}

/// Results of one variant run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub variant: String,
    pub output: Output,
    pub counters: CounterSnapshot,
}

#[async_trait]
pub trait MapReduce {
    fn new(input: Input, mr_app: Arc<dyn MapReduceApp>) -> Self;
    async fn run(self) -> anyhow::Result<RunReport>;
}

/// Strips the array framing of the export from one line.
///
/// Returns `None` for blank lines and bare `[` / `]`; otherwise the trimmed
/// line with at most one trailing comma removed.
pub fn frame_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line == "[" || line == "]" {
        return None;
    }
    Some(line.strip_suffix(',').unwrap_or(line))
}

pub fn split_lines(bytes: &[u8]) -> Vec<Line> {
    bytes
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
        .collect()
}

/// Every regular file under `input`, or `input` itself when it is a file.
pub fn read_files_from_dir(input: impl AsRef<Path>) -> anyhow::Result<Vec<PathBuf>> {
    let input = input.as_ref();
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(input).with_context(|| format!("read_dir {}", input.display()))? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_input_lines(inputs: &[PathBuf]) -> anyhow::Result<Vec<Line>> {
    let mut lines = Vec::new();
    for input in inputs {
        for path in read_files_from_dir(input)? {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            lines.extend(split_lines(&bytes));
        }
    }
    Ok(lines)
}
