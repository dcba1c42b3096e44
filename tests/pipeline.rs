use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use job_stats::counters::{Counter, RunCounters};
use job_stats::map_reduce::{combine, finalize_groups, map_line, merge_into};
use job_stats::map_reduce_apps::try_named;
use job_stats::mr_parallel::MAX_MAP_ATTEMPTS;
use job_stats::partial::{PartialValue, Shape};
use job_stats::{
    AnalysisApp, Input, MapReduce, MapReduceApp, NormalizerConfig, Output, ParallelMapReduce,
    Record, RecordNormalizer, ResultRow, RunReport, SequentialMapReduce, VARIANTS,
};

const RECORDS: [&str; 6] = [
    r#"{"岗位名称": "后端开发", "城市": "北京", "薪资": "10-20K", "学历要求": "本科", "公司类型": "民营", "招聘类型": "社招", "技能要求标签": "Go,Rust", "collection_count": 60, "active_status": "刚刚活跃"},"#,
    r#"{"岗位名称": "数据分析", "城市": "北京", "薪资": "20-30K·14薪", "学历要求": "硕士", "技能要求标签": "Python", "collection_count": "10"},"#,
    r#"{"岗位名称": "产品经理", "城市": "北京", "薪资": "面议", "学历要求": "本科", "招聘类型": "实习"},"#,
    r#"{"岗位名称": "测试实习生（上海）", "薪资": "3-5K", "技能要求标签": "Python,SQL", "collection_count": 80, "active_status": "今日活跃"},"#,
    r#"{"岗位名称": "运维", "城市": "深圳", "薪资": "15-25K", "公司类型": "国企", "招聘类型": "校招"},"#,
    r#"{"岗位名称": "设计（火星）", "薪资": "200/天"}"#,
];

fn export_lines() -> Vec<Vec<u8>> {
    let mut lines = vec![b"[".to_vec()];
    lines.extend(RECORDS.iter().map(|r| r.as_bytes().to_vec()));
    lines.push(Vec::new());
    lines.push(b"not json".to_vec());
    lines.push(b"\xff{\xfe}".to_vec());
    lines.push(b"]".to_vec());
    lines
}

fn input_with(config: NormalizerConfig) -> Input {
    Input::new(export_lines(), RecordNormalizer::new(config))
}

fn app_with(name: &str, config: NormalizerConfig) -> Arc<dyn MapReduceApp> {
    Arc::new(AnalysisApp::new(try_named(name).unwrap(), config))
}

async fn run_seq(name: &str) -> RunReport {
    let config = NormalizerConfig::default();
    SequentialMapReduce::new(input_with(config.clone()), app_with(name, config))
        .run()
        .await
        .unwrap()
}

async fn run_par(name: &str, workers: usize, chunk_lines: usize) -> RunReport {
    let config = NormalizerConfig::default();
    ParallelMapReduce::new(input_with(config.clone()), app_with(name, config))
        .with_workers(workers)
        .with_chunk_lines(chunk_lines)
        .run()
        .await
        .unwrap()
}

fn printed(output: &Output) -> Vec<String> {
    output.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn beijing_counts_and_salary_average() {
    let count = run_seq("city_count").await;
    assert_eq!(
        printed(&count.output),
        vec!["unknown\t1", "上海\t1", "北京\t3", "深圳\t1"]
    );

    let salary = run_seq("city_salary").await;
    assert_eq!(
        printed(&salary.output),
        vec![
            "上海\t4000\t3000\t5000\t1",
            "北京\t20000\t10000\t30000\t2",
            "深圳\t20000\t15000\t25000\t1",
        ]
    );
}

#[tokio::test]
async fn variant_rows_on_sample_export() {
    let expected: &[(&str, &[&str])] = &[
        ("dashboard", &["total_jobs\t6", "avg_salary\t16000", "valid_salary_jobs\t4"]),
        ("negotiable", &["unknown\t1\t0\t0.00", "上海\t1\t0\t0.00", "北京\t3\t1\t33.33", "深圳\t1\t0\t0.00"]),
        ("internship", &["上海\t1\t4000", "北京\t1\t0"]),
        ("high_collection", &["上海\t1\t80", "北京\t1\t60"]),
        ("active_jobs", &["上海\t1\t4000", "北京\t1\t15000"]),
        ("skill_count", &["Go\t1", "Python\t2", "Rust\t1", "SQL\t1"]),
        ("skill_collection", &["Go\t60\t1", "Python\t80\t1", "Rust\t60\t1", "SQL\t80\t1"]),
        ("education_count", &["本科\t2", "硕士\t1"]),
        ("company_type", &["国企\t1", "民营\t1"]),
        ("activity_salary", &["活跃\t2\t9500\t3000\t20000", "非活跃\t2\t22500\t15000\t30000"]),
    ];
    for (name, rows) in expected {
        let report = run_seq(name).await;
        assert_eq!(printed(&report.output), *rows, "{name}");
    }
}

#[tokio::test]
async fn counters_account_for_every_line() {
    let report = run_seq("city_salary").await;
    let c = &report.counters;
    assert_eq!(c.get(Counter::LinesRead), 11);
    assert_eq!(c.get(Counter::FramingSkips), 3);
    assert_eq!(c.get(Counter::ParseErrors), 2);
    assert_eq!(c.get(Counter::Records), 6);
    assert_eq!(c.get(Counter::Emitted), 4);
    assert_eq!(c.get(Counter::Excluded), 2);
    assert_eq!(c.get(Counter::MalformedPartials), 0);

    // a fresh run starts from zero
    let again = run_seq("city_salary").await;
    assert_eq!(again.counters, report.counters);
}

#[tokio::test]
async fn parallel_matches_sequential_for_every_variant() {
    for variant in VARIANTS {
        let expected = run_seq(variant.name).await;
        for workers in [2, 3, 8] {
            for chunk_lines in [1, 2, 4, 100] {
                let got = run_par(variant.name, workers, chunk_lines).await;
                assert_eq!(
                    got.output, expected.output,
                    "{} workers={workers} chunk={chunk_lines}",
                    variant.name
                );
                assert_eq!(got.counters, expected.counters, "{}", variant.name);
            }
        }
    }
}

#[test]
fn pre_combining_any_split_matches_linear_fold() {
    let normalizer = RecordNormalizer::default();
    let lines = export_lines();
    for variant in VARIANTS {
        let app = AnalysisApp::new(variant, NormalizerConfig::default());
        let counters = RunCounters::new();
        let pairs: Vec<_> = lines
            .iter()
            .map(|line| map_line(&normalizer, &app, line, &counters))
            .collect();

        let linear = combine(pairs.iter().flatten().cloned(), &counters);
        let expected = finalize_groups(&app, linear);

        for split in 0..=pairs.len() {
            let (left, right) = pairs.split_at(split);
            let left = combine(left.iter().flatten().cloned(), &counters);
            let right = combine(right.iter().flatten().cloned(), &counters);
            // merge the right side first to exercise commutativity
            let mut merged: HashMap<String, PartialValue> = HashMap::new();
            for (key, value) in right.into_iter().chain(left) {
                merge_into(&mut merged, key, value, &counters);
            }
            assert_eq!(finalize_groups(&app, merged), expected, "{} split={split}", variant.name);
        }
        assert_eq!(counters.get(Counter::MalformedPartials), 0);
    }
}

#[test]
fn malformed_partials_are_rejected() {
    assert!(PartialValue::decode(Shape::Count, "x").is_err());
    assert!(PartialValue::decode(Shape::Ratio, "5,3").is_err());
    assert!(PartialValue::decode(Shape::Range, "1,2").is_err());
    let ok = PartialValue::decode(Shape::Average, "30,2").unwrap();
    assert_eq!(PartialValue::decode(Shape::Average, &ok.encode()).unwrap(), ok);
}

#[tokio::test]
async fn config_file_overrides_threshold_and_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("normalizer.json");
    std::fs::write(&path, r#"{"high_collection_threshold": 70, "unknown_city": "其他"}"#).unwrap();
    let config = NormalizerConfig::load(&path).unwrap();
    assert_eq!(config.negotiable_marker, "面议");

    let report = SequentialMapReduce::new(
        input_with(config.clone()),
        app_with("high_collection", config.clone()),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(printed(&report.output), vec!["上海\t1\t80"]);

    let report = SequentialMapReduce::new(input_with(config.clone()), app_with("city_count", config))
        .run()
        .await
        .unwrap();
    assert!(printed(&report.output).contains(&"其他\t1".to_string()));
}

/// Panics on its first `failures` map calls, then behaves like `inner`.
struct FlakyApp {
    inner: AnalysisApp,
    failures: AtomicUsize,
}

impl FlakyApp {
    fn new(name: &str, failures: usize) -> Self {
        Self {
            inner: AnalysisApp::new(try_named(name).unwrap(), NormalizerConfig::default()),
            failures: AtomicUsize::new(failures),
        }
    }
}

impl MapReduceApp for FlakyApp {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn shape(&self) -> Shape {
        self.inner.shape()
    }

    fn map(&self, record: &Record) -> Vec<(String, PartialValue)> {
        let remaining = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            panic!("injected map failure");
        }
        self.inner.map(record)
    }

    fn reduce(&self, key: &str, value: PartialValue) -> Vec<ResultRow> {
        self.inner.reduce(key, value)
    }
}

async fn run_flaky(failures: usize, chunk_lines: usize) -> anyhow::Result<RunReport> {
    ParallelMapReduce::new(
        input_with(NormalizerConfig::default()),
        Arc::new(FlakyApp::new("high_collection", failures)),
    )
    .with_workers(2)
    .with_chunk_lines(chunk_lines)
    .run()
    .await
}

#[tokio::test]
async fn panicking_map_tasks_are_retried_without_double_counting() {
    let expected = run_seq("high_collection").await;
    for chunk_lines in [2, 100] {
        let report = run_flaky(MAX_MAP_ATTEMPTS - 1, chunk_lines).await.unwrap();
        assert_eq!(printed(&report.output), vec!["上海\t1\t80", "北京\t1\t60"]);
        assert_eq!(report.output, expected.output, "chunk={chunk_lines}");
        assert_eq!(report.counters, expected.counters, "chunk={chunk_lines}");
        assert_eq!(report.counters.get(Counter::Records), 6);
    }
}

#[tokio::test]
async fn map_task_failing_every_attempt_fails_the_run() {
    let err = run_flaky(MAX_MAP_ATTEMPTS, 100).await.unwrap_err();
    assert!(err.to_string().contains("failed 3 times"), "{err}");
}

#[test]
fn missing_config_file_is_a_config_error() {
    let err = NormalizerConfig::load("/nonexistent/normalizer.json").unwrap_err();
    assert!(err.to_string().contains("normalizer.json"));
}
