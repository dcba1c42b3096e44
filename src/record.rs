//! Canonical job-posting records built from raw export lines.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::common::frame_line;
use crate::config::NormalizerConfig;
use crate::extract::FieldExtractor;

fn salary_range_re() -> &'static Regex {
    static SALARY_RANGE_RE: OnceLock<Regex> = OnceLock::new();
    SALARY_RANGE_RE.get_or_init(|| Regex::new(r"([0-9]+)-([0-9]+)[Kk]").expect("valid salary regex"))
}

fn salary_months_re() -> &'static Regex {
    static SALARY_MONTHS_RE: OnceLock<Regex> = OnceLock::new();
    SALARY_MONTHS_RE.get_or_init(|| Regex::new(r"([0-9]+)薪").expect("valid months regex"))
}

fn title_city_re() -> &'static Regex {
    static TITLE_CITY_RE: OnceLock<Regex> = OnceLock::new();
    TITLE_CITY_RE.get_or_init(|| {
        Regex::new(r"[（(]([\x{4e00}-\x{9fa5}]{2,4})[）)]").expect("valid title city regex")
    })
}

/// Months of pay assumed when a salary range carries no `N薪` marker.
pub const DEFAULT_SALARY_MONTHS: i64 = 12;

/// Semantic fields of a posting, keyed by their label in the source export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    JobName,
    CompanyName,
    Salary,
    Education,
    City,
    JobType,
    RecruitCount,
    CompanyType,
    CompanyNature,
    GraduateYear,
    WorkDaysPerWeek,
    InternDuration,
    HasConversion,
    JobDesc,
    JobLink,
    JobId,
    SkillTags,
    RecruitType,
    ActiveStatus,
}

impl Field {
    pub const ALL: [Field; 19] = [
        Field::JobName,
        Field::CompanyName,
        Field::Salary,
        Field::Education,
        Field::City,
        Field::JobType,
        Field::RecruitCount,
        Field::CompanyType,
        Field::CompanyNature,
        Field::GraduateYear,
        Field::WorkDaysPerWeek,
        Field::InternDuration,
        Field::HasConversion,
        Field::JobDesc,
        Field::JobLink,
        Field::JobId,
        Field::SkillTags,
        Field::RecruitType,
        Field::ActiveStatus,
    ];

    /// Integer-valued attribute consumed by the high-collection predicate.
    pub const COLLECTION_COUNT: &'static str = "collection_count";

    /// The JSON key this field is stored under.
    pub fn label(self) -> &'static str {
        match self {
            Field::JobName => "岗位名称",
            Field::CompanyName => "公司名称",
            Field::Salary => "薪资",
            Field::Education => "学历要求",
            Field::City => "城市",
            Field::JobType => "职位类型",
            Field::RecruitCount => "招聘人数",
            Field::CompanyType => "公司类型",
            Field::CompanyNature => "公司性质",
            Field::GraduateYear => "毕业年份",
            Field::WorkDaysPerWeek => "每周工作天数",
            Field::InternDuration => "实习时长",
            Field::HasConversion => "是否有转正",
            Field::JobDesc => "职位描述",
            Field::JobLink => "职位链接",
            Field::JobId => "job_id",
            Field::SkillTags => "技能要求标签",
            Field::RecruitType => "招聘类型",
            Field::ActiveStatus => "active_status",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field values pulled from one line. Missing fields read as `""`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFields {
    values: HashMap<Field, String>,
    collection_count: Option<i64>,
}

impl RawFields {
    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn collection_count(&self) -> Option<i64> {
        self.collection_count
    }

    pub fn set_collection_count(&mut self, count: i64) {
        self.collection_count = Some(count);
    }
}

/// Parsed monthly salary range plus months of pay.
///
/// `min` and `max` are whole-thousand amounts with `min <= max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Salary {
    pub min: i64,
    pub max: i64,
    pub months: i64,
}

impl Salary {
    pub fn avg_monthly(&self) -> i64 {
        (self.min + self.max) / 2
    }

    pub fn annual(&self) -> Option<i64> {
        self.avg_monthly().checked_mul(self.months)
    }
}

/// Parses strings such as `"15-25K·14薪"`.
///
/// Returns `None` for negotiable salaries, for strings without a `<a>-<b>K`
/// range, for ranges with `a > b`, and for amounts that overflow.
pub fn parse_salary(raw: &str, negotiable_marker: &str) -> Option<Salary> {
    if raw.is_empty() || (!negotiable_marker.is_empty() && raw.contains(negotiable_marker)) {
        return None;
    }
    let caps = salary_range_re().captures(raw)?;
    let min = thousands(&caps[1])?;
    let max = thousands(&caps[2])?;
    if min > max {
        return None;
    }
    let months = salary_months_re()
        .captures(raw)
        .and_then(|m| m[1].parse::<i64>().ok())
        .unwrap_or(DEFAULT_SALARY_MONTHS);
    Some(Salary { min, max, months })
}

fn thousands(digits: &str) -> Option<i64> {
    digits.parse::<i64>().ok()?.checked_mul(1000)
}

/// Splits a comma-separated tag string, trimming and dropping empty pieces.
/// Order and duplicates are kept.
pub fn split_skills(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A normalized posting. Built once per line and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    raw: RawFields,
    salary: Option<Salary>,
    effective_city: String,
    skills: Vec<String>,
    is_internship: bool,
    is_negotiable: bool,
    is_active: bool,
    is_high_collection: bool,
}

impl Record {
    pub fn field(&self, field: Field) -> &str {
        self.raw.get(field)
    }

    pub fn job_id(&self) -> &str {
        self.raw.get(Field::JobId)
    }

    pub fn salary(&self) -> Option<Salary> {
        self.salary
    }

    pub fn min_salary(&self) -> Option<i64> {
        self.salary.map(|s| s.min)
    }

    pub fn max_salary(&self) -> Option<i64> {
        self.salary.map(|s| s.max)
    }

    pub fn salary_months(&self) -> Option<i64> {
        self.salary.map(|s| s.months)
    }

    pub fn avg_monthly_salary(&self) -> Option<i64> {
        self.salary.map(|s| s.avg_monthly())
    }

    pub fn annual_salary(&self) -> Option<i64> {
        self.salary.and_then(|s| s.annual())
    }

    pub fn effective_city(&self) -> &str {
        &self.effective_city
    }

    pub fn skills(&self) -> &[String] {
        &self.skills
    }

    /// Collection count from the source line, 0 when absent.
    pub fn collection_count(&self) -> i64 {
        self.raw.collection_count().unwrap_or(0)
    }

    pub fn is_internship(&self) -> bool {
        self.is_internship
    }

    pub fn is_negotiable(&self) -> bool {
        self.is_negotiable
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_high_collection(&self) -> bool {
        self.is_high_collection
    }
}

/// Why a raw line produced no record at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineError {
    /// The framed line is not brace-delimited.
    NotAnObject,
}

/// Turns raw lines into [`Record`]s.
///
/// Normalization never fails: an attribute that cannot be derived is left
/// absent and the others are still computed.
#[derive(Clone, Debug)]
pub struct RecordNormalizer {
    config: NormalizerConfig,
    extractor: FieldExtractor,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl RecordNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        let extractor = FieldExtractor::new(
            Field::ALL.iter().map(|f| f.label()),
            [Field::COLLECTION_COUNT],
        );
        Self { config, extractor }
    }

    pub fn extract(&self, line: &str) -> RawFields {
        let mut raw = RawFields::default();
        for field in Field::ALL {
            let value = self.extractor.extract(line, field.label());
            if !value.is_empty() {
                raw.set(field, value);
            }
        }
        if let Some(count) = self.extractor.extract_number(line, Field::COLLECTION_COUNT) {
            raw.set_collection_count(count);
        }
        raw
    }

    /// Frames and normalizes one input line.
    ///
    /// `Ok(None)` is a framing skip (blank line or bare array bracket).
    pub fn read_line(&self, line: &str) -> Result<Option<Record>, LineError> {
        let Some(body) = frame_line(line) else {
            return Ok(None);
        };
        if !(body.starts_with('{') && body.ends_with('}')) {
            return Err(LineError::NotAnObject);
        }
        Ok(Some(self.normalize(body)))
    }

    pub fn normalize(&self, line: &str) -> Record {
        self.normalize_fields(self.extract(line))
    }

    pub fn normalize_fields(&self, raw: RawFields) -> Record {
        let config = &self.config;
        let salary_text = raw.get(Field::Salary);

        let is_negotiable =
            !config.negotiable_marker.is_empty() && salary_text.contains(&config.negotiable_marker);
        let salary = parse_salary(salary_text, &config.negotiable_marker);
        let effective_city = self.resolve_city(raw.get(Field::City), raw.get(Field::JobName));
        let skills = split_skills(raw.get(Field::SkillTags));
        let is_internship = !config.internship_marker.is_empty()
            && (raw.get(Field::RecruitType) == config.internship_marker
                || raw.get(Field::JobName).contains(&config.internship_marker));
        let is_active = !raw.get(Field::ActiveStatus).trim().is_empty();
        let is_high_collection =
            raw.collection_count().unwrap_or(0) >= config.high_collection_threshold;

        Record {
            raw,
            salary,
            effective_city,
            skills,
            is_internship,
            is_negotiable,
            is_active,
            is_high_collection,
        }
    }

    /// Raw city if present, else a known city in parentheses in the title.
    pub fn resolve_city(&self, city: &str, job_name: &str) -> String {
        if !city.is_empty() {
            return city.to_string();
        }
        title_city_re()
            .captures(job_name)
            .map(|caps| caps[1].to_string())
            .filter(|name| self.config.is_known_city(name))
            .unwrap_or_else(|| self.config.unknown_city.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEGOTIABLE_MARKER;

    fn line(pairs: &[(Field, &str)]) -> String {
        let body = pairs
            .iter()
            .map(|(f, v)| format!(r#""{}": "{}""#, f.label(), v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{body}}}")
    }

    #[test]
    fn salary_with_months_marker() {
        let s = parse_salary("15-25K·14薪", NEGOTIABLE_MARKER).unwrap();
        assert_eq!((s.min, s.max, s.months), (15000, 25000, 14));
        assert_eq!(s.avg_monthly(), 20000);
        assert_eq!(s.annual(), Some(280000));
    }

    #[test]
    fn salary_months_default_to_twelve() {
        let s = parse_salary("10-15k", NEGOTIABLE_MARKER).unwrap();
        assert_eq!((s.min, s.max, s.months), (10000, 15000, 12));
        assert_eq!(s.avg_monthly(), 12500);
    }

    #[test]
    fn only_ascii_digits_count() {
        let s = parse_salary("10-20K·１4薪", NEGOTIABLE_MARKER).unwrap();
        assert_eq!((s.min, s.max, s.months), (10000, 20000, 4));
        let s = parse_salary("１0-20K", NEGOTIABLE_MARKER).unwrap();
        assert_eq!((s.min, s.max, s.months), (0, 20000, 12));
        assert_eq!(parse_salary("１０-２０K", NEGOTIABLE_MARKER), None);
    }

    #[test]
    fn negotiable_wins_over_digits() {
        assert_eq!(parse_salary("面议", NEGOTIABLE_MARKER), None);
        assert_eq!(parse_salary("10-20K 面议 13薪", NEGOTIABLE_MARKER), None);
    }

    #[test]
    fn unparseable_salaries_are_absent() {
        assert_eq!(parse_salary("", NEGOTIABLE_MARKER), None);
        assert_eq!(parse_salary("200/天", NEGOTIABLE_MARKER), None);
        assert_eq!(parse_salary("14薪", NEGOTIABLE_MARKER), None);
        assert_eq!(parse_salary("30-20K", NEGOTIABLE_MARKER), None);
        assert_eq!(parse_salary("1-99999999999999999999K", NEGOTIABLE_MARKER), None);
    }

    #[test]
    fn skills_keep_order_and_duplicates() {
        assert_eq!(split_skills("Java,Spring, MySQL,,"), vec!["Java", "Spring", "MySQL"]);
        assert_eq!(split_skills("Go, Go"), vec!["Go", "Go"]);
        assert!(split_skills("").is_empty());
    }

    #[test]
    fn city_resolution_tiers() {
        let n = RecordNormalizer::default();
        assert_eq!(n.resolve_city("上海", "Java工程师（合肥）"), "上海");
        assert_eq!(n.resolve_city("", "Java工程师（合肥）"), "合肥");
        assert_eq!(n.resolve_city("", "Java工程师(深圳)"), "深圳");
        assert_eq!(n.resolve_city("", "Java工程师（火星）"), "unknown");
        assert_eq!(n.resolve_city("", "Java工程师"), "unknown");
    }

    #[test]
    fn normalizes_full_line() {
        let n = RecordNormalizer::default();
        let text = line(&[
            (Field::JobName, "后端开发实习生（杭州）"),
            (Field::Salary, "15-25K·14薪"),
            (Field::SkillTags, "Java,Redis"),
            (Field::JobId, "42"),
            (Field::ActiveStatus, "HR近期来过"),
        ]);
        let text = text.replace('}', r#", "collection_count": 50}"#);
        let record = n.normalize(&text);
        assert_eq!(record.job_id(), "42");
        assert_eq!(record.effective_city(), "杭州");
        assert_eq!(record.min_salary(), Some(15000));
        assert_eq!(record.max_salary(), Some(25000));
        assert_eq!(record.salary_months(), Some(14));
        assert_eq!(record.annual_salary(), Some(280000));
        assert_eq!(record.skills(), ["Java", "Redis"]);
        assert!(record.is_internship());
        assert!(!record.is_negotiable());
        assert!(record.is_active());
        assert!(record.is_high_collection());
        assert_eq!(record.collection_count(), 50);
    }

    #[test]
    fn negotiable_record_has_no_salary() {
        let n = RecordNormalizer::default();
        let record = n.normalize(&line(&[(Field::Salary, "面议"), (Field::City, "北京")]));
        assert!(record.is_negotiable());
        assert_eq!(record.min_salary(), None);
        assert_eq!(record.max_salary(), None);
        assert_eq!(record.salary_months(), None);
        assert_eq!(record.avg_monthly_salary(), None);
        assert_eq!(record.annual_salary(), None);
    }

    #[test]
    fn predicates_default_to_false() {
        let n = RecordNormalizer::default();
        let record = n.normalize(&line(&[(Field::RecruitType, "校招")]));
        assert!(!record.is_internship());
        assert!(!record.is_active());
        assert!(!record.is_high_collection());
        assert_eq!(record.collection_count(), 0);
        assert_eq!(record.effective_city(), "unknown");

        let record = n.normalize(&line(&[(Field::RecruitType, "实习")]));
        assert!(record.is_internship());
    }

    #[test]
    fn read_line_frames_and_rejects() {
        let n = RecordNormalizer::default();
        assert_eq!(n.read_line("  [ "), Ok(None));
        assert_eq!(n.read_line("]"), Ok(None));
        assert_eq!(n.read_line(""), Ok(None));
        assert_eq!(n.read_line("garbage"), Err(LineError::NotAnObject));
        let record = n
            .read_line(&format!("{},", line(&[(Field::City, "北京")])))
            .unwrap()
            .unwrap();
        assert_eq!(record.effective_city(), "北京");
    }

    #[test]
    fn configured_sentinel_and_threshold() {
        let config = NormalizerConfig {
            unknown_city: "未知".to_string(),
            high_collection_threshold: 10,
            ..NormalizerConfig::default()
        };
        let n = RecordNormalizer::new(config);
        let record = n.normalize(r#"{"岗位名称": "测试", "collection_count": 12}"#);
        assert_eq!(record.effective_city(), "未知");
        assert!(record.is_high_collection());
    }
}
