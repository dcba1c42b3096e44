use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::JobStatsError;

/// Cities accepted when a city is recovered from a job title.
pub const DEFAULT_CITIES: [&str; 21] = [
    "北京", "上海", "广州", "深圳", "杭州", "南京", "武汉", "成都", "西安", "重庆", "苏州", "天津",
    "合肥", "郑州", "长沙", "青岛", "大连", "厦门", "珠海", "东莞", "佛山",
];

pub const NEGOTIABLE_MARKER: &str = "面议";
pub const INTERNSHIP_MARKER: &str = "实习";
pub const UNKNOWN_CITY: &str = "unknown";
pub const HIGH_COLLECTION_THRESHOLD: i64 = 50;
pub const ACTIVE_LABEL: &str = "活跃";
pub const INACTIVE_LABEL: &str = "非活跃";

/// Constants that drive record normalization and the activity split.
///
/// Every field has a default, so a partial JSON file only overrides what it
/// names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Allow-list for cities pulled out of a parenthesised title suffix.
    pub known_cities: Vec<String>,
    /// Salary substring meaning "to be discussed".
    pub negotiable_marker: String,
    /// Recruit-type label, and job-title substring, marking internships.
    pub internship_marker: String,
    /// Effective city when neither the city field nor the title yields one.
    pub unknown_city: String,
    /// Collection count at or above which a posting is "high collection".
    pub high_collection_threshold: i64,
    pub active_label: String,
    pub inactive_label: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            known_cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            negotiable_marker: NEGOTIABLE_MARKER.to_string(),
            internship_marker: INTERNSHIP_MARKER.to_string(),
            unknown_city: UNKNOWN_CITY.to_string(),
            high_collection_threshold: HIGH_COLLECTION_THRESHOLD,
            active_label: ACTIVE_LABEL.to_string(),
            inactive_label: INACTIVE_LABEL.to_string(),
        }
    }
}

impl NormalizerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, JobStatsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| JobStatsError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text).map_err(|e| JobStatsError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn is_known_city(&self, name: &str) -> bool {
        self.known_cities.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_keeps_defaults() {
        let config = NormalizerConfig::from_json("{}").unwrap();
        assert_eq!(config, NormalizerConfig::default());
        assert_eq!(config.known_cities.len(), 21);
        assert!(config.is_known_city("合肥"));
        assert!(!config.is_known_city("火星"));
    }

    #[test]
    fn partial_json_overrides_named_fields() {
        let config =
            NormalizerConfig::from_json(r#"{"unknown_city": "未知", "high_collection_threshold": 10}"#)
                .unwrap();
        assert_eq!(config.unknown_city, "未知");
        assert_eq!(config.high_collection_threshold, 10);
        assert_eq!(config.negotiable_marker, NEGOTIABLE_MARKER);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = NormalizerConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, JobStatsError::Config { .. }));
    }
}
