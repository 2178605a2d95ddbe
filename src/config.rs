use crate::aggregate::{ClassificationBand, ClassificationScale};
use crate::grading::{round_off_1_decimal, GradeBand, GradeScale, SubjectScore};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub const DEFAULT_BEST_OF: usize = 8;
const MAX_BEST_OF: i64 = 20;
const MAX_BANDS: usize = 32;
const MAX_LABEL_LEN: usize = 48;
const MAX_BAND_WEIGHT: u64 = 1_000;

/// Process-level settings read from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: Option<String>,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            workspace: non_empty("SCHOOLD_WORKSPACE").map(PathBuf::from),
            log_filter: non_empty("SCHOOLD_LOG").or_else(|| non_empty("RUST_LOG")),
        }
    }
}

/// Per-workspace grading convention. The band tables are data, not
/// constants; UNEB is only the default.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingConfig {
    pub grade_scale: GradeScale,
    pub classification_scale: ClassificationScale,
    pub best_of: usize,
    /// Round to one decimal before band lookup.
    pub round_percentages: bool,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            grade_scale: GradeScale::uneb(),
            classification_scale: ClassificationScale::uneb(),
            best_of: DEFAULT_BEST_OF,
            round_percentages: false,
        }
    }
}

impl GradingConfig {
    pub const SETTINGS_KEY: &'static str = "grading.scale";

    pub fn percentage_of(&self, score: &SubjectScore) -> f64 {
        self.normalize(score.percentage())
    }

    pub fn normalize(&self, percentage: f64) -> f64 {
        if self.round_percentages {
            round_off_1_decimal(percentage)
        } else {
            percentage
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "gradeBands": self.grade_scale.bands(),
            "classificationBands": self.classification_scale.bands(),
            "fallbackLabel": self.classification_scale.fallback_label(),
            "bestOf": self.best_of,
            "roundPercentages": self.round_percentages,
        })
    }

    /// Applies a partial update. Either every field in `patch` is valid and
    /// applied, or `self` is left untouched.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let mut grade_bands: Vec<GradeBand> = self.grade_scale.bands().to_vec();
        let mut class_bands: Vec<ClassificationBand> = self.classification_scale.bands().to_vec();
        let mut fallback = self.classification_scale.fallback_label().to_string();
        let mut best_of = self.best_of;
        let mut round_percentages = self.round_percentages;

        for (k, v) in patch {
            match k.as_str() {
                "gradeBands" => grade_bands = parse_grade_bands(v)?,
                "classificationBands" => class_bands = parse_classification_bands(v)?,
                "fallbackLabel" => fallback = parse_label(v, k)?,
                "bestOf" => {
                    let n = v
                        .as_i64()
                        .ok_or_else(|| "bestOf must be integer".to_string())?;
                    if !(1..=MAX_BEST_OF).contains(&n) {
                        return Err(format!("bestOf must be in 1..={}", MAX_BEST_OF));
                    }
                    best_of = n as usize;
                }
                "roundPercentages" => {
                    round_percentages = v
                        .as_bool()
                        .ok_or_else(|| "roundPercentages must be boolean".to_string())?;
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            }
        }

        let grade_scale = GradeScale::new(grade_bands).map_err(|e| e.to_string())?;
        let classification_scale =
            ClassificationScale::new(class_bands, fallback).map_err(|e| e.to_string())?;
        *self = Self {
            grade_scale,
            classification_scale,
            best_of,
            round_percentages,
        };
        Ok(())
    }

    /// Rebuilds a config from a stored settings blob. Fields that no longer
    /// validate fall back to the defaults.
    pub fn from_saved(saved: Option<&Value>) -> Self {
        let mut cfg = Self::default();
        if let Some(obj) = saved.and_then(|v| v.as_object()) {
            if cfg.apply_patch(obj).is_err() {
                for (k, v) in obj {
                    let mut single = Map::new();
                    single.insert(k.clone(), v.clone());
                    let _ = cfg.apply_patch(&single);
                }
            }
        }
        cfg
    }
}

fn parse_label(v: &Value, key: &str) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be string", key))?
        .trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.len() > MAX_LABEL_LEN {
        return Err(format!("{} length must be <= {}", key, MAX_LABEL_LEN));
    }
    Ok(s.to_string())
}

fn parse_band_list(v: &Value, key: &str) -> Result<Vec<Map<String, Value>>, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array", key))?;
    if arr.len() > MAX_BANDS {
        return Err(format!("{} must have at most {} entries", key, MAX_BANDS));
    }
    arr.iter()
        .map(|item| {
            item.as_object()
                .cloned()
                .ok_or_else(|| format!("{} entries must be objects", key))
        })
        .collect()
}

fn parse_grade_bands(v: &Value) -> Result<Vec<GradeBand>, String> {
    parse_band_list(v, "gradeBands")?
        .iter()
        .map(|obj| {
            let lower_bound = obj
                .get("lowerBound")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| "gradeBands[].lowerBound must be a number".to_string())?;
            let symbol = parse_label(
                obj.get("symbol").unwrap_or(&Value::Null),
                "gradeBands[].symbol",
            )?;
            let label = match obj.get("label") {
                None | Some(Value::Null) => symbol.clone(),
                Some(v) => parse_label(v, "gradeBands[].label")?,
            };
            let weight = obj
                .get("weight")
                .and_then(|v| v.as_u64())
                .filter(|&n| n <= MAX_BAND_WEIGHT)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    format!("gradeBands[].weight must be an integer in 0..={}", MAX_BAND_WEIGHT)
                })?;
            Ok(GradeBand {
                lower_bound,
                symbol,
                label,
                weight,
            })
        })
        .collect()
}

fn parse_classification_bands(v: &Value) -> Result<Vec<ClassificationBand>, String> {
    parse_band_list(v, "classificationBands")?
        .iter()
        .map(|obj| {
            let max_aggregate = obj
                .get("maxAggregate")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    "classificationBands[].maxAggregate must be a non-negative integer".to_string()
                })?;
            let label = parse_label(
                obj.get("label").unwrap_or(&Value::Null),
                "classificationBands[].label",
            )?;
            Ok(ClassificationBand {
                max_aggregate,
                label,
            })
        })
        .collect()
}
