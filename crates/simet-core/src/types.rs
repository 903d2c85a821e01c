//! Metric values, acceptance bounds and the evaluation report

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Shape of a metric value or bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// A single number
    Scalar,
    /// A 2-tuple, one number per dimension
    Pair,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Pair => write!(f, "pair"),
        }
    }
}

/// Value produced by a restraint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Pair(f64, f64),
}

impl MetricValue {
    /// Shape of this value
    pub fn shape(&self) -> Shape {
        match self {
            Self::Scalar(_) => Shape::Scalar,
            Self::Pair(..) => Shape::Pair,
        }
    }

    /// The scalar value, if this is a scalar
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Pair(..) => None,
        }
    }

    /// The pair value, if this is a pair
    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match self {
            Self::Pair(a, b) => Some((*a, *b)),
            Self::Scalar(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v:.4}"),
            Self::Pair(a, b) => write!(f, "({a:.4}, {b:.4})"),
        }
    }
}

/// Inclusive acceptance interval over a metric's value space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Bound {
    /// `[lower, upper]` for scalar metrics
    Scalar { lower: f64, upper: f64 },

    /// One `[lower, upper]` interval per dimension for pair metrics
    Pair { lower: (f64, f64), upper: (f64, f64) },
}

impl Bound {
    /// Create a scalar bound, rejecting NaN and inverted intervals
    pub fn scalar(lower: f64, upper: f64) -> Result<Self> {
        check_interval("bound", lower, upper)?;
        Ok(Self::Scalar { lower, upper })
    }

    /// Create a pair bound, one interval per dimension
    pub fn pair(lower: (f64, f64), upper: (f64, f64)) -> Result<Self> {
        check_interval("bound[0]", lower.0, upper.0)?;
        check_interval("bound[1]", lower.1, upper.1)?;
        Ok(Self::Pair { lower, upper })
    }

    /// Shape of values this bound accepts
    pub fn shape(&self) -> Shape {
        match self {
            Self::Scalar { .. } => Shape::Scalar,
            Self::Pair { .. } => Shape::Pair,
        }
    }

    /// Whether every dimension of `value` lies within this bound, inclusive
    pub fn contains(&self, value: &MetricValue) -> Result<bool> {
        match (self, value) {
            (Self::Scalar { lower, upper }, MetricValue::Scalar(v)) => {
                Ok(within(*v, *lower, *upper))
            }
            (Self::Pair { lower, upper }, MetricValue::Pair(a, b)) => {
                Ok(within(*a, lower.0, upper.0) && within(*b, lower.1, upper.1))
            }
            _ => Err(Error::shape_mismatch(
                "bound check",
                self.shape(),
                value.shape(),
            )),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { lower, upper } => write!(f, "[{lower}, {upper}]"),
            Self::Pair { lower, upper } => write!(
                f,
                "[({}, {}), ({}, {})]",
                lower.0, lower.1, upper.0, upper.1
            ),
        }
    }
}

fn check_interval(what: &str, lower: f64, upper: f64) -> Result<()> {
    if lower.is_nan() || upper.is_nan() {
        return Err(Error::config(format!("{what} contains NaN")));
    }
    if lower > upper {
        return Err(Error::config(format!(
            "{what} is inverted: lower {lower} > upper {upper}"
        )));
    }
    Ok(())
}

// NaN never lies within a bound
fn within(value: f64, lower: f64, upper: f64) -> bool {
    value >= lower && value <= upper
}

/// Outcome of one restraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric name
    pub name: String,

    /// Computed value, same shape as `bound`
    pub value: MetricValue,

    /// Acceptance interval
    pub bound: Bound,

    /// Whether `value` lies within `bound`
    pub passed: bool,
}

impl MetricResult {
    /// Check `value` against `bound` and build the result
    pub fn check(name: impl Into<String>, value: MetricValue, bound: Bound) -> Result<Self> {
        let passed = bound.contains(&value)?;
        Ok(Self {
            name: name.into(),
            value,
            bound,
            passed,
        })
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Unique identifier of this run
    pub run_id: Uuid,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the run (milliseconds)
    pub duration_ms: u64,

    /// Metric results in configuration order
    pub results: Vec<MetricResult>,

    /// Conjunction of all `passed` flags
    pub passed: bool,
}

impl Report {
    /// Build a report; the overall verdict is derived from `results`
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        results: Vec<MetricResult>,
    ) -> Self {
        let passed = results.iter().all(|r| r.passed);
        Self {
            run_id,
            started_at,
            duration_ms,
            results,
            passed,
        }
    }

    /// Look up a result by metric name
    pub fn get(&self, name: &str) -> Option<&MetricResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Results that fell outside their bound
    pub fn failures(&self) -> impl Iterator<Item = &MetricResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
