use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single cell of a processed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ReportValue {
    /// Numeric view of the value. Text parses when it looks like a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReportValue::Integer(value) => Some(*value as f64),
            ReportValue::Float(value) => Some(*value),
            ReportValue::Text(value) => value.trim().parse().ok(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ReportValue::Integer(value) => Some(*value),
            ReportValue::Float(value) => Some(*value as i64),
            ReportValue::Text(value) => value.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ReportValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportValue::Integer(value) => write!(f, "{}", value),
            ReportValue::Float(value) => write!(f, "{}", value),
            ReportValue::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for ReportValue {
    fn from(value: i64) -> Self {
        ReportValue::Integer(value)
    }
}

impl From<f64> for ReportValue {
    fn from(value: f64) -> Self {
        ReportValue::Float(value)
    }
}

impl From<&str> for ReportValue {
    fn from(value: &str) -> Self {
        ReportValue::Text(value.to_string())
    }
}

impl From<String> for ReportValue {
    fn from(value: String) -> Self {
        ReportValue::Text(value)
    }
}

/// One report row: column name to value.
pub type ReportRow = BTreeMap<String, ReportValue>;

/// Processed report: dimension and metric names plus rows in API order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    dimensions: Vec<String>,
    metrics: Vec<String>,
    rows: Vec<ReportRow>,
}

impl AnalyticsReport {
    pub fn new(dimensions: Vec<String>, metrics: Vec<String>, rows: Vec<ReportRow>) -> Self {
        AnalyticsReport {
            dimensions,
            metrics,
            rows,
        }
    }

    /// Dimension names in header order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Metric names in header order.
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Consumes the report, returning the rows.
    pub fn into_rows(self) -> Vec<ReportRow> {
        self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<String>, Vec<ReportRow>) {
        (self.dimensions, self.metrics, self.rows)
    }

    pub fn row(&self, index: usize) -> Option<&ReportRow> {
        self.rows.get(index)
    }

    pub fn first_row(&self) -> Option<&ReportRow> {
        self.rows.first()
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Metric value from the first row.
    pub fn metric_value(&self, name: &str) -> Option<&ReportValue> {
        self.first_row().and_then(|row| row.get(name))
    }

    /// Dimension value from the first row.
    pub fn dimension_value(&self, name: &str) -> Option<&str> {
        self.first_row()
            .and_then(|row| row.get(name))
            .and_then(ReportValue::as_str)
    }

    /// Values of one column across all rows; rows lacking the column are skipped.
    pub fn column(&self, name: &str) -> Vec<&ReportValue> {
        self.rows.iter().filter_map(|row| row.get(name)).collect()
    }
}
