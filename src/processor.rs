//! Normalisation of raw `runReport` responses into [`AnalyticsReport`]s.

use crate::api::data::RunReportResponse;
use crate::error::TypeCastError;
use crate::report::{AnalyticsReport, ReportRow, ReportValue};
use crate::type_caster::cast_value;

pub const AVG_ENGAGEMENT_SECONDS: &str = "avgEngagementSeconds";

const TRANSACTION_ID_FIELDS: [&str; 2] = ["transactionId", "purchaseTransactionId"];
const REVENUE_FIELDS: [&str; 2] = ["totalRevenue", "purchaseRevenue"];

/// Turns tabular responses into reports and applies per-report post-processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportProcessor;

impl ReportProcessor {
    pub fn new() -> Self {
        ReportProcessor
    }

    /// Maps each row onto the headers by position.
    ///
    /// Dimension values are kept as strings; metric values are cast using
    /// the type declared on their header.
    ///
    /// # Errors
    /// Returns `TypeCastError` when a metric value does not match its type.
    pub fn process_report(&self, response: &RunReportResponse) -> Result<AnalyticsReport, TypeCastError> {
        let dimensions: Vec<String> = response
            .dimension_headers
            .iter()
            .map(|header| header.name.clone())
            .collect();
        let metrics: Vec<String> = response
            .metric_headers
            .iter()
            .map(|header| header.name.clone())
            .collect();

        let mut rows = Vec::with_capacity(response.rows.len());
        for row in &response.rows {
            let mut result = ReportRow::new();

            for (header, cell) in response.dimension_headers.iter().zip(&row.dimension_values) {
                result.insert(header.name.clone(), ReportValue::Text(cell.value.clone()));
            }

            for (header, cell) in response.metric_headers.iter().zip(&row.metric_values) {
                let value = cast_value(&cell.value, &header.metric_type)?;
                result.insert(header.name.clone(), value);
            }

            rows.push(result);
        }

        Ok(AnalyticsReport::new(dimensions, metrics, rows))
    }

    /// Adds `avgEngagementSeconds = round(userEngagementDuration / totalUsers, 2)`
    /// to every row (0 when there are no users).
    pub fn process_most_viewed_pages_report(
        &self,
        response: &RunReportResponse,
    ) -> Result<AnalyticsReport, TypeCastError> {
        let (dimensions, mut metrics, mut rows) = self.process_report(response)?.into_parts();

        for row in &mut rows {
            let users = row.get("totalUsers").and_then(ReportValue::as_i64).unwrap_or(0);
            let duration = row.get("userEngagementDuration").and_then(ReportValue::as_f64);

            let average = match duration {
                Some(duration) if users > 0 => round2(duration / users as f64),
                _ => 0.0,
            };
            row.insert(AVG_ENGAGEMENT_SECONDS.to_string(), ReportValue::Float(average));
        }

        metrics.push(AVG_ENGAGEMENT_SECONDS.to_string());
        Ok(AnalyticsReport::new(dimensions, metrics, rows))
    }

    /// Copies the transaction id and revenue columns into the canonical
    /// `transactionId` and `transactionRevenue` fields.
    pub fn process_transactions_report(
        &self,
        response: &RunReportResponse,
    ) -> Result<AnalyticsReport, TypeCastError> {
        let (dimensions, metrics, mut rows) = self.process_report(response)?.into_parts();

        for row in &mut rows {
            if let Some(id) = last_present(row, &TRANSACTION_ID_FIELDS) {
                row.insert("transactionId".to_string(), id);
            }
            if let Some(revenue) = last_present(row, &REVENUE_FIELDS) {
                row.insert("transactionRevenue".to_string(), revenue);
            }
        }

        Ok(AnalyticsReport::new(dimensions, metrics, rows))
    }
}

/// Value of the last field in `fields` present on the row.
fn last_present(row: &ReportRow, fields: &[&str]) -> Option<ReportValue> {
    fields.iter().rev().find_map(|field| row.get(*field).cloned())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
