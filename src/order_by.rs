use crate::api::data::{DimensionOrderBy, MetricOrderBy, ReportOrderBy};
use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// "Order by metric or dimension X" for a report request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    name: String,
    is_metric: bool,
    direction: Direction,
}

impl OrderBy {
    /// Orders by a metric, highest first.
    pub fn metric(name: impl Into<String>) -> Self {
        Self::metric_with(name, Direction::Desc)
    }

    pub fn metric_with(name: impl Into<String>, direction: Direction) -> Self {
        OrderBy {
            name: name.into(),
            is_metric: true,
            direction,
        }
    }

    /// Orders by a dimension, ascending (chronological for `date`).
    pub fn dimension(name: impl Into<String>) -> Self {
        Self::dimension_with(name, Direction::Asc)
    }

    pub fn dimension_with(name: impl Into<String>, direction: Direction) -> Self {
        OrderBy {
            name: name.into(),
            is_metric: false,
            direction,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_metric(&self) -> bool {
        self.is_metric
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn to_wire(&self) -> ReportOrderBy {
        let (metric, dimension) = if self.is_metric {
            (
                Some(MetricOrderBy {
                    metric_name: self.name.clone(),
                }),
                None,
            )
        } else {
            (
                None,
                Some(DimensionOrderBy {
                    dimension_name: self.name.clone(),
                }),
            )
        };

        ReportOrderBy {
            metric,
            dimension,
            desc: self.direction == Direction::Desc,
        }
    }
}
