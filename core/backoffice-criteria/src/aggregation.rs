//! Aggregation requests.
//!
//! Aggregations are computed server-side over the full result set (not just
//! the current page) and come back in the response's `aggregations` map,
//! keyed by the aggregation name.

use crate::filter::Filter;
use crate::sorting::Sorting;
use serde::{Deserialize, Serialize};

/// A named aggregation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Aggregation {
    Count {
        name: String,
        field: String,
    },
    Sum {
        name: String,
        field: String,
    },
    Avg {
        name: String,
        field: String,
    },
    Min {
        name: String,
        field: String,
    },
    Max {
        name: String,
        field: String,
    },
    Stats {
        name: String,
        field: String,
    },
    /// Distinct values of `field` with their counts.
    Terms {
        name: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort: Option<Sorting>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aggregation: Option<Box<Aggregation>>,
    },
    /// Loads the entities of `definition` referenced by `field`.
    Entity {
        name: String,
        field: String,
        definition: String,
    },
    /// Applies `filter` before running the nested aggregation.
    Filter {
        name: String,
        filter: Vec<Filter>,
        aggregation: Box<Aggregation>,
    },
    /// Buckets a date field by `interval` (e.g. `day`, `month`).
    Histogram {
        name: String,
        field: String,
        interval: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aggregation: Option<Box<Aggregation>>,
        #[serde(
            rename = "timeZone",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        time_zone: Option<String>,
    },
}

impl Aggregation {
    /// The name the result is reported under.
    pub fn name(&self) -> &str {
        match self {
            Aggregation::Count { name, .. }
            | Aggregation::Sum { name, .. }
            | Aggregation::Avg { name, .. }
            | Aggregation::Min { name, .. }
            | Aggregation::Max { name, .. }
            | Aggregation::Stats { name, .. }
            | Aggregation::Terms { name, .. }
            | Aggregation::Entity { name, .. }
            | Aggregation::Filter { name, .. }
            | Aggregation::Histogram { name, .. } => name,
        }
    }
}
