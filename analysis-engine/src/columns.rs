//! FILENAME: analysis-engine/src/columns.rs
//! Analysis Result Columns - the aggregatable, reportable columns.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::field::AnalysisField;

/// Aggregation applied to a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    Sum,
    Count,
    Static,
    Average,
    Min,
    Max,
}

impl Default for AggregationKind {
    fn default() -> Self {
        AggregationKind::Sum
    }
}

impl AggregationKind {
    fn tag(&self) -> &'static str {
        match self {
            AggregationKind::Sum => "sum",
            AggregationKind::Count => "count",
            AggregationKind::Static => "static",
            AggregationKind::Average => "avg",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
        }
    }
}

/// Variant data of a result column.
#[derive(Debug)]
pub enum ResultColumnKind {
    /// Row count of one table.
    TableCount {
        table_key: String,
        query_table_index: usize,
    },

    /// A source field flagged as result column.
    SourceField { field: Rc<AnalysisField> },

    /// A computed value field.
    Value { field: Rc<AnalysisField> },
}

/// One aggregatable column of the rendered report, keyed identically to its
/// source field or table.
#[derive(Debug)]
pub struct AnalysisResultColumn {
    pub key: String,
    pub label: String,
    pub aggregation: AggregationKind,
    pub kind: ResultColumnKind,
}

impl AnalysisResultColumn {
    /// "Row count for this table" column, keyed by the table key.
    pub fn table_count(
        table_key: impl Into<String>,
        label: impl Into<String>,
        query_table_index: usize,
    ) -> Self {
        let table_key = table_key.into();
        AnalysisResultColumn {
            key: table_key.clone(),
            label: label.into(),
            aggregation: AggregationKind::Count,
            kind: ResultColumnKind::TableCount {
                table_key,
                query_table_index,
            },
        }
    }

    pub fn source_field(field: Rc<AnalysisField>) -> Self {
        AnalysisResultColumn {
            key: field.key.clone(),
            label: field.label.clone(),
            aggregation: AggregationKind::Sum,
            kind: ResultColumnKind::SourceField { field },
        }
    }

    pub fn value_field(field: Rc<AnalysisField>) -> Self {
        let aggregation = match field.value_options() {
            Some(options) if options.is_static => AggregationKind::Static,
            _ => AggregationKind::Sum,
        };
        AnalysisResultColumn {
            key: field.key.clone(),
            label: field.label.clone(),
            aggregation,
            kind: ResultColumnKind::Value { field },
        }
    }

    /// A copy of this column re-keyed for a different aggregation, so the
    /// same source column can appear once per aggregation type.
    pub fn rekeyed(&self, aggregation: AggregationKind) -> Self {
        AnalysisResultColumn {
            key: format!("{}:{}", self.key, aggregation.tag()),
            label: self.label.clone(),
            aggregation,
            kind: match &self.kind {
                ResultColumnKind::TableCount {
                    table_key,
                    query_table_index,
                } => ResultColumnKind::TableCount {
                    table_key: table_key.clone(),
                    query_table_index: *query_table_index,
                },
                ResultColumnKind::SourceField { field } => ResultColumnKind::SourceField {
                    field: Rc::clone(field),
                },
                ResultColumnKind::Value { field } => ResultColumnKind::Value {
                    field: Rc::clone(field),
                },
            },
        }
    }
}
