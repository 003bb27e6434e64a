//! FILENAME: datasource/src/lib.rs
//! Data-source contracts shared between the analysis engine and the host application.
//!
//! This crate plays the "shared types" role for `analysis-engine`: it defines
//! the collaborator surfaces the engine consumes but never implements: row
//! access, result-table metadata, condition checking, value-expression
//! evaluation, and currency conversion. The host CRM's query layer provides
//! the real implementations; tests provide doubles.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

// ============================================================================
// COMPARISON / CONDITION CHECKING
// ============================================================================

/// Comparison operators understood by a [`ConditionChecker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
}

impl Default for CompareOp {
    fn default() -> Self {
        CompareOp::Equal
    }
}

/// Evaluates a single comparison against a raw string value.
///
/// Constructed with an operator, a value, and (for `Between`) an upper bound.
/// Comparison is numeric when both operands parse as numbers and falls back
/// to byte-wise string ordering otherwise; fixed-width raws such as
/// `YYYYMMDD` dates order correctly under either rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionChecker {
    pub operator: CompareOp,
    pub value: String,
    pub value_to: String,
}

impl ConditionChecker {
    pub fn new(operator: CompareOp, value: impl Into<String>, value_to: impl Into<String>) -> Self {
        ConditionChecker {
            operator,
            value: value.into(),
            value_to: value_to.into(),
        }
    }

    /// Convenience constructor for an equality check.
    pub fn equal(value: impl Into<String>) -> Self {
        ConditionChecker::new(CompareOp::Equal, value, "")
    }

    /// Convenience constructor for a closed range check.
    pub fn between(value: impl Into<String>, value_to: impl Into<String>) -> Self {
        ConditionChecker::new(CompareOp::Between, value, value_to)
    }

    /// Tests the raw string value against this checker's condition.
    pub fn matches_string(&self, raw: &str) -> bool {
        match self.operator {
            CompareOp::Equal => compare_raw(raw, &self.value) == std::cmp::Ordering::Equal,
            CompareOp::NotEqual => compare_raw(raw, &self.value) != std::cmp::Ordering::Equal,
            CompareOp::GreaterThan => compare_raw(raw, &self.value) == std::cmp::Ordering::Greater,
            CompareOp::GreaterThanOrEqual => {
                compare_raw(raw, &self.value) != std::cmp::Ordering::Less
            }
            CompareOp::LessThan => compare_raw(raw, &self.value) == std::cmp::Ordering::Less,
            CompareOp::LessThanOrEqual => {
                compare_raw(raw, &self.value) != std::cmp::Ordering::Greater
            }
            CompareOp::Between => {
                compare_raw(raw, &self.value) != std::cmp::Ordering::Less
                    && compare_raw(raw, &self.value_to) != std::cmp::Ordering::Greater
            }
        }
    }
}

/// Compares two raw strings numerically when both parse, textually otherwise.
fn compare_raw(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(na), Ok(nb)) => na.partial_cmp(&nb).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

// ============================================================================
// RESULT TABLE / COLUMN METADATA
// ============================================================================

/// Broad type classification for a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Numeric,
    Date,
    Boolean,
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::Text
    }
}

/// Metadata for one column of a result table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Display name from the source schema.
    pub name: String,

    /// Broad field type reported by the source.
    #[serde(default)]
    pub column_type: ColumnType,

    /// Column indices (relative to the owning table) that hold sub-values
    /// of this column. Declares multi-value columns.
    #[serde(default)]
    pub sub_field_indices: Vec<usize>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnMeta {
            name: name.into(),
            column_type: ColumnType::Text,
            sub_field_indices: Vec::new(),
        }
    }

    pub fn date(name: impl Into<String>) -> Self {
        ColumnMeta {
            name: name.into(),
            column_type: ColumnType::Date,
            sub_field_indices: Vec::new(),
        }
    }

    pub fn is_date(&self) -> bool {
        self.column_type == ColumnType::Date
    }

    /// An empty raw is the source's representation of "no value".
    pub fn is_empty_value(&self, raw: &str) -> bool {
        raw.is_empty() || (self.column_type == ColumnType::Numeric && raw == "0")
    }
}

/// Metadata for one result table (a logical source-table occurrence) of an
/// executed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    /// Identifier of the source area this table reads from.
    pub info_area_id: String,

    /// Column metadata in query column order.
    pub columns: Vec<ColumnMeta>,
}

impl TableMeta {
    pub fn new(info_area_id: impl Into<String>, columns: Vec<ColumnMeta>) -> Self {
        TableMeta {
            info_area_id: info_area_id.into(),
            columns,
        }
    }

    pub fn number_of_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn column_at(&self, index: usize) -> Option<&ColumnMeta> {
        self.columns.get(index)
    }
}

/// Supplies the result-table layout of the executed query the analysis is
/// bound to. The configuration assembler walks this once at build time.
pub trait AnalysisDataSource {
    fn result_tables(&self) -> &[TableMeta];
}

// ============================================================================
// ROW ACCESS
// ============================================================================

/// One data row of a query result. All classification reads go through the
/// two value accessors only.
pub trait AnalysisRow {
    /// The raw, unformatted string value at a global column index.
    fn raw_value_at(&self, column: usize) -> &str;

    /// The formatted display value at a global column index.
    fn value_at(&self, column: usize) -> &str;

    /// The record identification for the table at the given query table index.
    fn record_identification_at(&self, table_index: usize) -> &str;
}

/// A raw query result: the rows handed from the execution context to
/// aggregation. Consumed opaquely by the engine apart from row iteration.
pub trait ResultSet {
    fn row_count(&self) -> usize;

    fn row_at(&self, index: usize) -> Option<&dyn AnalysisRow>;
}

// ============================================================================
// VALUE EXPRESSION EVALUATION
// ============================================================================

/// Evaluates one configured value expression against a data row.
///
/// The expression sublanguage itself lives outside this engine; results come
/// back either as a single text value or as an array of text values.
pub trait ValueExpressionEvaluator {
    fn text_for_row(&self, row: &dyn AnalysisRow) -> Option<String>;

    fn array_for_row(&self, row: &dyn AnalysisRow) -> Option<Vec<String>>;
}

/// Resolves a configured expression name to its evaluator.
pub trait ValueEvaluatorProvider {
    fn evaluator_for(&self, expression_name: &str) -> Option<Rc<dyn ValueExpressionEvaluator>>;
}

// ============================================================================
// CURRENCY CONVERSION
// ============================================================================

/// Supplies the default currency conversion and the base catalog code.
/// Consumed opaquely; the engine only records that conversion is required
/// and which base code applies.
pub trait CurrencyConversionProvider {
    fn base_currency_code(&self) -> &str;
}
