//! FILENAME: analysis-engine/src/field.rs
//! Analysis Field - one classifiable/aggregatable quantity.
//!
//! A field is a shared core (key, label, role flags) plus variant data:
//! - `Source`: bound to a column of the executed query
//! - `Count`: "number of rows in table X", no column binding
//! - `Value`: bound to a named computed value expression
//! - `ExplicitBucket`: a parent field's raw value mapped through an
//!   explicit-category rule table
//!
//! Composition over inheritance: the explicit-bucket field HOLDS its rule
//! table rather than inheriting matching behavior.

use std::rc::Rc;

use smallvec::SmallVec;

use datasource::{AnalysisRow, ValueExpressionEvaluator};

use crate::config::{FieldAttributes, ValueFieldOptions};
use crate::explicit::ExplicitCategory;

// ============================================================================
// FIELD FLAGS
// ============================================================================

/// Decoded role flags of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    pub is_category: bool,
    pub is_filter: bool,
    pub is_result_column: bool,
    pub is_currency: bool,
    pub is_weight: bool,
    pub is_x_category: bool,
    pub is_default_category: bool,
    pub is_currency_dependent: bool,
    pub is_weight_dependent: bool,
    pub is_table_currency: bool,
    pub is_date_value: bool,
    pub do_not_sort: bool,
}

impl FieldFlags {
    /// Decodes the configuration bitmask. `is_date_column` comes from the
    /// query's column metadata and ORs into the date flag.
    pub fn from_attributes(attributes: FieldAttributes, is_date_column: bool) -> Self {
        FieldFlags {
            is_category: attributes.has(FieldAttributes::CATEGORY),
            is_filter: attributes.has(FieldAttributes::FILTER),
            is_result_column: attributes.has(FieldAttributes::RESULT_COLUMN),
            is_currency: attributes.has(FieldAttributes::CURRENCY),
            is_weight: attributes.has(FieldAttributes::WEIGHT),
            is_x_category: attributes.has(FieldAttributes::X_CATEGORY),
            is_default_category: attributes.has(FieldAttributes::DEFAULT_CATEGORY),
            is_currency_dependent: attributes.has(FieldAttributes::CURRENCY_DEPENDENT),
            is_weight_dependent: attributes.has(FieldAttributes::WEIGHT_DEPENDENT),
            is_table_currency: attributes.has(FieldAttributes::TABLE_CURRENCY),
            is_date_value: attributes.has(FieldAttributes::DATE_VALUE) || is_date_column,
            do_not_sort: attributes.has(FieldAttributes::DO_NOT_SORT),
        }
    }
}

// ============================================================================
// FIELD KIND
// ============================================================================

/// Variant data of a field.
pub enum FieldKind {
    /// Bound to one column of the executed query, with optional sub-value
    /// columns (multi-value columns).
    Source {
        table_index: usize,
        column_index: usize,
        sub_column_indices: Vec<usize>,
    },

    /// Row count of one table. Carries the table key and its query index.
    Count {
        table_key: String,
        query_table_index: usize,
    },

    /// Bound to a named computed value expression. The evaluator is absent
    /// when the host could not resolve the expression name; classification
    /// then yields the empty sentinel (tolerance policy).
    Value {
        expression_name: String,
        options: ValueFieldOptions,
        evaluator: Option<Rc<dyn ValueExpressionEvaluator>>,
    },

    /// Derived field: the parent's raw value mapped through an explicit
    /// category rule table.
    ExplicitBucket {
        parent: Rc<AnalysisField>,
        category: Rc<ExplicitCategory>,
    },
}

impl std::fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Source {
                table_index,
                column_index,
                sub_column_indices,
            } => f
                .debug_struct("Source")
                .field("table_index", table_index)
                .field("column_index", column_index)
                .field("sub_column_indices", sub_column_indices)
                .finish(),
            FieldKind::Count {
                table_key,
                query_table_index,
            } => f
                .debug_struct("Count")
                .field("table_key", table_key)
                .field("query_table_index", query_table_index)
                .finish(),
            FieldKind::Value {
                expression_name, ..
            } => f
                .debug_struct("Value")
                .field("expression_name", expression_name)
                .finish(),
            FieldKind::ExplicitBucket { parent, category } => f
                .debug_struct("ExplicitBucket")
                .field("parent", &parent.key)
                .field("category", &category.name())
                .finish(),
        }
    }
}

// ============================================================================
// ANALYSIS FIELD
// ============================================================================

/// One field of the assembled analysis graph. Immutable after assembly;
/// shared via `Rc` by tables, categories, filters, and result columns.
#[derive(Debug)]
pub struct AnalysisField {
    /// Unique key within the owning analysis's field map.
    pub key: String,

    /// Display label.
    pub label: String,

    /// Decoded role flags.
    pub flags: FieldFlags,

    /// Variant data.
    pub kind: FieldKind,
}

impl AnalysisField {
    pub fn source(
        key: impl Into<String>,
        label: impl Into<String>,
        flags: FieldFlags,
        table_index: usize,
        column_index: usize,
        sub_column_indices: Vec<usize>,
    ) -> Self {
        AnalysisField {
            key: key.into(),
            label: label.into(),
            flags,
            kind: FieldKind::Source {
                table_index,
                column_index,
                sub_column_indices,
            },
        }
    }

    pub fn count(
        key: impl Into<String>,
        label: impl Into<String>,
        table_key: impl Into<String>,
        query_table_index: usize,
    ) -> Self {
        AnalysisField {
            key: key.into(),
            label: label.into(),
            flags: FieldFlags::default(),
            kind: FieldKind::Count {
                table_key: table_key.into(),
                query_table_index,
            },
        }
    }

    pub fn value(
        key: impl Into<String>,
        label: impl Into<String>,
        expression_name: impl Into<String>,
        options: ValueFieldOptions,
        evaluator: Option<Rc<dyn ValueExpressionEvaluator>>,
    ) -> Self {
        let mut flags = FieldFlags::default();
        flags.is_category = options.is_categorizable();
        flags.is_default_category = options.is_default_category;
        flags.is_x_category = options.is_x_category;
        flags.is_result_column = true;
        AnalysisField {
            key: key.into(),
            label: label.into(),
            flags,
            kind: FieldKind::Value {
                expression_name: expression_name.into(),
                options,
                evaluator,
            },
        }
    }

    /// Derived explicit-bucket field. Key is `parent.key(categoryName)`.
    pub fn explicit_bucket(parent: Rc<AnalysisField>, category: Rc<ExplicitCategory>) -> Self {
        let key = format!("{}({})", parent.key, category.name());
        let label = parent.label.clone();
        let mut flags = parent.flags;
        flags.is_category = true;
        AnalysisField {
            key,
            label,
            flags,
            kind: FieldKind::ExplicitBucket { parent, category },
        }
    }

    /// The raw classification value of this field for a row.
    ///
    /// `None` means the field has no per-row raw value (count fields). An
    /// explicit-bucket field's raw value is the key of the single bucket its
    /// parent's raw value resolves to.
    pub fn raw_value_for_row(&self, row: &dyn AnalysisRow) -> Option<String> {
        match &self.kind {
            FieldKind::Source { column_index, .. } => {
                Some(row.raw_value_at(*column_index).to_string())
            }
            FieldKind::Count { .. } => None,
            FieldKind::Value { evaluator, .. } => {
                Some(evaluator.as_ref()?.text_for_row(row).unwrap_or_default())
            }
            FieldKind::ExplicitBucket { parent, category } => {
                let raw = parent.raw_value_for_row(row)?;
                if raw.is_empty() {
                    return Some(String::new());
                }
                Some(
                    category
                        .category_value_for_value(&raw)
                        .map(|m| m.key)
                        .unwrap_or_default(),
                )
            }
        }
    }

    /// All bucket keys of an explicit-bucket field for a row (array
    /// resolution). Non-explicit fields return their single raw value.
    pub fn raw_value_array_for_row(&self, row: &dyn AnalysisRow) -> SmallVec<[String; 2]> {
        match &self.kind {
            FieldKind::ExplicitBucket { parent, category } => {
                let raw = match parent.raw_value_for_row(row) {
                    Some(raw) if !raw.is_empty() => raw,
                    _ => return SmallVec::new(),
                };
                category
                    .category_value_array_for_value(&raw)
                    .into_iter()
                    .map(|m| m.key)
                    .collect()
            }
            _ => self
                .raw_value_for_row(row)
                .into_iter()
                .filter(|raw| !raw.is_empty())
                .collect(),
        }
    }

    /// Raw sub-values of a multi-value source column, in declaration order.
    pub fn sub_values_for_row(&self, row: &dyn AnalysisRow) -> SmallVec<[String; 2]> {
        match &self.kind {
            FieldKind::Source {
                sub_column_indices, ..
            } => sub_column_indices
                .iter()
                .map(|&idx| row.raw_value_at(idx).to_string())
                .filter(|raw| !raw.is_empty())
                .collect(),
            _ => SmallVec::new(),
        }
    }

    /// The formatted display value for a row, used as category value labels.
    pub fn display_value_for_row(&self, row: &dyn AnalysisRow) -> Option<String> {
        match &self.kind {
            FieldKind::Source { column_index, .. } => Some(row.value_at(*column_index).to_string()),
            _ => self.raw_value_for_row(row),
        }
    }

    /// The query column this field is bound to, if any.
    pub fn column_index(&self) -> Option<usize> {
        match &self.kind {
            FieldKind::Source { column_index, .. } => Some(*column_index),
            _ => None,
        }
    }

    /// The wrapped explicit category for explicit-bucket fields.
    pub fn explicit_category(&self) -> Option<&Rc<ExplicitCategory>> {
        match &self.kind {
            FieldKind::ExplicitBucket { category, .. } => Some(category),
            _ => None,
        }
    }

    /// The parent field for explicit-bucket fields.
    pub fn parent_field(&self) -> Option<&Rc<AnalysisField>> {
        match &self.kind {
            FieldKind::ExplicitBucket { parent, .. } => Some(parent),
            _ => None,
        }
    }

    /// Value-field options, when this is a value field.
    pub fn value_options(&self) -> Option<&ValueFieldOptions> {
        match &self.kind {
            FieldKind::Value { options, .. } => Some(options),
            _ => None,
        }
    }

    /// The value-expression evaluator, when this is a resolvable value field.
    pub fn evaluator(&self) -> Option<&Rc<dyn ValueExpressionEvaluator>> {
        match &self.kind {
            FieldKind::Value { evaluator, .. } => evaluator.as_ref(),
            _ => None,
        }
    }
}
