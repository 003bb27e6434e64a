//! FILENAME: analysis-engine/src/filter.rs
//! Analysis Filter - polymorphic row predicates.
//!
//! Filters serve two roles: user-facing report filters (source-field and
//! value filters, usually configured with bounds the user fills in) and
//! drilldown conditions (category filters appended by navigation). Every
//! filter wraps a condition checker configured Equal for a single value or
//! Between for a range, applied to the filter's row-specific raw value.

use std::rc::Rc;

use datasource::{AnalysisRow, ConditionChecker};

use crate::category::AnalysisCategory;
use crate::field::AnalysisField;

// ============================================================================
// FILTER VARIANTS
// ============================================================================

/// Predicate over a source field's raw column value.
#[derive(Debug, Clone)]
pub struct SourceFieldFilter {
    pub field: Rc<AnalysisField>,
    pub value: String,
    pub value_to: String,
    checker: ConditionChecker,
}

/// Predicate over the bucket key a category assigns to a row. Drilldown
/// conditions are category filters over the drilled category.
#[derive(Clone)]
pub struct CategoryFilter {
    pub category: Rc<AnalysisCategory>,
    pub value: String,
    checker: ConditionChecker,
}

impl std::fmt::Debug for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryFilter")
            .field("category", &self.category.key())
            .field("value", &self.value)
            .finish()
    }
}

/// Predicate over a value expression's text result.
#[derive(Debug, Clone)]
pub struct ValueFilter {
    pub field: Rc<AnalysisField>,
    pub value: String,
    pub value_to: String,
    checker: ConditionChecker,
}

/// The polymorphic filter.
#[derive(Debug, Clone)]
pub enum AnalysisFilter {
    SourceField(SourceFieldFilter),
    Category(CategoryFilter),
    Value(ValueFilter),
}

/// Equal for a single value, Between once an upper bound is present.
fn checker_for(value: &str, value_to: &str) -> ConditionChecker {
    if value_to.is_empty() {
        ConditionChecker::equal(value)
    } else {
        ConditionChecker::between(value, value_to)
    }
}

impl AnalysisFilter {
    pub fn source_field(
        field: Rc<AnalysisField>,
        value: impl Into<String>,
        value_to: impl Into<String>,
    ) -> Self {
        let value = value.into();
        let value_to = value_to.into();
        let checker = checker_for(&value, &value_to);
        AnalysisFilter::SourceField(SourceFieldFilter {
            field,
            value,
            value_to,
            checker,
        })
    }

    pub fn category(category: Rc<AnalysisCategory>, value: impl Into<String>) -> Self {
        let value = value.into();
        let checker = ConditionChecker::equal(value.clone());
        AnalysisFilter::Category(CategoryFilter {
            category,
            value,
            checker,
        })
    }

    pub fn value(
        field: Rc<AnalysisField>,
        value: impl Into<String>,
        value_to: impl Into<String>,
    ) -> Self {
        let value = value.into();
        let value_to = value_to.into();
        let checker = checker_for(&value, &value_to);
        AnalysisFilter::Value(ValueFilter {
            field,
            value,
            value_to,
            checker,
        })
    }

    /// True iff at least one bound is non-empty. Filters without values are
    /// configured but inactive.
    pub fn has_filter_values(&self) -> bool {
        match self {
            AnalysisFilter::SourceField(f) => !f.value.is_empty() || !f.value_to.is_empty(),
            AnalysisFilter::Category(f) => !f.value.is_empty(),
            AnalysisFilter::Value(f) => !f.value.is_empty() || !f.value_to.is_empty(),
        }
    }

    /// Tests the row's filter-specific raw value against the checker.
    pub fn matches_row(&self, row: &dyn AnalysisRow) -> bool {
        match self {
            AnalysisFilter::SourceField(f) => {
                let raw = f.field.raw_value_for_row(row).unwrap_or_default();
                f.checker.matches_string(&raw)
            }
            AnalysisFilter::Category(f) => {
                let raw = f.category.key_for_row(row).unwrap_or_default();
                f.checker.matches_string(&raw)
            }
            AnalysisFilter::Value(f) => {
                let raw = f.field.raw_value_for_row(row).unwrap_or_default();
                f.checker.matches_string(&raw)
            }
        }
    }

    /// The drilled category, for category filters.
    pub fn filter_category(&self) -> Option<&Rc<AnalysisCategory>> {
        match self {
            AnalysisFilter::Category(f) => Some(&f.category),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueFieldOptions;
    use crate::field::FieldFlags;
    use crate::testutil::{ColumnEvaluator, TestRow};

    fn stage_field() -> Rc<AnalysisField> {
        Rc::new(AnalysisField::source(
            "KP.0",
            "Stage",
            FieldFlags::default(),
            0,
            0,
            Vec::new(),
        ))
    }

    #[test]
    fn source_filter_equal_and_between() {
        let equal = AnalysisFilter::source_field(stage_field(), "Open", "");
        assert!(equal.has_filter_values());
        assert!(equal.matches_row(&TestRow::new(vec!["Open"])));
        assert!(!equal.matches_row(&TestRow::new(vec!["Won"])));

        let between = AnalysisFilter::source_field(stage_field(), "10", "20");
        assert!(between.matches_row(&TestRow::new(vec!["15"])));
        assert!(!between.matches_row(&TestRow::new(vec!["25"])));
    }

    #[test]
    fn filter_without_values_is_inactive() {
        let filter = AnalysisFilter::source_field(stage_field(), "", "");
        assert!(!filter.has_filter_values());
    }

    #[test]
    fn category_filter_matches_on_bucket_key() {
        let category = Rc::new(AnalysisCategory::source_field(stage_field(), 0));
        let filter = AnalysisFilter::category(category, "Open");
        assert!(filter.has_filter_values());
        assert!(filter.matches_row(&TestRow::new(vec!["Open"])));
        assert!(!filter.matches_row(&TestRow::new(vec!["Lost"])));
        assert!(filter.filter_category().is_some());
    }

    #[test]
    fn value_filter_matches_expression_result() {
        let field = Rc::new(AnalysisField::value(
            "v.owner",
            "Owner",
            "owner",
            ValueFieldOptions::default(),
            Some(Rc::new(ColumnEvaluator { column: 1 })),
        ));
        let filter = AnalysisFilter::value(field, "Alice", "");
        assert!(filter.matches_row(&TestRow::new(vec!["x", "Alice"])));
        assert!(!filter.matches_row(&TestRow::new(vec!["x", "Bob"])));
    }
}
