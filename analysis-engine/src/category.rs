//! FILENAME: analysis-engine/src/category.rs
//! Analysis Category - the per-row classification strategies.
//!
//! A category maps one data row to zero, one, or many category values.
//! Three strategies exist:
//! - `SourceField`: bucket = the field's raw value (plus sub-values for
//!   multi-value columns); blank rows map to the shared empty sentinel
//! - `ExplicitField`: the wrapped explicit-bucket field resolves the parent
//!   raw value through its rule table
//! - `Value`: bucket = the text or array result of a value expression
//!
//! Every category owns its value dictionary: buckets materialize on first
//! encounter and are identity-cached for the category's lifetime.

use std::rc::Rc;

use smallvec::SmallVec;

use datasource::AnalysisRow;

use crate::field::{AnalysisField, FieldKind};
use crate::value::{AnalysisCategoryValue, CategoryValueDictionary};

/// Per-row classification output. Most rows land in one bucket; array
/// categories can produce several.
pub type CategoryValues = SmallVec<[Rc<AnalysisCategoryValue>; 2]>;

// ============================================================================
// CATEGORY VARIANTS
// ============================================================================

/// Buckets rows by a source field's raw value.
pub struct SourceFieldCategory {
    field: Rc<AnalysisField>,
    values: CategoryValueDictionary,
    max_rows: usize,
}

/// Buckets rows through an explicit-bucket field's rule table.
pub struct ExplicitCategoryFieldCategory {
    field: Rc<AnalysisField>,
    values: CategoryValueDictionary,
}

/// Buckets rows by the result of a value expression.
pub struct ValueCategory {
    field: Rc<AnalysisField>,
    values: CategoryValueDictionary,
    max_rows: usize,
}

/// The polymorphic category. Interior caches make `&self` classification
/// possible, so categories are shared as plain `Rc`s.
pub enum AnalysisCategory {
    SourceField(SourceFieldCategory),
    ExplicitField(ExplicitCategoryFieldCategory),
    Value(ValueCategory),
}

impl std::fmt::Debug for AnalysisCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCategory")
            .field("key", &self.key())
            .finish()
    }
}

impl AnalysisCategory {
    pub fn source_field(field: Rc<AnalysisField>, max_rows: usize) -> Self {
        AnalysisCategory::SourceField(SourceFieldCategory {
            field,
            values: CategoryValueDictionary::new(),
            max_rows,
        })
    }

    /// `field` must be an explicit-bucket field; its rule table drives the
    /// classification.
    pub fn explicit_field(field: Rc<AnalysisField>) -> Self {
        debug_assert!(matches!(field.kind, FieldKind::ExplicitBucket { .. }));
        AnalysisCategory::ExplicitField(ExplicitCategoryFieldCategory {
            field,
            values: CategoryValueDictionary::new(),
        })
    }

    pub fn value(field: Rc<AnalysisField>, max_rows: usize) -> Self {
        AnalysisCategory::Value(ValueCategory {
            field,
            values: CategoryValueDictionary::new(),
            max_rows,
        })
    }

    /// Category key: the key of the underlying field.
    pub fn key(&self) -> &str {
        &self.field().key
    }

    pub fn label(&self) -> &str {
        &self.field().label
    }

    pub fn field(&self) -> &Rc<AnalysisField> {
        match self {
            AnalysisCategory::SourceField(c) => &c.field,
            AnalysisCategory::ExplicitField(c) => &c.field,
            AnalysisCategory::Value(c) => &c.field,
        }
    }

    /// Whether one row may land in several buckets.
    pub fn is_array_category(&self) -> bool {
        match self {
            AnalysisCategory::SourceField(c) => match &c.field.kind {
                FieldKind::Source {
                    sub_column_indices, ..
                } => !sub_column_indices.is_empty(),
                _ => false,
            },
            AnalysisCategory::ExplicitField(c) => c
                .field
                .explicit_category()
                .map(|ec| ec.is_array())
                .unwrap_or(false),
            AnalysisCategory::Value(_) => true,
        }
    }

    /// Upper bound on distinct buckets the renderer reports. 0 = unbounded.
    pub fn max_number_of_rows(&self) -> usize {
        match self {
            AnalysisCategory::SourceField(c) => c.max_rows,
            AnalysisCategory::ExplicitField(_) => 0,
            AnalysisCategory::Value(c) => c.max_rows,
        }
    }

    /// Whether the renderer sorts buckets by key.
    pub fn sort_by_key(&self) -> bool {
        match self {
            // Date raws (YYYYMMDD) sort chronologically by key.
            AnalysisCategory::SourceField(c) => c.field.flags.is_date_value,
            AnalysisCategory::ExplicitField(_) => false,
            AnalysisCategory::Value(c) => c
                .field
                .value_options()
                .and_then(|o| o.sort_by.as_deref())
                .map(|s| s == "key")
                .unwrap_or(false),
        }
    }

    /// Whether the renderer sorts buckets by the first result column.
    /// Explicit-field categories delegate to the wrapped source field's
    /// do-not-sort flag, defaulting to sort unless suppressed.
    pub fn sort_by_first_column_value(&self) -> bool {
        match self {
            AnalysisCategory::SourceField(c) => {
                !c.field.flags.do_not_sort && !self.sort_by_key()
            }
            AnalysisCategory::ExplicitField(c) => {
                let do_not_sort = c
                    .field
                    .parent_field()
                    .map(|p| p.flags.do_not_sort)
                    .unwrap_or(false);
                !do_not_sort
            }
            AnalysisCategory::Value(c) => c
                .field
                .value_options()
                .and_then(|o| o.sort_by.as_deref())
                .map(|s| s == "value")
                .unwrap_or(true),
        }
    }

    /// The bucket key this row classifies to, without materializing a value.
    pub fn key_for_row(&self, row: &dyn AnalysisRow) -> Option<String> {
        self.field().raw_value_for_row(row)
    }

    /// Single-bucket classification.
    pub fn category_value_for_row(&self, row: &dyn AnalysisRow) -> Option<Rc<AnalysisCategoryValue>> {
        match self {
            AnalysisCategory::SourceField(c) => Some(c.value_for_row(row)),
            AnalysisCategory::ExplicitField(c) => c.value_for_row(row),
            AnalysisCategory::Value(c) => Some(c.single_value_for_row(row)),
        }
    }

    /// Full classification: zero, one, or many buckets.
    pub fn category_values_for_row(&self, row: &dyn AnalysisRow) -> CategoryValues {
        match self {
            AnalysisCategory::SourceField(c) => c.values_for_row(row),
            AnalysisCategory::ExplicitField(c) => c.values_for_row(row),
            AnalysisCategory::Value(c) => c.values_for_row(row),
        }
    }

    /// Distinct non-empty buckets materialized so far. Exposed for tests.
    pub fn materialized_value_count(&self) -> usize {
        match self {
            AnalysisCategory::SourceField(c) => c.values.len(),
            AnalysisCategory::ExplicitField(c) => c.values.len(),
            AnalysisCategory::Value(c) => c.values.len(),
        }
    }
}

// ============================================================================
// SOURCE FIELD CATEGORY
// ============================================================================

impl SourceFieldCategory {
    fn value_for_row(&self, row: &dyn AnalysisRow) -> Rc<AnalysisCategoryValue> {
        let raw = self.field.raw_value_for_row(row).unwrap_or_default();
        if raw.is_empty() {
            return self.values.empty_value();
        }
        let label = self.field.display_value_for_row(row).unwrap_or_default();
        self.values.get_or_create(&raw, &label, None)
    }

    fn values_for_row(&self, row: &dyn AnalysisRow) -> CategoryValues {
        let mut out = CategoryValues::new();
        out.push(self.value_for_row(row));
        // Sub-values of multi-value columns classify alongside the main value.
        for sub in self.field.sub_values_for_row(row) {
            out.push(self.values.get_or_create(&sub, &sub, None));
        }
        out
    }
}

// ============================================================================
// EXPLICIT CATEGORY FIELD CATEGORY
// ============================================================================

impl ExplicitCategoryFieldCategory {
    fn value_for_row(&self, row: &dyn AnalysisRow) -> Option<Rc<AnalysisCategoryValue>> {
        let parent = self.field.parent_field()?;
        let raw = parent.raw_value_for_row(row)?;
        if raw.is_empty() {
            return None;
        }
        let matched = self.field.explicit_category()?.category_value_for_value(&raw)?;
        Some(self.values.get_or_create(
            &matched.key,
            &matched.label,
            matched.sub_category.as_deref(),
        ))
    }

    fn values_for_row(&self, row: &dyn AnalysisRow) -> CategoryValues {
        let (parent, category) = match (self.field.parent_field(), self.field.explicit_category()) {
            (Some(p), Some(c)) => (p, c),
            _ => return CategoryValues::new(),
        };
        let raw = match parent.raw_value_for_row(row) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return CategoryValues::new(),
        };

        if category.is_array() {
            category
                .category_value_array_for_value(&raw)
                .into_iter()
                .map(|m| {
                    self.values
                        .get_or_create(&m.key, &m.label, m.sub_category.as_deref())
                })
                .collect()
        } else {
            category
                .category_value_for_value(&raw)
                .map(|m| {
                    self.values
                        .get_or_create(&m.key, &m.label, m.sub_category.as_deref())
                })
                .into_iter()
                .collect()
        }
    }
}

// ============================================================================
// VALUE CATEGORY
// ============================================================================

impl ValueCategory {
    fn single_value_for_row(&self, row: &dyn AnalysisRow) -> Rc<AnalysisCategoryValue> {
        let text = self
            .field
            .evaluator()
            .and_then(|e| e.text_for_row(row))
            .unwrap_or_default();
        if text.is_empty() {
            return self.values.empty_value();
        }
        self.values.get_or_create(&text, &text, None)
    }

    fn values_for_row(&self, row: &dyn AnalysisRow) -> CategoryValues {
        let evaluator = match self.field.evaluator() {
            Some(e) => e,
            None => {
                let mut out = CategoryValues::new();
                out.push(self.values.empty_value());
                return out;
            }
        };

        if let Some(array) = evaluator.array_for_row(row) {
            let buckets: CategoryValues = array
                .into_iter()
                .filter(|text| !text.is_empty())
                .map(|text| self.values.get_or_create(&text, &text, None))
                .collect();
            if !buckets.is_empty() {
                return buckets;
            }
        }

        let mut out = CategoryValues::new();
        out.push(self.single_value_for_row(row));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConditionConfig, ExplicitCategoryConfig, ExplicitCategoryValueConfig, ValueFieldOptions,
    };
    use crate::explicit::ExplicitCategory;
    use crate::field::FieldFlags;
    use crate::testutil::{ColumnEvaluator, SplitEvaluator, TestRow};
    use datasource::CompareOp;

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
    fn source_category_identity_caches_values() {
        let category = AnalysisCategory::source_field(stage_field(), 0);
        let row = TestRow::new(vec!["Open"]);

        let first = category.category_value_for_row(&row).unwrap();
        let second = category.category_value_for_row(&row).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.key, "Open");
        assert_eq!(first.label, "fmt:Open");
        assert_eq!(category.materialized_value_count(), 1);
    }

    #[test]
    fn source_category_blank_raw_yields_shared_sentinel() {
        let category = AnalysisCategory::source_field(stage_field(), 0);
        let blank = TestRow::new(vec![""]);

        let a = category.category_value_for_row(&blank).unwrap();
        let b = category.category_value_for_row(&blank).unwrap();
        assert!(a.is_empty_value);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(category.materialized_value_count(), 0);
    }

    #[test]
    fn source_category_with_sub_values_is_array() {
        let field = Rc::new(AnalysisField::source(
            "KP.0",
            "Channels",
            FieldFlags::default(),
            0,
            0,
            vec![1, 2],
        ));
        let category = AnalysisCategory::source_field(field, 0);
        assert!(category.is_array_category());

        let row = TestRow::new(vec!["Web", "Phone", "Mail"]);
        let values = category.category_values_for_row(&row);
        let keys: Vec<&str> = values.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, ["Web", "Phone", "Mail"]);
    }

    fn bands_category(is_array: bool) -> Rc<ExplicitCategory> {
        let config = ExplicitCategoryConfig {
            name: "Bands".to_string(),
            is_array,
            other_label: Some("OTHER".to_string()),
            values: vec![
                ExplicitCategoryValueConfig {
                    key: "LOW".to_string(),
                    label: "Low band".to_string(),
                    sub_category: Some("S1".to_string()),
                    conditions: vec![ConditionConfig {
                        operator: CompareOp::Between,
                        value: "0".to_string(),
                        value_to: "50".to_string(),
                    }],
                },
                ExplicitCategoryValueConfig {
                    key: "MID".to_string(),
                    label: String::new(),
                    sub_category: None,
                    conditions: vec![ConditionConfig {
                        operator: CompareOp::Between,
                        value: "25".to_string(),
                        value_to: "75".to_string(),
                    }],
                },
            ],
        };
        Rc::new(ExplicitCategory::from_config(&config, false))
    }

    #[test]
    fn explicit_field_category_resolves_and_caches_buckets() {
        let field = Rc::new(AnalysisField::explicit_bucket(
            stage_field(),
            bands_category(false),
        ));
        let category = AnalysisCategory::explicit_field(field);

        let row = TestRow::new(vec!["30"]);
        let value = category.category_value_for_row(&row).unwrap();
        assert_eq!(value.key, "LOW");
        assert_eq!(value.label, "Low band");
        assert_eq!(value.sub_category.as_deref(), Some("S1"));

        let again = category.category_value_for_row(&row).unwrap();
        assert!(Rc::ptr_eq(&value, &again));

        let empty = TestRow::new(vec![""]);
        assert!(category.category_value_for_row(&empty).is_none());
    }

    #[test]
    fn explicit_field_category_array_membership() {
        let field = Rc::new(AnalysisField::explicit_bucket(
            stage_field(),
            bands_category(true),
        ));
        let category = AnalysisCategory::explicit_field(field);
        assert!(category.is_array_category());

        let row = TestRow::new(vec!["30"]);
        let values = category.category_values_for_row(&row);
        let keys: Vec<&str> = values.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, ["LOW", "MID"]);

        assert!(category
            .category_values_for_row(&TestRow::new(vec![""]))
            .is_empty());
    }

    #[test]
    fn explicit_field_sort_delegates_to_parent_do_not_sort() {
        let mut flags = FieldFlags::default();
        flags.do_not_sort = true;
        let parent = Rc::new(AnalysisField::source(
            "KP.0",
            "Stage",
            flags,
            0,
            0,
            Vec::new(),
        ));
        let field = Rc::new(AnalysisField::explicit_bucket(parent, bands_category(false)));
        let category = AnalysisCategory::explicit_field(field);
        assert!(!category.sort_by_first_column_value());

        let default_field = Rc::new(AnalysisField::explicit_bucket(
            stage_field(),
            bands_category(false),
        ));
        let default_category = AnalysisCategory::explicit_field(default_field);
        assert!(default_category.sort_by_first_column_value());
    }

    #[test]
    fn value_category_text_and_array_results() {
        let field = Rc::new(AnalysisField::value(
            "v.owner",
            "Owner",
            "owner",
            ValueFieldOptions::default(),
            Some(Rc::new(ColumnEvaluator { column: 0 })),
        ));
        let category = AnalysisCategory::value(field, 0);

        let row = TestRow::new(vec!["Alice"]);
        let value = category.category_value_for_row(&row).unwrap();
        assert_eq!(value.key, "Alice");

        let split_field = Rc::new(AnalysisField::value(
            "v.tags",
            "Tags",
            "tags",
            ValueFieldOptions::default(),
            Some(Rc::new(SplitEvaluator { column: 0 })),
        ));
        let split_category = AnalysisCategory::value(split_field, 0);
        let tagged = TestRow::new(vec!["hot;renewal"]);
        let values = split_category.category_values_for_row(&tagged);
        let keys: Vec<&str> = values.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, ["hot", "renewal"]);
    }

    #[test]
    fn value_category_empty_result_is_sentinel() {
        let field = Rc::new(AnalysisField::value(
            "v.owner",
            "Owner",
            "owner",
            ValueFieldOptions::default(),
            Some(Rc::new(ColumnEvaluator { column: 0 })),
        ));
        let category = AnalysisCategory::value(field, 0);
        let row = TestRow::new(vec![""]);
        let values = category.category_values_for_row(&row);
        assert_eq!(values.len(), 1);
        assert!(values[0].is_empty_value);
    }

    #[test]
    fn value_category_sort_override() {
        let mut options = ValueFieldOptions::default();
        options.sort_by = Some("key".to_string());
        let field = Rc::new(AnalysisField::value(
            "v.owner",
            "Owner",
            "owner",
            options,
            None,
        ));
        let category = AnalysisCategory::value(field, 0);
        assert!(category.sort_by_key());
        assert!(!category.sort_by_first_column_value());
    }

    #[test]
    fn date_source_category_sorts_by_key() {
        let mut flags = FieldFlags::default();
        flags.is_date_value = true;
        let field = Rc::new(AnalysisField::source(
            "KP.3",
            "Close date",
            flags,
            0,
            3,
            Vec::new(),
        ));
        let category = AnalysisCategory::source_field(field, 0);
        assert!(category.sort_by_key());
        assert!(!category.sort_by_first_column_value());
    }
}
