//! FILENAME: analysis-engine/src/config.rs
//! Analysis Configuration - The serializable report definition.
//!
//! This module contains all the types needed to DESCRIBE an analysis.
//! These structures are designed to be:
//! - Serializable (report definitions are stored and shared across tenants)
//! - Immutable snapshots of the report author's intent
//!
//! The configuration assembler resolves these against the executed query's
//! actual result tables; references the query cannot satisfy are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use datasource::CompareOp;

/// Free-form options bundle attached to the analysis and to value fields.
pub type OptionsMap = serde_json::Map<String, JsonValue>;

// ============================================================================
// FIELD ATTRIBUTES
// ============================================================================

/// Bitmask of field roles as stored in the report definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAttributes(pub u32);

impl FieldAttributes {
    pub const CATEGORY: u32 = 1 << 0;
    pub const DEFAULT_CATEGORY: u32 = 1 << 1;
    pub const X_CATEGORY: u32 = 1 << 2;
    pub const FILTER: u32 = 1 << 3;
    pub const RESULT_COLUMN: u32 = 1 << 4;
    pub const CURRENCY: u32 = 1 << 5;
    pub const TABLE_CURRENCY: u32 = 1 << 6;
    pub const WEIGHT: u32 = 1 << 7;
    pub const DO_NOT_SORT: u32 = 1 << 8;
    pub const CURRENCY_DEPENDENT: u32 = 1 << 9;
    pub const WEIGHT_DEPENDENT: u32 = 1 << 10;
    pub const DATE_VALUE: u32 = 1 << 11;

    pub fn has(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn with(bits: u32) -> Self {
        FieldAttributes(bits)
    }
}

// ============================================================================
// TABLE / FIELD CONFIGURATION
// ============================================================================

/// One configured source-table occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Identifier of the source area this table reads from.
    pub info_area_id: String,

    /// Which occurrence of the source area this configuration addresses
    /// when the query joins the same area more than once.
    #[serde(default)]
    pub occurrence: usize,

    /// Configured fields of this table.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// One configured field within a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Column index within the owning table (0-based).
    pub field_index: usize,

    /// Display label. Empty falls back to the source column name.
    #[serde(default)]
    pub label: String,

    /// Role bitmask (category, filter, currency, ...).
    #[serde(default)]
    pub attributes: FieldAttributes,

    /// Name of the explicit category that buckets this field, if any.
    /// Only meaningful when the CATEGORY attribute is set.
    #[serde(default)]
    pub explicit_category: Option<String>,
}

// ============================================================================
// EXPLICIT CATEGORY CONFIGURATION
// ============================================================================

/// A single condition over the raw string value of a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub operator: CompareOp,

    pub value: String,

    /// Upper bound for `Between`; empty otherwise.
    #[serde(default)]
    pub value_to: String,
}

/// One named bucket of an explicit category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplicitCategoryValueConfig {
    /// Bucket key, unique within the category.
    pub key: String,

    /// Display label. Empty falls back to the key.
    #[serde(default)]
    pub label: String,

    /// Optional sub-category name carried through to the category value.
    #[serde(default)]
    pub sub_category: Option<String>,

    /// A bucket matches when ANY of its conditions matches.
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,
}

/// A rule-based category: an ordered list of named buckets, each defined
/// by match conditions over the raw value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplicitCategoryConfig {
    /// Name the field configuration references.
    pub name: String,

    /// Whether a raw value may fall into several buckets at once.
    #[serde(default)]
    pub is_array: bool,

    /// Label of the catch-all bucket for non-empty, non-matching,
    /// non-zero values. No catch-all when absent.
    #[serde(default)]
    pub other_label: Option<String>,

    /// Buckets in declaration order; the first match wins for
    /// single-value resolution.
    #[serde(default)]
    pub values: Vec<ExplicitCategoryValueConfig>,
}

// ============================================================================
// VALUE EXPRESSION CONFIGURATION
// ============================================================================

/// One configured computed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueExpressionConfig {
    /// Key of the resulting value field, unique within the analysis.
    pub key: String,

    /// Display label. Empty falls back to the key.
    #[serde(default)]
    pub label: String,

    /// Name resolved through the host's value-expression evaluator.
    pub expression_name: String,

    /// Free-form options bundle (category/column/static/... flags).
    #[serde(default)]
    pub options: OptionsMap,
}

/// Parsed form of a value field's options bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueFieldOptions {
    pub is_category: bool,
    pub is_default_category: bool,
    pub is_x_category: bool,
    pub is_column: bool,
    pub is_static: bool,
    pub is_text: bool,
    pub is_sum: bool,
    pub cumulate: bool,
    pub format: Option<String>,
    /// Overrides the category sort policy: "key" or "value".
    pub sort_by: Option<String>,
    /// Bounds distinct buckets reported by a value category. 0 = unbounded.
    pub max_rows: usize,
}

impl ValueFieldOptions {
    /// Parses the free-form options map, ignoring unknown keys.
    pub fn from_options(options: &OptionsMap) -> Self {
        ValueFieldOptions {
            is_category: bool_option(options, "Category"),
            is_default_category: bool_option(options, "DefaultCategory"),
            is_x_category: bool_option(options, "XCategory"),
            is_column: bool_option(options, "Column"),
            is_static: bool_option(options, "Static"),
            is_text: bool_option(options, "Text"),
            is_sum: bool_option(options, "Sum"),
            cumulate: bool_option(options, "Cumulate"),
            format: string_option(options, "Format"),
            sort_by: string_option(options, "SortBy"),
            max_rows: usize_option(options, "MaxNumberOfRows"),
        }
    }

    /// Whether this value field contributes a category at all.
    pub fn is_categorizable(&self) -> bool {
        self.is_category || self.is_default_category || self.is_x_category
    }
}

// ============================================================================
// ANALYSIS-LEVEL OPTIONS
// ============================================================================

/// Parsed form of the analysis-level options map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOptions {
    pub show_empty: bool,
    pub currency_code: Option<String>,
    /// Bounds distinct buckets reported per category. 0 = unbounded.
    pub max_number_of_rows: usize,
}

impl AnalysisOptions {
    pub fn from_options(options: &OptionsMap) -> Self {
        AnalysisOptions {
            show_empty: bool_option(options, "ShowEmpty"),
            currency_code: string_option(options, "CurrencyCode"),
            max_number_of_rows: usize_option(options, "MaxNumberOfRows"),
        }
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

/// The complete, serializable definition of an analysis.
/// This is the "source of truth" stored with the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfiguration {
    /// Report name.
    #[serde(default)]
    pub name: String,

    /// Configured source tables in declaration order.
    #[serde(default)]
    pub tables: Vec<TableConfig>,

    /// Explicit-category rule tables referenced by field configurations.
    #[serde(default)]
    pub explicit_categories: Vec<ExplicitCategoryConfig>,

    /// Configured computed values.
    #[serde(default)]
    pub value_expressions: Vec<ValueExpressionConfig>,

    /// Free-form analysis-level options.
    #[serde(default)]
    pub options: OptionsMap,
}

impl AnalysisConfiguration {
    /// Looks up an explicit category by name. A miss is a valid outcome.
    pub fn explicit_category(&self, name: &str) -> Option<&ExplicitCategoryConfig> {
        self.explicit_categories.iter().find(|c| c.name == name)
    }
}

// ============================================================================
// OPTION MAP HELPERS
// ============================================================================

/// Reads a boolean option, accepting JSON bools and the string spellings
/// "true"/"1" that legacy definitions carry.
fn bool_option(options: &OptionsMap, key: &str) -> bool {
    match options.get(key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(JsonValue::String(s)) => s == "true" || s == "1",
        _ => false,
    }
}

fn string_option(options: &OptionsMap, key: &str) -> Option<String> {
    match options.get(key) {
        Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn usize_option(options: &OptionsMap, key: &str) -> usize {
    match options.get(key) {
        Some(JsonValue::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(JsonValue::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bitmask_decoding() {
        let attrs = FieldAttributes::with(
            FieldAttributes::CATEGORY | FieldAttributes::DEFAULT_CATEGORY | FieldAttributes::FILTER,
        );
        assert!(attrs.has(FieldAttributes::CATEGORY));
        assert!(attrs.has(FieldAttributes::DEFAULT_CATEGORY));
        assert!(attrs.has(FieldAttributes::FILTER));
        assert!(!attrs.has(FieldAttributes::CURRENCY));
        assert!(!attrs.has(FieldAttributes::WEIGHT));
    }

    #[test]
    fn value_field_options_from_mixed_spellings() {
        let raw = serde_json::json!({
            "Category": true,
            "Sum": "true",
            "Static": 1,
            "Format": "#,##0.00",
            "MaxNumberOfRows": 25,
            "SomethingUnknown": { "nested": true }
        });
        let options = ValueFieldOptions::from_options(raw.as_object().unwrap());
        assert!(options.is_category);
        assert!(options.is_sum);
        assert!(options.is_static);
        assert!(!options.is_text);
        assert_eq!(options.format.as_deref(), Some("#,##0.00"));
        assert_eq!(options.max_rows, 25);
        assert!(options.is_categorizable());
    }

    #[test]
    fn configuration_round_trips_through_json() {
        let config = AnalysisConfiguration {
            name: "Pipeline by Rep".to_string(),
            tables: vec![TableConfig {
                info_area_id: "KP".to_string(),
                occurrence: 0,
                fields: vec![FieldConfig {
                    field_index: 2,
                    label: "Stage".to_string(),
                    attributes: FieldAttributes::with(FieldAttributes::CATEGORY),
                    explicit_category: None,
                }],
            }],
            explicit_categories: Vec::new(),
            value_expressions: Vec::new(),
            options: OptionsMap::new(),
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "Pipeline by Rep");
        assert_eq!(back.tables[0].fields[0].field_index, 2);
        assert!(back.tables[0].fields[0]
            .attributes
            .has(FieldAttributes::CATEGORY));
    }

    #[test]
    fn explicit_category_lookup_miss_is_none() {
        let config = AnalysisConfiguration {
            name: String::new(),
            tables: Vec::new(),
            explicit_categories: Vec::new(),
            value_expressions: Vec::new(),
            options: OptionsMap::new(),
        };
        assert!(config.explicit_category("Revenue Bands").is_none());
    }
}
