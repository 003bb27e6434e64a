//! FILENAME: analysis-engine/src/explicit.rs
//! Explicit Category - rule-based bucketing of raw values.
//!
//! An explicit category is an ordered list of named buckets, each defined by
//! one or more conditions over the raw string value. A bucket matches when
//! ANY of its conditions matches; single-value resolution takes the first
//! matching bucket, array resolution takes all of them. A non-empty,
//! non-"0" value that matches nothing falls into the configured catch-all
//! bucket, if there is one.
//!
//! Date-templated categories carry year placeholders (`YYYY`, `YY`,
//! `$curYear`, `$CURYEAR`) in their condition literals. The rule table for a
//! given calendar year is built lazily from the configured template on the
//! first raw value carrying that 4-digit year prefix, then cached for the
//! category's lifetime. Raw values shorter than four characters are not
//! year-qualified and match against the untemplated base table.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use datasource::ConditionChecker;

use crate::config::{ConditionConfig, ExplicitCategoryConfig, ExplicitCategoryValueConfig};

// ============================================================================
// RULE TABLE
// ============================================================================

/// One compiled bucket: key, display data, and its match conditions.
#[derive(Debug, Clone)]
pub struct ExplicitCategoryBucket {
    pub key: String,
    pub label: String,
    pub sub_category: Option<String>,
    checkers: Vec<ConditionChecker>,
}

impl ExplicitCategoryBucket {
    fn matches(&self, raw: &str) -> bool {
        self.checkers.iter().any(|c| c.matches_string(raw))
    }
}

/// The outcome of resolving a raw value: the bucket it landed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitCategoryMatch {
    pub key: String,
    pub label: String,
    pub sub_category: Option<String>,
}

impl ExplicitCategoryMatch {
    fn from_bucket(bucket: &ExplicitCategoryBucket) -> Self {
        ExplicitCategoryMatch {
            key: bucket.key.clone(),
            label: bucket.label.clone(),
            sub_category: bucket.sub_category.clone(),
        }
    }
}

// ============================================================================
// EXPLICIT CATEGORY
// ============================================================================

/// Compiled explicit category: the base rule table plus, for date-templated
/// categories, the per-year compiled tables.
#[derive(Debug)]
pub struct ExplicitCategory {
    name: String,
    is_array: bool,

    /// Catch-all for non-empty, non-matching, non-zero values.
    other: Option<ExplicitCategoryMatch>,

    /// Rules with condition literals taken verbatim from configuration.
    base: Rc<Vec<ExplicitCategoryBucket>>,

    /// Whether any condition literal carries a year placeholder and the
    /// owning field holds date values.
    templated: bool,

    /// The configured bucket templates, kept for per-year substitution.
    template: Vec<ExplicitCategoryValueConfig>,

    /// Year string ("2023") to compiled rule table. Grows monotonically.
    year_tables: RefCell<FxHashMap<String, Rc<Vec<ExplicitCategoryBucket>>>>,
}

impl ExplicitCategory {
    /// Compiles the configured rule table. `is_date_field` enables date
    /// templating when placeholders are present.
    pub fn from_config(config: &ExplicitCategoryConfig, is_date_field: bool) -> Self {
        let base = Rc::new(build_table(&config.values, None));
        let templated = is_date_field
            && config.values.iter().any(|v| {
                v.conditions
                    .iter()
                    .any(|c| has_year_placeholder(&c.value) || has_year_placeholder(&c.value_to))
            });

        ExplicitCategory {
            name: config.name.clone(),
            is_array: config.is_array,
            other: config.other_label.as_ref().map(|label| ExplicitCategoryMatch {
                key: label.clone(),
                label: label.clone(),
                sub_category: None,
            }),
            base,
            templated,
            template: config.values.clone(),
            year_tables: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the underlying configuration declares multi-bucket membership.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Resolves a raw value to its first matching bucket.
    pub fn category_value_for_value(&self, raw: &str) -> Option<ExplicitCategoryMatch> {
        let table = self.table_for_raw(raw);
        for bucket in table.iter() {
            if bucket.matches(raw) {
                return Some(ExplicitCategoryMatch::from_bucket(bucket));
            }
        }
        self.other_for(raw)
    }

    /// Resolves a raw value to ALL matching buckets (multi-bucket membership).
    pub fn category_value_array_for_value(&self, raw: &str) -> Vec<ExplicitCategoryMatch> {
        let table = self.table_for_raw(raw);
        let matches: Vec<ExplicitCategoryMatch> = table
            .iter()
            .filter(|bucket| bucket.matches(raw))
            .map(ExplicitCategoryMatch::from_bucket)
            .collect();
        if matches.is_empty() {
            return self.other_for(raw).into_iter().collect();
        }
        matches
    }

    /// Number of year tables compiled so far. Exposed for tests.
    pub fn cached_year_count(&self) -> usize {
        self.year_tables.borrow().len()
    }

    /// Catch-all policy: only non-empty, non-"0" values fall through.
    fn other_for(&self, raw: &str) -> Option<ExplicitCategoryMatch> {
        if raw.is_empty() || raw == "0" {
            return None;
        }
        self.other.clone()
    }

    /// Selects the rule table for a raw value: the per-year compiled table
    /// for templated categories, the base table otherwise.
    fn table_for_raw(&self, raw: &str) -> Rc<Vec<ExplicitCategoryBucket>> {
        if !self.templated {
            return Rc::clone(&self.base);
        }
        let year = match year_prefix(raw) {
            Some(y) => y,
            None => return Rc::clone(&self.base),
        };
        if let Some(table) = self.year_tables.borrow().get(year) {
            return Rc::clone(table);
        }
        let table = Rc::new(build_table(&self.template, Some(year)));
        self.year_tables
            .borrow_mut()
            .insert(year.to_string(), Rc::clone(&table));
        table
    }
}

// ============================================================================
// TABLE COMPILATION
// ============================================================================

/// Compiles bucket configurations into checkers, substituting year
/// placeholders when a year is given.
fn build_table(
    values: &[ExplicitCategoryValueConfig],
    year: Option<&str>,
) -> Vec<ExplicitCategoryBucket> {
    values
        .iter()
        .map(|value| ExplicitCategoryBucket {
            key: value.key.clone(),
            label: if value.label.is_empty() {
                value.key.clone()
            } else {
                value.label.clone()
            },
            sub_category: value.sub_category.clone(),
            checkers: value
                .conditions
                .iter()
                .map(|condition| compile_condition(condition, year))
                .collect(),
        })
        .collect()
}

fn compile_condition(condition: &ConditionConfig, year: Option<&str>) -> ConditionChecker {
    match year {
        Some(y) => ConditionChecker::new(
            condition.operator,
            substitute_year(&condition.value, y),
            substitute_year(&condition.value_to, y),
        ),
        None => ConditionChecker::new(
            condition.operator,
            condition.value.clone(),
            condition.value_to.clone(),
        ),
    }
}

/// The recognized year placeholder spellings.
fn has_year_placeholder(literal: &str) -> bool {
    literal.contains("YYYY")
        || literal.contains("YY")
        || literal.contains("$curYear")
        || literal.contains("$CURYEAR")
}

/// Substitutes year placeholders with the given 4-digit year. `YYYY` and the
/// named variables take the full year; `YY` takes the last two digits. The
/// 4-digit forms are replaced first so a `YYYY` is never half-substituted.
fn substitute_year(literal: &str, year: &str) -> String {
    let short = &year[2..];
    literal
        .replace("YYYY", year)
        .replace("$curYear", year)
        .replace("$CURYEAR", year)
        .replace("YY", short)
}

/// The 4-digit year prefix of a raw date value, when it has one.
fn year_prefix(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 4 && bytes[..4].iter().all(|b| b.is_ascii_digit()) {
        Some(&raw[..4])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasource::CompareOp;

    fn condition(operator: CompareOp, value: &str, value_to: &str) -> ConditionConfig {
        ConditionConfig {
            operator,
            value: value.to_string(),
            value_to: value_to.to_string(),
        }
    }

    fn bucket(key: &str, conditions: Vec<ConditionConfig>) -> ExplicitCategoryValueConfig {
        ExplicitCategoryValueConfig {
            key: key.to_string(),
            label: String::new(),
            sub_category: None,
            conditions,
        }
    }

    fn sample_config() -> ExplicitCategoryConfig {
        ExplicitCategoryConfig {
            name: "Bands".to_string(),
            is_array: false,
            other_label: Some("OTHER".to_string()),
            values: vec![
                bucket("B1", vec![condition(CompareOp::Equal, "A", "")]),
                bucket("B2", vec![condition(CompareOp::Between, "10", "20")]),
            ],
        }
    }

    #[test]
    fn first_match_other_empty_and_zero() {
        let category = ExplicitCategory::from_config(&sample_config(), false);

        assert_eq!(category.category_value_for_value("A").unwrap().key, "B1");
        assert_eq!(category.category_value_for_value("15").unwrap().key, "B2");
        assert_eq!(
            category.category_value_for_value("99").unwrap().key,
            "OTHER"
        );
        assert!(category.category_value_for_value("").is_none());
        assert!(category.category_value_for_value("0").is_none());
    }

    #[test]
    fn no_catch_all_means_no_match() {
        let mut config = sample_config();
        config.other_label = None;
        let category = ExplicitCategory::from_config(&config, false);
        assert!(category.category_value_for_value("99").is_none());
    }

    #[test]
    fn bucket_matches_when_any_condition_matches() {
        let config = ExplicitCategoryConfig {
            name: "Either".to_string(),
            is_array: false,
            other_label: None,
            values: vec![bucket(
                "B1",
                vec![
                    condition(CompareOp::Equal, "A", ""),
                    condition(CompareOp::Equal, "B", ""),
                ],
            )],
        };
        let category = ExplicitCategory::from_config(&config, false);
        assert_eq!(category.category_value_for_value("B").unwrap().key, "B1");
        assert!(category.category_value_for_value("C").is_none());
    }

    #[test]
    fn array_resolution_returns_all_matching_buckets() {
        let config = ExplicitCategoryConfig {
            name: "Overlap".to_string(),
            is_array: true,
            other_label: Some("OTHER".to_string()),
            values: vec![
                bucket("LOW", vec![condition(CompareOp::Between, "0", "50")]),
                bucket("MID", vec![condition(CompareOp::Between, "25", "75")]),
            ],
        };
        let category = ExplicitCategory::from_config(&config, false);

        let both = category.category_value_array_for_value("30");
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].key, "LOW");
        assert_eq!(both[1].key, "MID");

        let fallback = category.category_value_array_for_value("99");
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].key, "OTHER");

        assert!(category.category_value_array_for_value("").is_empty());
    }

    #[test]
    fn date_template_substitutes_per_value_year() {
        let config = ExplicitCategoryConfig {
            name: "HalfYear".to_string(),
            is_array: false,
            other_label: None,
            values: vec![
                bucket("H1", vec![condition(CompareOp::Between, "YYYY0101", "YYYY0630")]),
                bucket("H2", vec![condition(CompareOp::Between, "YYYY0701", "YYYY1231")]),
            ],
        };
        let category = ExplicitCategory::from_config(&config, true);

        // Each value is matched against bounds built from its own year prefix.
        assert_eq!(
            category.category_value_for_value("20230315").unwrap().key,
            "H1"
        );
        assert_eq!(
            category.category_value_for_value("20240315").unwrap().key,
            "H1"
        );
        assert_eq!(
            category.category_value_for_value("20230815").unwrap().key,
            "H2"
        );

        // The two years compile independent rule tables, cached separately.
        assert_eq!(category.cached_year_count(), 2);

        // Re-querying 2023 reuses the cached table.
        assert_eq!(
            category.category_value_for_value("20231001").unwrap().key,
            "H2"
        );
        assert_eq!(category.cached_year_count(), 2);
    }

    #[test]
    fn short_values_fall_back_to_base_table() {
        let config = ExplicitCategoryConfig {
            name: "Short".to_string(),
            is_array: false,
            other_label: Some("OTHER".to_string()),
            values: vec![bucket(
                "H1",
                vec![condition(CompareOp::Between, "YYYY0101", "YYYY0630")],
            )],
        };
        let category = ExplicitCategory::from_config(&config, true);

        // Not year-qualified: matched against the untemplated literals, so it
        // lands in the catch-all instead of compiling a year table.
        assert_eq!(category.category_value_for_value("abc").unwrap().key, "OTHER");
        assert_eq!(category.cached_year_count(), 0);
    }

    #[test]
    fn year_substitution_spellings() {
        assert_eq!(substitute_year("YYYY0101", "2023"), "20230101");
        assert_eq!(substitute_year("YY0101", "2023"), "230101");
        assert_eq!(substitute_year("$curYear-06", "2024"), "2024-06");
        assert_eq!(substitute_year("$CURYEAR", "2024"), "2024");
    }

    #[test]
    fn non_date_field_ignores_placeholders() {
        let config = ExplicitCategoryConfig {
            name: "NotDates".to_string(),
            is_array: false,
            other_label: None,
            values: vec![bucket("B", vec![condition(CompareOp::Equal, "YYYY", "")])],
        };
        let category = ExplicitCategory::from_config(&config, false);
        // Literal match, no templating.
        assert_eq!(category.category_value_for_value("YYYY").unwrap().key, "B");
        assert!(category.category_value_for_value("2023").is_none());
    }
}
