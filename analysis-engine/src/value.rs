//! FILENAME: analysis-engine/src/value.rs
//! Category values and the per-category value dictionary.
//!
//! Every category materializes its buckets lazily: the first row that maps
//! to a bucket creates the value, every later row gets the SAME instance
//! back. The dictionary is an arena owned exclusively by its category and
//! is never evicted for the category's lifetime.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

// ============================================================================
// CATEGORY VALUE
// ============================================================================

/// One concrete bucket produced by a category. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisCategoryValue {
    /// Bucket key, unique within the owning category.
    pub key: String,

    /// Display label; falls back to the key when the configured label is blank.
    pub label: String,

    /// Optional sub-category name carried from the explicit-category bucket.
    pub sub_category: Option<String>,

    /// True iff the key is empty: the shared sentinel for unclassifiable rows.
    pub is_empty_value: bool,
}

impl AnalysisCategoryValue {
    pub fn new(key: impl Into<String>, label: impl Into<String>, sub_category: Option<String>) -> Self {
        let key = key.into();
        let label = label.into();
        let label = if label.is_empty() { key.clone() } else { label };
        let is_empty_value = key.is_empty();
        AnalysisCategoryValue {
            key,
            label,
            sub_category,
            is_empty_value,
        }
    }
}

// ============================================================================
// VALUE DICTIONARY
// ============================================================================

/// Get-or-create store of category values, keyed by bucket key.
///
/// Values are handed out as `Rc` so repeated classification of the same raw
/// value observably returns the same instance.
#[derive(Debug)]
pub struct CategoryValueDictionary {
    values: RefCell<FxHashMap<String, Rc<AnalysisCategoryValue>>>,
    empty: Rc<AnalysisCategoryValue>,
}

impl CategoryValueDictionary {
    pub fn new() -> Self {
        CategoryValueDictionary {
            values: RefCell::new(FxHashMap::default()),
            empty: Rc::new(AnalysisCategoryValue::new("", "", None)),
        }
    }

    /// The shared sentinel for rows the category cannot classify.
    pub fn empty_value(&self) -> Rc<AnalysisCategoryValue> {
        Rc::clone(&self.empty)
    }

    /// Returns the cached value for `key`, creating it on first encounter.
    /// The label and sub-category only apply on creation; later calls with a
    /// different label still return the original instance.
    pub fn get_or_create(
        &self,
        key: &str,
        label: &str,
        sub_category: Option<&str>,
    ) -> Rc<AnalysisCategoryValue> {
        if key.is_empty() {
            return self.empty_value();
        }
        let mut values = self.values.borrow_mut();
        if let Some(existing) = values.get(key) {
            return Rc::clone(existing);
        }
        let value = Rc::new(AnalysisCategoryValue::new(
            key,
            label,
            sub_category.map(|s| s.to_string()),
        ));
        values.insert(key.to_string(), Rc::clone(&value));
        value
    }

    /// Number of distinct non-empty buckets materialized so far.
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl Default for CategoryValueDictionary {
    fn default() -> Self {
        CategoryValueDictionary::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_key_when_blank() {
        let value = AnalysisCategoryValue::new("WON", "", None);
        assert_eq!(value.label, "WON");
        let labelled = AnalysisCategoryValue::new("WON", "Won deals", None);
        assert_eq!(labelled.label, "Won deals");
    }

    #[test]
    fn empty_key_marks_empty_value() {
        let value = AnalysisCategoryValue::new("", "", None);
        assert!(value.is_empty_value);
        assert!(!AnalysisCategoryValue::new("X", "", None).is_empty_value);
    }

    #[test]
    fn dictionary_returns_identical_instance_for_same_key() {
        let dict = CategoryValueDictionary::new();
        let first = dict.get_or_create("North", "North Region", None);
        let second = dict.get_or_create("North", "Renamed later", None);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.label, "North Region");
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn empty_key_routes_to_shared_sentinel() {
        let dict = CategoryValueDictionary::new();
        let a = dict.get_or_create("", "ignored", None);
        let b = dict.empty_value();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(a.is_empty_value);
        assert_eq!(dict.len(), 0);
    }
}
