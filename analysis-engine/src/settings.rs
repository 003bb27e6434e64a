//! FILENAME: analysis-engine/src/settings.rs
//! Execution Settings - immutable snapshots of one report request.
//!
//! A settings instance captures {category, x-category, result columns,
//! conditions, show-empty, currency} for one computation. Navigation never
//! mutates: drilldown, drillup, and category switches each derive a brand-new
//! instance, so the surrounding application can keep a back-stack of settings
//! and re-run any of them.

use std::rc::Rc;

use crate::category::AnalysisCategory;
use crate::columns::AnalysisResultColumn;
use crate::filter::AnalysisFilter;

// ============================================================================
// NAVIGATION OPTIONS
// ============================================================================

/// A drilldown target: the category axis to pivot to after narrowing.
#[derive(Clone)]
pub struct DrilldownOption {
    pub category: Rc<AnalysisCategory>,
}

/// A drillup request: the category whose condition should be removed.
#[derive(Clone)]
pub struct DrillupOption {
    pub category: Rc<AnalysisCategory>,
}

// ============================================================================
// EXECUTION SETTINGS
// ============================================================================

/// Immutable execution settings. Construct via [`AnalysisExecutionSettings::new`]
/// (default settings) or one of the derivation operations.
pub struct AnalysisExecutionSettings {
    pub category: Option<Rc<AnalysisCategory>>,
    pub x_category: Option<Rc<AnalysisCategory>>,
    pub result_columns: Vec<Rc<AnalysisResultColumn>>,
    pub conditions: Vec<AnalysisFilter>,
    pub show_empty: bool,
    pub currency_code: Option<String>,
}

impl AnalysisExecutionSettings {
    pub fn new(
        category: Option<Rc<AnalysisCategory>>,
        x_category: Option<Rc<AnalysisCategory>>,
        result_columns: Vec<Rc<AnalysisResultColumn>>,
        conditions: Vec<AnalysisFilter>,
        show_empty: bool,
        currency_code: Option<String>,
    ) -> Self {
        AnalysisExecutionSettings {
            category,
            x_category,
            result_columns,
            conditions,
            show_empty,
            currency_code,
        }
    }

    /// Copy with the category replaced, everything else untouched.
    pub fn settings_with_category(&self, category: Rc<AnalysisCategory>) -> Self {
        AnalysisExecutionSettings {
            category: Some(category),
            x_category: self.x_category.clone(),
            result_columns: self.result_columns.clone(),
            conditions: self.conditions.clone(),
            show_empty: self.show_empty,
            currency_code: self.currency_code.clone(),
        }
    }

    /// Drilldown: narrow to the bucket the user picked in the current
    /// category, then pivot to the option's category. The picked bucket
    /// becomes a category condition; empty buckets are shown so the
    /// narrowed report keeps its full axis.
    pub fn settings_with_drilldown_option_row(
        &self,
        option: &DrilldownOption,
        row_value_key: &str,
    ) -> Self {
        let mut conditions = self.conditions.clone();
        if let Some(current) = &self.category {
            conditions.push(AnalysisFilter::category(Rc::clone(current), row_value_key));
        }
        AnalysisExecutionSettings {
            category: Some(Rc::clone(&option.category)),
            x_category: self.x_category.clone(),
            result_columns: self.result_columns.clone(),
            conditions,
            show_empty: true,
            currency_code: self.currency_code.clone(),
        }
    }

    /// Drillup: remove the condition added for the option's category.
    ///
    /// Resolution is two-path, preserved exactly from the shipped behavior:
    /// a condition explicitly naming the option's category always wins; only
    /// when none exists AND the option names the CURRENT category does the
    /// last category condition get removed instead, restoring that
    /// condition's category as the active axis (the "undo the most recent
    /// drilldown" path).
    ///
    /// `default_show_empty` is the owning analysis's default-settings flag.
    pub fn settings_with_drillup_option(
        &self,
        option: &DrillupOption,
        default_show_empty: bool,
    ) -> Self {
        let mut conditions = self.conditions.clone();
        let mut category = self.category.clone();

        let named = conditions.iter().position(|condition| {
            condition
                .filter_category()
                .map(|c| c.key() == option.category.key())
                .unwrap_or(false)
        });

        if let Some(index) = named {
            conditions.remove(index);
        } else if self
            .category
            .as_ref()
            .map(|c| c.key() == option.category.key())
            .unwrap_or(false)
        {
            let last = conditions
                .iter()
                .rposition(|condition| condition.filter_category().is_some());
            if let Some(index) = last {
                if let Some(removed_category) = conditions[index].filter_category() {
                    category = Some(Rc::clone(removed_category));
                }
                conditions.remove(index);
            }
        }

        let show_empty = !conditions.is_empty() || default_show_empty;

        AnalysisExecutionSettings {
            category,
            x_category: self.x_category.clone(),
            result_columns: self.result_columns.clone(),
            conditions,
            show_empty,
            currency_code: self.currency_code.clone(),
        }
    }

    /// Shallow equality: same category and x-category instances, equal
    /// result-column and condition COUNTS. Contents of conditions and
    /// columns are deliberately not compared.
    pub fn is_equal(&self, other: &AnalysisExecutionSettings) -> bool {
        same_category(&self.category, &other.category)
            && same_category(&self.x_category, &other.x_category)
            && self.result_columns.len() == other.result_columns.len()
            && self.conditions.len() == other.conditions.len()
    }
}

fn same_category(a: &Option<Rc<AnalysisCategory>>, b: &Option<Rc<AnalysisCategory>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}
