//! FILENAME: analysis-engine/src/analysis.rs
//! Analysis - the root aggregate and result orchestrator.
//!
//! An Analysis owns the assembled field/category/filter/table graph, the
//! default execution settings, and the data-source cache. Result
//! computation itself is an external collaborator ([`AnalysisProcessing`]);
//! this module only mediates: obtain a query result, hand it to
//! aggregation, route the outcome to exactly one completion callback.
//!
//! Asynchronous requests follow a last-writer-wins policy: one pending
//! delegate slot per Analysis, overwritten (not queued) by a newer request.
//! The slot is cleared BEFORE the callback fires so a callback can never
//! re-trigger its own completion.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use datasource::{CurrencyConversionProvider, ResultSet};

use crate::category::AnalysisCategory;
use crate::columns::AnalysisResultColumn;
use crate::config::{AnalysisConfiguration, AnalysisOptions};
use crate::error::AnalysisError;
use crate::field::AnalysisField;
use crate::filter::AnalysisFilter;
use crate::settings::{AnalysisExecutionSettings, DrillupOption};
use crate::table::AnalysisTable;

// ============================================================================
// RESULT / COLLABORATOR CONTRACTS
// ============================================================================

/// The aggregated report produced by the external processing collaborator.
/// The orchestrator only inspects the error slot; everything else is opaque
/// hand-through to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Populated by aggregation on failure; routes the completion to the
    /// failure callback.
    pub error: Option<AnalysisError>,

    /// Number of source rows aggregation consumed.
    pub processed_row_count: usize,
}

impl AnalysisResult {
    pub fn ok(processed_row_count: usize) -> Self {
        AnalysisResult {
            error: None,
            processed_row_count,
        }
    }

    pub fn failed(error: AnalysisError) -> Self {
        AnalysisResult {
            error: Some(error),
            processed_row_count: 0,
        }
    }
}

/// External aggregation: turns settings plus a raw result set into an
/// [`AnalysisResult`].
pub trait AnalysisProcessing {
    fn compute(&self, settings: &AnalysisExecutionSettings, rows: &dyn ResultSet) -> AnalysisResult;
}

/// The external query-issuing session. `execute_query` initiates an
/// asynchronous query whose outcome is reported back through
/// [`Analysis::execution_context_did_finish`] /
/// [`Analysis::execution_context_did_fail`].
pub trait ExecutionContext {
    /// Identity of this context for the data-source cache.
    fn context_key(&self) -> String;

    /// The already-resident result, when the data source needs no query.
    /// Used by the synchronous computation path.
    fn resident_result(&self) -> Option<Rc<dyn ResultSet>>;

    fn execute_query(&self, settings: &AnalysisExecutionSettings);
}

/// Completion-callback pair for one asynchronous request. The `Box<Self>`
/// receivers make each delegate consumable exactly once.
pub trait AnalysisDelegate {
    fn analysis_did_finish(self: Box<Self>, result: AnalysisResult);

    fn analysis_did_fail(self: Box<Self>, error: AnalysisError);
}

/// The request currently waiting for its execution context to call back.
pub(crate) struct PendingRequest {
    settings: Rc<AnalysisExecutionSettings>,
    processing: Rc<dyn AnalysisProcessing>,
    delegate: Box<dyn AnalysisDelegate>,
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// The root aggregate: one report definition, assembled once, queried many
/// times. Immutable after assembly apart from the pending request slot and
/// the data-source cache.
pub struct Analysis {
    pub(crate) configuration: AnalysisConfiguration,
    pub(crate) options: AnalysisOptions,

    pub(crate) tables_by_index: FxHashMap<usize, Rc<AnalysisTable>>,
    pub(crate) tables_by_key: FxHashMap<String, Rc<AnalysisTable>>,
    pub(crate) fields: FxHashMap<String, Rc<AnalysisField>>,
    pub(crate) value_fields: FxHashMap<String, Rc<AnalysisField>>,
    pub(crate) categories: FxHashMap<String, Rc<AnalysisCategory>>,
    pub(crate) filters: Vec<AnalysisFilter>,
    pub(crate) result_columns: Vec<Rc<AnalysisResultColumn>>,
    pub(crate) result_columns_by_key: FxHashMap<String, Rc<AnalysisResultColumn>>,

    pub(crate) default_category: Option<Rc<AnalysisCategory>>,
    pub(crate) x_category: Option<Rc<AnalysisCategory>>,
    pub(crate) currency_field: Option<Rc<AnalysisField>>,
    pub(crate) weight_field: Option<Rc<AnalysisField>>,
    pub(crate) currency_conversion: Option<Rc<dyn CurrencyConversionProvider>>,

    pub(crate) default_settings: Rc<AnalysisExecutionSettings>,

    /// Most recent result per execution context. Never evicted; one
    /// analysis instance only ever sees the handful of contexts its
    /// navigation produces.
    pub(crate) result_cache: RefCell<FxHashMap<String, Rc<dyn ResultSet>>>,

    /// Last-writer-wins pending request slot.
    pub(crate) pending: RefCell<Option<PendingRequest>>,
}

impl Analysis {
    // ------------------------------------------------------------------
    // Graph accessors
    // ------------------------------------------------------------------

    pub fn configuration(&self) -> &AnalysisConfiguration {
        &self.configuration
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn field(&self, key: &str) -> Option<&Rc<AnalysisField>> {
        self.fields.get(key)
    }

    pub fn value_field(&self, key: &str) -> Option<&Rc<AnalysisField>> {
        self.value_fields.get(key)
    }

    pub fn category(&self, key: &str) -> Option<&Rc<AnalysisCategory>> {
        self.categories.get(key)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn table_with_key(&self, key: &str) -> Option<&Rc<AnalysisTable>> {
        self.tables_by_key.get(key)
    }

    pub fn table_at_index(&self, query_table_index: usize) -> Option<&Rc<AnalysisTable>> {
        self.tables_by_index.get(&query_table_index)
    }

    pub fn table_count(&self) -> usize {
        self.tables_by_key.len()
    }

    pub fn filters(&self) -> &[AnalysisFilter] {
        &self.filters
    }

    pub fn result_columns(&self) -> &[Rc<AnalysisResultColumn>] {
        &self.result_columns
    }

    pub fn result_column(&self, key: &str) -> Option<&Rc<AnalysisResultColumn>> {
        self.result_columns_by_key.get(key)
    }

    pub fn default_category(&self) -> Option<&Rc<AnalysisCategory>> {
        self.default_category.as_ref()
    }

    pub fn x_category(&self) -> Option<&Rc<AnalysisCategory>> {
        self.x_category.as_ref()
    }

    pub fn currency_field(&self) -> Option<&Rc<AnalysisField>> {
        self.currency_field.as_ref()
    }

    pub fn weight_field(&self) -> Option<&Rc<AnalysisField>> {
        self.weight_field.as_ref()
    }

    pub fn currency_conversion(&self) -> Option<&Rc<dyn CurrencyConversionProvider>> {
        self.currency_conversion.as_ref()
    }

    pub fn default_settings(&self) -> &Rc<AnalysisExecutionSettings> {
        &self.default_settings
    }

    /// Drillup needs the default settings' show-empty flag; this wrapper
    /// supplies it.
    pub fn settings_with_drillup_option(
        &self,
        settings: &AnalysisExecutionSettings,
        option: &DrillupOption,
    ) -> AnalysisExecutionSettings {
        settings.settings_with_drillup_option(option, self.default_settings.show_empty)
    }

    // ------------------------------------------------------------------
    // Result computation
    // ------------------------------------------------------------------

    /// Synchronous path: the data source is already resident. Aggregates
    /// and returns the result directly, error slot and all.
    pub fn compute_result_with_settings(
        &self,
        settings: &AnalysisExecutionSettings,
        context: &dyn ExecutionContext,
        processing: &dyn AnalysisProcessing,
    ) -> Result<AnalysisResult, AnalysisError> {
        let rows = self
            .cached_or_resident(context)
            .ok_or_else(|| AnalysisError::Transport("no resident query result".to_string()))?;
        Ok(processing.compute(settings, rows.as_ref()))
    }

    /// Asynchronous path. At most one request is outstanding per Analysis:
    /// a newer call overwrites the pending delegate, and the earlier
    /// caller's completion is never signaled.
    pub fn compute_result_with_settings_delegate(
        &self,
        settings: Rc<AnalysisExecutionSettings>,
        context: &dyn ExecutionContext,
        processing: Rc<dyn AnalysisProcessing>,
        delegate: Box<dyn AnalysisDelegate>,
    ) {
        if self.pending.borrow().is_some() {
            log::warn!("analysis request overwrites a pending delegate");
        }
        *self.pending.borrow_mut() = Some(PendingRequest {
            settings: Rc::clone(&settings),
            processing,
            delegate,
        });

        let key = context.context_key();
        let cached = self.result_cache.borrow().get(&key).map(Rc::clone);
        match cached {
            Some(rows) => {
                log::debug!("analysis cache hit for context {}", key);
                self.finish_pending(rows);
            }
            None => context.execute_query(&settings),
        }
    }

    /// Callback from the execution context on query success. Caches the
    /// result under the context's identity, then completes the pending
    /// request.
    pub fn execution_context_did_finish(&self, context_key: &str, rows: Rc<dyn ResultSet>) {
        self.result_cache
            .borrow_mut()
            .insert(context_key.to_string(), Rc::clone(&rows));
        self.finish_pending(rows);
    }

    /// Callback from the execution context on transport failure. Routed to
    /// the failure callback without reaching aggregation.
    pub fn execution_context_did_fail(&self, error: AnalysisError) {
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(request) => request.delegate.analysis_did_fail(error),
            None => log::debug!("query failure with no pending request"),
        }
    }

    /// Number of cached results. Exposed for tests.
    pub fn cached_result_count(&self) -> usize {
        self.result_cache.borrow().len()
    }

    fn cached_or_resident(&self, context: &dyn ExecutionContext) -> Option<Rc<dyn ResultSet>> {
        let key = context.context_key();
        if let Some(rows) = self.result_cache.borrow().get(&key) {
            return Some(Rc::clone(rows));
        }
        let rows = context.resident_result()?;
        self.result_cache
            .borrow_mut()
            .insert(key, Rc::clone(&rows));
        Some(rows)
    }

    /// Aggregates and dispatches the pending request. The delegate is taken
    /// out of the slot before its callback runs.
    fn finish_pending(&self, rows: Rc<dyn ResultSet>) {
        let pending = match self.pending.borrow_mut().take() {
            Some(request) => request,
            None => return,
        };
        let result = pending.processing.compute(&pending.settings, rows.as_ref());
        match result.error.clone() {
            Some(error) => pending.delegate.analysis_did_fail(error),
            None => pending.delegate.analysis_did_finish(result),
        }
    }
}

impl std::fmt::Debug for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("name", &self.configuration.name)
            .field("tables", &self.tables_by_key.len())
            .field("fields", &self.fields.len())
            .field("categories", &self.categories.len())
            .finish()
    }
}
