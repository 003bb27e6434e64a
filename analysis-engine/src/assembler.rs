//! FILENAME: analysis-engine/src/assembler.rs
//! Configuration Assembler - resolves a stored definition against a query.
//!
//! Assembly walks the executed query's result tables once, matches the
//! configured tables and fields against them, and builds the immutable
//! object graph the Analysis serves from. The tolerance policy throughout
//! is SKIP, never fail: a configured table or field the query does not
//! carry leaves a debug breadcrumb and is dropped from the graph, so a
//! stale definition still produces a working (smaller) analysis.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use datasource::{
    AnalysisDataSource, CurrencyConversionProvider, TableMeta, ValueEvaluatorProvider,
};

use crate::analysis::Analysis;
use crate::category::AnalysisCategory;
use crate::columns::AnalysisResultColumn;
use crate::config::{AnalysisConfiguration, AnalysisOptions, FieldConfig, ValueFieldOptions};
use crate::explicit::ExplicitCategory;
use crate::field::{AnalysisField, FieldFlags};
use crate::filter::AnalysisFilter;
use crate::settings::AnalysisExecutionSettings;
use crate::table::AnalysisTable;

// ============================================================================
// RESULT-TABLE RESOLUTION
// ============================================================================

/// One result table of the executed query, annotated with its occurrence
/// index per source area and its global first-column offset.
struct ResultTableSlot<'a> {
    meta: &'a TableMeta,
    query_table_index: usize,
    occurrence: usize,
    first_column_index: usize,
}

/// Annotates the query's result tables with occurrence indices and the
/// running column offset. Column indices in field configurations are
/// table-relative; all engine-side bindings are query-global.
fn resolve_result_tables(tables: &[TableMeta]) -> Vec<ResultTableSlot<'_>> {
    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    let mut first_column_index = 0;
    let mut slots = Vec::with_capacity(tables.len());
    for (query_table_index, meta) in tables.iter().enumerate() {
        let occurrence = seen.entry(meta.info_area_id.as_str()).or_insert(0);
        slots.push(ResultTableSlot {
            meta,
            query_table_index,
            occurrence: *occurrence,
            first_column_index,
        });
        *occurrence += 1;
        first_column_index += meta.number_of_fields();
    }
    slots
}

// ============================================================================
// ASSEMBLER
// ============================================================================

/// Single-use builder: borrow the configuration and the collaborators,
/// consume with [`ConfigurationAssembler::build_from_configuration`].
pub struct ConfigurationAssembler<'a> {
    configuration: &'a AnalysisConfiguration,
    data_source: &'a dyn AnalysisDataSource,
    evaluators: &'a dyn ValueEvaluatorProvider,
    currency: Option<Rc<dyn CurrencyConversionProvider>>,
}

/// Mutable accumulator for the graph under construction.
#[derive(Default)]
struct Assembly {
    tables_by_index: FxHashMap<usize, Rc<AnalysisTable>>,
    tables_by_key: FxHashMap<String, Rc<AnalysisTable>>,
    fields: FxHashMap<String, Rc<AnalysisField>>,
    value_fields: FxHashMap<String, Rc<AnalysisField>>,
    categories: FxHashMap<String, Rc<AnalysisCategory>>,
    filters: Vec<AnalysisFilter>,
    result_columns: Vec<Rc<AnalysisResultColumn>>,
    result_columns_by_key: FxHashMap<String, Rc<AnalysisResultColumn>>,
    default_category: Option<Rc<AnalysisCategory>>,
    first_category: Option<Rc<AnalysisCategory>>,
    x_category: Option<Rc<AnalysisCategory>>,
    currency_field: Option<Rc<AnalysisField>>,
    weight_field: Option<Rc<AnalysisField>>,
    currency_required: bool,
}

impl Assembly {
    /// Field keys are unique; a duplicate is a definition defect and the
    /// later field is dropped.
    fn register_field(&mut self, field: Rc<AnalysisField>) -> bool {
        if self.fields.contains_key(&field.key) {
            log::debug!("duplicate field key {} skipped", field.key);
            return false;
        }
        self.fields.insert(field.key.clone(), field);
        true
    }

    fn register_category(&mut self, category: Rc<AnalysisCategory>, flags: FieldFlags) {
        self.categories
            .insert(category.key().to_string(), Rc::clone(&category));
        if flags.is_default_category {
            self.default_category = Some(Rc::clone(&category));
        } else if flags.is_category && self.first_category.is_none() {
            self.first_category = Some(Rc::clone(&category));
        }
        if flags.is_x_category {
            self.x_category = Some(category);
        }
    }

    fn push_result_column(&mut self, column: AnalysisResultColumn) {
        let column = Rc::new(column);
        if self.result_columns_by_key.contains_key(&column.key) {
            log::debug!("duplicate result column key {} skipped", column.key);
            return;
        }
        self.result_columns_by_key
            .insert(column.key.clone(), Rc::clone(&column));
        self.result_columns.push(column);
    }
}

impl<'a> ConfigurationAssembler<'a> {
    pub fn new(
        configuration: &'a AnalysisConfiguration,
        data_source: &'a dyn AnalysisDataSource,
        evaluators: &'a dyn ValueEvaluatorProvider,
        currency: Option<Rc<dyn CurrencyConversionProvider>>,
    ) -> Self {
        ConfigurationAssembler {
            configuration,
            data_source,
            evaluators,
            currency,
        }
    }

    /// Builds the full analysis graph from the stored definition.
    pub fn build_from_configuration(self) -> Analysis {
        let options = AnalysisOptions::from_options(&self.configuration.options);
        let slots = resolve_result_tables(self.data_source.result_tables());
        let mut assembly = Assembly::default();

        for table_config in &self.configuration.tables {
            let slot = slots.iter().find(|slot| {
                slot.meta.info_area_id == table_config.info_area_id
                    && slot.occurrence == table_config.occurrence
            });
            let slot = match slot {
                Some(slot) => slot,
                None => {
                    log::debug!(
                        "configured table {}#{} not in query result, skipped",
                        table_config.info_area_id,
                        table_config.occurrence
                    );
                    continue;
                }
            };

            let mut table = AnalysisTable::new(
                table_config.info_area_id.clone(),
                slot.occurrence,
                slot.query_table_index,
            );
            let mut column_fields: Vec<Rc<AnalysisField>> = Vec::new();

            for field_config in &table_config.fields {
                if let Some(field) =
                    self.build_source_field(&mut assembly, &options, slot, &table, field_config)
                {
                    table.add_field(field_config.field_index, Rc::clone(&field));
                    if field.flags.is_table_currency {
                        table.currency_field = Some(Rc::clone(&field));
                        assembly.currency_required = true;
                    }
                    if field.flags.is_result_column {
                        column_fields.push(field);
                    }
                }
            }

            // Every resolved table contributes its row-count column first,
            // then its flagged source columns.
            let count_field = Rc::new(AnalysisField::count(
                table.key.clone(),
                table.info_area_id.clone(),
                table.key.clone(),
                slot.query_table_index,
            ));
            assembly.register_field(Rc::clone(&count_field));
            assembly.push_result_column(AnalysisResultColumn::table_count(
                table.key.clone(),
                table.info_area_id.clone(),
                slot.query_table_index,
            ));
            for field in column_fields {
                assembly.push_result_column(AnalysisResultColumn::source_field(field));
            }

            let table = Rc::new(table);
            assembly
                .tables_by_index
                .insert(slot.query_table_index, Rc::clone(&table));
            assembly.tables_by_key.insert(table.key.clone(), table);
        }

        // Fallback default: the first category seen, when none is flagged.
        if assembly.default_category.is_none() {
            assembly.default_category = assembly.first_category.take();
        }

        self.build_value_fields(&mut assembly, &options);

        let currency_conversion = if assembly.currency_required {
            self.currency.clone()
        } else {
            None
        };
        let currency_code = options.currency_code.clone().or_else(|| {
            currency_conversion
                .as_ref()
                .map(|provider| provider.base_currency_code().to_string())
        });

        // Only filters with configured bounds start out active.
        let conditions: Vec<AnalysisFilter> = assembly
            .filters
            .iter()
            .filter(|filter| filter.has_filter_values())
            .cloned()
            .collect();
        let default_settings = Rc::new(AnalysisExecutionSettings::new(
            assembly.default_category.clone(),
            assembly.x_category.clone(),
            assembly.result_columns.clone(),
            conditions,
            options.show_empty,
            currency_code,
        ));

        log::debug!(
            "assembled analysis '{}': {} tables, {} fields, {} categories, {} result columns",
            self.configuration.name,
            assembly.tables_by_key.len(),
            assembly.fields.len(),
            assembly.categories.len(),
            assembly.result_columns.len()
        );

        Analysis {
            configuration: self.configuration.clone(),
            options,
            tables_by_index: assembly.tables_by_index,
            tables_by_key: assembly.tables_by_key,
            fields: assembly.fields,
            value_fields: assembly.value_fields,
            categories: assembly.categories,
            filters: assembly.filters,
            result_columns: assembly.result_columns,
            result_columns_by_key: assembly.result_columns_by_key,
            default_category: assembly.default_category,
            x_category: assembly.x_category,
            currency_field: assembly.currency_field,
            weight_field: assembly.weight_field,
            currency_conversion,
            default_settings,
            result_cache: Default::default(),
            pending: Default::default(),
        }
    }

    /// Resolves one configured field against its result table and registers
    /// everything it contributes: the field itself, its category (plain or
    /// explicit), filter, and currency/weight roles.
    fn build_source_field(
        &self,
        assembly: &mut Assembly,
        options: &AnalysisOptions,
        slot: &ResultTableSlot<'_>,
        table: &AnalysisTable,
        field_config: &FieldConfig,
    ) -> Option<Rc<AnalysisField>> {
        let column_meta = match slot.meta.column_at(field_config.field_index) {
            Some(meta) => meta,
            None => {
                log::debug!(
                    "field index {} out of range for table {}, skipped",
                    field_config.field_index,
                    table.key
                );
                return None;
            }
        };

        let column_index = slot.first_column_index + field_config.field_index;
        let sub_column_indices: Vec<usize> = column_meta
            .sub_field_indices
            .iter()
            .map(|&idx| slot.first_column_index + idx)
            .collect();
        let flags = FieldFlags::from_attributes(field_config.attributes, column_meta.is_date());
        let label = if field_config.label.is_empty() {
            column_meta.name.clone()
        } else {
            field_config.label.clone()
        };

        let field = Rc::new(AnalysisField::source(
            format!("{}.{}", table.key, field_config.field_index),
            label,
            flags,
            slot.query_table_index,
            column_index,
            sub_column_indices,
        ));
        if !assembly.register_field(Rc::clone(&field)) {
            return None;
        }

        if flags.is_category || flags.is_default_category || flags.is_x_category {
            let category = self.build_field_category(assembly, options, &field, field_config);
            assembly.register_category(category, flags);
        }
        if flags.is_filter {
            assembly
                .filters
                .push(AnalysisFilter::source_field(Rc::clone(&field), "", ""));
        }
        if flags.is_currency {
            assembly.currency_field = Some(Rc::clone(&field));
            assembly.currency_required = true;
        }
        if flags.is_weight {
            assembly.weight_field = Some(Rc::clone(&field));
        }

        Some(field)
    }

    /// The category contributed by a flagged source field: explicit-bucket
    /// when the field names a resolvable rule table, plain otherwise. An
    /// unresolvable name degrades to the plain category.
    fn build_field_category(
        &self,
        assembly: &mut Assembly,
        options: &AnalysisOptions,
        field: &Rc<AnalysisField>,
        field_config: &FieldConfig,
    ) -> Rc<AnalysisCategory> {
        if let Some(name) = field_config.explicit_category.as_deref() {
            match self.configuration.explicit_category(name) {
                Some(category_config) => {
                    let rules = Rc::new(ExplicitCategory::from_config(
                        category_config,
                        field.flags.is_date_value,
                    ));
                    let bucket_field =
                        Rc::new(AnalysisField::explicit_bucket(Rc::clone(field), rules));
                    assembly.register_field(Rc::clone(&bucket_field));
                    return Rc::new(AnalysisCategory::explicit_field(bucket_field));
                }
                None => {
                    log::debug!(
                        "explicit category {} for field {} not defined, using plain category",
                        name,
                        field.key
                    );
                }
            }
        }
        Rc::new(AnalysisCategory::source_field(
            Rc::clone(field),
            options.max_number_of_rows,
        ))
    }

    /// Value expressions: each contributes a value field and a result
    /// column, and optionally a category. An expression name the host
    /// cannot resolve still registers the field; its classification yields
    /// the empty sentinel at runtime.
    fn build_value_fields(&self, assembly: &mut Assembly, options: &AnalysisOptions) {
        for value_config in &self.configuration.value_expressions {
            let value_options = ValueFieldOptions::from_options(&value_config.options);
            let evaluator = self.evaluators.evaluator_for(&value_config.expression_name);
            if evaluator.is_none() {
                log::debug!(
                    "no evaluator for value expression {}, field {} stays unresolved",
                    value_config.expression_name,
                    value_config.key
                );
            }
            let label = if value_config.label.is_empty() {
                value_config.key.clone()
            } else {
                value_config.label.clone()
            };
            let field = Rc::new(AnalysisField::value(
                value_config.key.clone(),
                label,
                value_config.expression_name.clone(),
                value_options.clone(),
                evaluator,
            ));
            if !assembly.register_field(Rc::clone(&field)) {
                continue;
            }
            assembly
                .value_fields
                .insert(field.key.clone(), Rc::clone(&field));
            assembly.push_result_column(AnalysisResultColumn::value_field(Rc::clone(&field)));

            if value_options.is_categorizable() {
                let max_rows = if value_options.max_rows > 0 {
                    value_options.max_rows
                } else {
                    options.max_number_of_rows
                };
                let category = Rc::new(AnalysisCategory::value(Rc::clone(&field), max_rows));
                assembly.register_category(category, field.flags);
            }
        }
    }
}
