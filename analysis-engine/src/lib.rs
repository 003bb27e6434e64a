//! FILENAME: analysis-engine/src/lib.rs
//! Analysis subsystem: classification and reporting over CRM query results.
//!
//! This crate turns a stored report definition into a live analysis graph
//! bound to one executed query, classifies data rows into category buckets,
//! and orchestrates result computation. It depends on `datasource` only for
//! the collaborator contracts (rows, result tables, condition checking,
//! value-expression evaluation, currency conversion); the host application
//! provides the implementations.
//!
//! Layers:
//! - `config`: Serializable configuration (what the analysis IS)
//! - `assembler`: Resolves the configuration against the executed query
//! - `field` / `category` / `filter` / `explicit`: The classification model
//! - `settings`: Immutable per-request execution settings and navigation
//! - `analysis`: The root aggregate and result orchestrator

pub mod analysis;
pub mod assembler;
pub mod category;
pub mod columns;
pub mod config;
pub mod error;
pub mod explicit;
pub mod field;
pub mod filter;
pub mod settings;
pub mod table;
pub mod value;

#[cfg(test)]
mod testutil;

pub use analysis::{
    Analysis, AnalysisDelegate, AnalysisProcessing, AnalysisResult, ExecutionContext,
};
pub use assembler::ConfigurationAssembler;
pub use category::{AnalysisCategory, CategoryValues};
pub use columns::{AggregationKind, AnalysisResultColumn, ResultColumnKind};
pub use config::{
    AnalysisConfiguration, AnalysisOptions, ConditionConfig, ExplicitCategoryConfig,
    ExplicitCategoryValueConfig, FieldAttributes, FieldConfig, OptionsMap, TableConfig,
    ValueExpressionConfig, ValueFieldOptions,
};
pub use error::AnalysisError;
pub use explicit::ExplicitCategory;
pub use field::{AnalysisField, FieldFlags, FieldKind};
pub use filter::AnalysisFilter;
pub use settings::{AnalysisExecutionSettings, DrilldownOption, DrillupOption};
pub use table::AnalysisTable;
pub use value::{AnalysisCategoryValue, CategoryValueDictionary};
