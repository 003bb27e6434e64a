//! FILENAME: analysis-engine/src/testutil.rs
//! Hand-built collaborator doubles shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use datasource::{
    AnalysisDataSource, AnalysisRow, ResultSet, TableMeta, ValueEvaluatorProvider,
    ValueExpressionEvaluator,
};

/// A row backed by a plain vector of raw strings; the formatted value is a
/// "fmt:" prefix so tests can tell the two accessors apart.
pub struct TestRow {
    raws: Vec<String>,
    formatted: Vec<String>,
    record_id: String,
}

impl TestRow {
    pub fn new(raws: Vec<&str>) -> Self {
        TestRow {
            formatted: raws.iter().map(|r| format!("fmt:{}", r)).collect(),
            raws: raws.into_iter().map(|r| r.to_string()).collect(),
            record_id: "rec-0".to_string(),
        }
    }
}

impl AnalysisRow for TestRow {
    fn raw_value_at(&self, column: usize) -> &str {
        self.raws.get(column).map(|s| s.as_str()).unwrap_or("")
    }

    fn value_at(&self, column: usize) -> &str {
        self.formatted.get(column).map(|s| s.as_str()).unwrap_or("")
    }

    fn record_identification_at(&self, _table_index: usize) -> &str {
        &self.record_id
    }
}

/// A result set over owned test rows.
pub struct TestResultSet {
    pub rows: Vec<TestRow>,
}

impl TestResultSet {
    pub fn new(rows: Vec<Vec<&str>>) -> Self {
        TestResultSet {
            rows: rows.into_iter().map(TestRow::new).collect(),
        }
    }
}

impl ResultSet for TestResultSet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_at(&self, index: usize) -> Option<&dyn AnalysisRow> {
        self.rows.get(index).map(|r| r as &dyn AnalysisRow)
    }
}

/// A data source with a fixed result-table layout.
pub struct TestDataSource {
    pub tables: Vec<TableMeta>,
}

impl AnalysisDataSource for TestDataSource {
    fn result_tables(&self) -> &[TableMeta] {
        &self.tables
    }
}

/// Evaluates to a fixed column's raw value; stands in for the external
/// value-expression sublanguage.
pub struct ColumnEvaluator {
    pub column: usize,
}

impl ValueExpressionEvaluator for ColumnEvaluator {
    fn text_for_row(&self, row: &dyn AnalysisRow) -> Option<String> {
        Some(row.raw_value_at(self.column).to_string())
    }

    fn array_for_row(&self, _row: &dyn AnalysisRow) -> Option<Vec<String>> {
        None
    }
}

/// Splits a fixed column's raw value on ';' into an array result.
pub struct SplitEvaluator {
    pub column: usize,
}

impl ValueExpressionEvaluator for SplitEvaluator {
    fn text_for_row(&self, row: &dyn AnalysisRow) -> Option<String> {
        Some(row.raw_value_at(self.column).to_string())
    }

    fn array_for_row(&self, row: &dyn AnalysisRow) -> Option<Vec<String>> {
        let raw = row.raw_value_at(self.column);
        if raw.is_empty() {
            return None;
        }
        Some(raw.split(';').map(|s| s.to_string()).collect())
    }
}

/// Provider handing out [`ColumnEvaluator`]s registered by expression name.
pub struct TestEvaluatorProvider {
    pub evaluators: RefCell<Vec<(String, Rc<dyn ValueExpressionEvaluator>)>>,
}

impl TestEvaluatorProvider {
    pub fn new() -> Self {
        TestEvaluatorProvider {
            evaluators: RefCell::new(Vec::new()),
        }
    }

    pub fn register(&self, name: &str, evaluator: Rc<dyn ValueExpressionEvaluator>) {
        self.evaluators
            .borrow_mut()
            .push((name.to_string(), evaluator));
    }
}

impl ValueEvaluatorProvider for TestEvaluatorProvider {
    fn evaluator_for(&self, expression_name: &str) -> Option<Rc<dyn ValueExpressionEvaluator>> {
        self.evaluators
            .borrow()
            .iter()
            .find(|(name, _)| name == expression_name)
            .map(|(_, evaluator)| Rc::clone(evaluator))
    }
}
