//! FILENAME: analysis-engine/src/table.rs
//! Analysis Table - one logical source-table occurrence.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::field::AnalysisField;

/// Groups the fields belonging to one source-table occurrence of the
/// executed query. Created during assembly; immutable thereafter.
#[derive(Debug)]
pub struct AnalysisTable {
    /// String key derived from the source-area id plus the occurrence
    /// index: `"KP"` for the first occurrence, `"KP#1"` for the second.
    pub key: String,

    /// Identifier of the source area this table reads from.
    pub info_area_id: String,

    /// Which occurrence of the source area this table is.
    pub occurrence: usize,

    /// Position of this table within the executed query.
    pub query_table_index: usize,

    /// Fields in configuration order.
    pub fields: Vec<Rc<AnalysisField>>,

    /// Field lookup by configured column index within the table.
    pub fields_by_index: FxHashMap<usize, Rc<AnalysisField>>,

    /// The table's alternate-currency field, when configured.
    pub currency_field: Option<Rc<AnalysisField>>,
}

impl AnalysisTable {
    /// Derives the table key from source-area id and occurrence.
    pub fn key_for(info_area_id: &str, occurrence: usize) -> String {
        if occurrence == 0 {
            info_area_id.to_string()
        } else {
            format!("{}#{}", info_area_id, occurrence)
        }
    }

    pub fn new(info_area_id: impl Into<String>, occurrence: usize, query_table_index: usize) -> Self {
        let info_area_id = info_area_id.into();
        AnalysisTable {
            key: AnalysisTable::key_for(&info_area_id, occurrence),
            info_area_id,
            occurrence,
            query_table_index,
            fields: Vec::new(),
            fields_by_index: FxHashMap::default(),
            currency_field: None,
        }
    }

    /// Registers a field under its configured column index.
    pub fn add_field(&mut self, field_index: usize, field: Rc<AnalysisField>) {
        self.fields.push(Rc::clone(&field));
        self.fields_by_index.insert(field_index, field);
    }

    pub fn field_at(&self, field_index: usize) -> Option<&Rc<AnalysisField>> {
        self.fields_by_index.get(&field_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldFlags;

    #[test]
    fn key_derivation_includes_occurrence() {
        assert_eq!(AnalysisTable::key_for("KP", 0), "KP");
        assert_eq!(AnalysisTable::key_for("KP", 1), "KP#1");
        assert_eq!(AnalysisTable::key_for("FI", 2), "FI#2");
    }

    #[test]
    fn field_registration_and_lookup() {
        let mut table = AnalysisTable::new("KP", 0, 0);
        let field = Rc::new(AnalysisField::source(
            "KP.2",
            "Stage",
            FieldFlags::default(),
            0,
            2,
            Vec::new(),
        ));
        table.add_field(2, Rc::clone(&field));

        assert_eq!(table.fields.len(), 1);
        assert!(Rc::ptr_eq(table.field_at(2).unwrap(), &field));
        assert!(table.field_at(3).is_none());
    }
}
