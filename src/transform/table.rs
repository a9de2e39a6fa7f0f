//! Tabular view of transformed records.

use super::{apply, cell_text, output_columns, FieldMapping, UnifiedColumn};
use serde::Serialize;
use serde_json::Value;
use std::io;

/// Ordered columns plus one text row per record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TransformedTable {
    /// Transforms `records` and lays them out as a table.
    pub fn build(
        records: &[Value],
        field_mappings: &[FieldMapping],
        unified_columns: &[UnifiedColumn],
    ) -> Self {
        let transformed = apply(records, field_mappings, unified_columns);
        let columns = output_columns(&transformed, field_mappings, unified_columns);
        let rows = transformed
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| cell_text(record.get(column)))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes a header row followed by the data rows.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, csv::Error> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
