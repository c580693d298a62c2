use std::collections::BTreeSet;

use serde::Serialize;

use super::dates::ObservationDate;
use super::range_eval::{RangeClass, classify};
use super::types::MergedRow;

pub(crate) const TEST_COLUMN: &str = "Test";
pub(crate) const REFERENCE_RANGE_COLUMN: &str = "Reference Range";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TableCell {
    pub value: String,
    pub class: RangeClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TableRow {
    pub test: String,
    pub cells: Vec<TableCell>,
    pub reference_range: String,
    pub sources: Vec<String>,
}

/// Zero-based coordinates in header-column space (column 0 is the test name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct CellRef {
    pub row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FinalTable {
    pub columns: Vec<String>,
    pub dates: Vec<ObservationDate>,
    pub rows: Vec<TableRow>,
}

impl FinalTable {
    pub(crate) fn flagged_cells(&self) -> Vec<CellRef> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row_index, row)| {
                row.cells
                    .iter()
                    .enumerate()
                    .filter(|(_, cell)| cell.class.is_flagged())
                    .map(move |(cell_index, _)| CellRef {
                        row: row_index,
                        column: cell_index + 1,
                    })
            })
            .collect()
    }

    /// Rendered row in column order: test, one value per date, range.
    pub(crate) fn record(&self, row: &TableRow) -> Vec<String> {
        let mut record = Vec::with_capacity(self.columns.len());
        record.push(row.test.clone());
        record.extend(row.cells.iter().map(|cell| cell.value.clone()));
        record.push(row.reference_range.clone());
        record
    }
}

/// Lays merged rows out as Test, chronologically sorted dates, Reference
/// Range; every cell is classified against the row's reference range.
/// A date reported only with blank cells still gets its column.
pub(crate) fn assemble_table(merged: Vec<MergedRow>) -> FinalTable {
    let dates = merged
        .iter()
        .flat_map(|row| row.values.keys().copied())
        .collect::<BTreeSet<ObservationDate>>()
        .into_iter()
        .collect::<Vec<ObservationDate>>();

    let mut columns = Vec::with_capacity(dates.len() + 2);
    columns.push(TEST_COLUMN.to_string());
    columns.extend(dates.iter().map(ToString::to_string));
    columns.push(REFERENCE_RANGE_COLUMN.to_string());

    let rows = merged
        .into_iter()
        .map(|row| {
            let reference_range = row.reference_range.unwrap_or_default();
            let cells = dates
                .iter()
                .map(|date| {
                    let value = row.values.get(date).cloned().unwrap_or_default();
                    let class = classify(&reference_range, &value);
                    TableCell { value, class }
                })
                .collect();

            TableRow {
                test: row.display_test_name,
                cells,
                reference_range,
                sources: row.sources,
            }
        })
        .collect();

    FinalTable {
        columns,
        dates,
        rows,
    }
}
