use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::info;

use crate::cli::OutputFormat;
use crate::util::{ensure_parent_directory, now_utc_string, write_json_pretty};

use super::assemble::{CellRef, FinalTable, TableRow};

/// Destination for the finished table.
pub(crate) trait TableSink {
    fn write(&self, table: &FinalTable, path: &Path) -> Result<()>;
}

pub(crate) fn sink_for(format: OutputFormat, flag_suffix: Option<String>) -> Box<dyn TableSink> {
    match format {
        OutputFormat::Csv => Box::new(CsvSink { flag_suffix }),
        OutputFormat::Json => Box::new(JsonSink),
        OutputFormat::Sqlite => Box::new(SqliteSink),
    }
}

#[derive(Debug, Default)]
pub(crate) struct CsvSink {
    pub flag_suffix: Option<String>,
}

impl TableSink for CsvSink {
    fn write(&self, table: &FinalTable, path: &Path) -> Result<()> {
        ensure_parent_directory(path)?;
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create csv file: {}", path.display()))?;

        writer
            .write_record(&table.columns)
            .with_context(|| format!("failed to write csv header: {}", path.display()))?;

        for row in &table.rows {
            let mut record = table.record(row);
            if let Some(suffix) = self.flag_suffix.as_deref() {
                for (index, cell) in row.cells.iter().enumerate() {
                    if cell.class.is_flagged() {
                        record[index + 1].push_str(suffix);
                    }
                }
            }
            writer
                .write_record(&record)
                .with_context(|| format!("failed to write csv row: {}", path.display()))?;
        }

        writer
            .flush()
            .with_context(|| format!("failed to flush csv file: {}", path.display()))?;

        info!(path = %path.display(), rows = table.rows.len(), "wrote csv table");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TableReport<'a> {
    generated_at: String,
    columns: &'a [String],
    rows: &'a [TableRow],
    flagged_cells: Vec<CellRef>,
}

#[derive(Debug, Default)]
pub(crate) struct JsonSink;

impl TableSink for JsonSink {
    fn write(&self, table: &FinalTable, path: &Path) -> Result<()> {
        let report = TableReport {
            generated_at: now_utc_string(),
            columns: &table.columns,
            rows: &table.rows,
            flagged_cells: table.flagged_cells(),
        };
        write_json_pretty(path, &report)?;

        info!(path = %path.display(), rows = table.rows.len(), "wrote json table");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct SqliteSink;

impl TableSink for SqliteSink {
    fn write(&self, table: &FinalTable, path: &Path) -> Result<()> {
        ensure_parent_directory(path)?;
        let mut connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        connection
            .execute_batch(
                "
                DROP TABLE IF EXISTS observations;
                DROP TABLE IF EXISTS lab_tests;
                CREATE TABLE lab_tests (
                    test_id INTEGER PRIMARY KEY,
                    test_name TEXT NOT NULL,
                    reference_range TEXT NOT NULL,
                    sources TEXT NOT NULL
                );
                CREATE TABLE observations (
                    test_id INTEGER NOT NULL REFERENCES lab_tests(test_id),
                    observed_on TEXT NOT NULL,
                    value TEXT NOT NULL,
                    range_class TEXT NOT NULL,
                    out_of_range INTEGER NOT NULL,
                    PRIMARY KEY (test_id, observed_on)
                );
                ",
            )
            .context("failed to create result tables")?;

        let tx = connection
            .transaction()
            .context("failed to start result transaction")?;
        let mut observation_count = 0usize;
        {
            let mut test_statement = tx
                .prepare(
                    "INSERT INTO lab_tests (test_id, test_name, reference_range, sources)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("failed to prepare lab_tests insert")?;
            let mut observation_statement = tx
                .prepare(
                    "INSERT INTO observations (test_id, observed_on, value, range_class, out_of_range)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("failed to prepare observations insert")?;

            for (row_index, row) in table.rows.iter().enumerate() {
                let test_id = (row_index + 1) as i64;
                test_statement
                    .execute(params![
                        test_id,
                        row.test,
                        row.reference_range,
                        row.sources.join("; ")
                    ])
                    .with_context(|| format!("failed to insert test {}", row.test))?;

                for (date, cell) in table.dates.iter().zip(&row.cells) {
                    if cell.value.is_empty() {
                        continue;
                    }
                    observation_statement
                        .execute(params![
                            test_id,
                            date.naive(),
                            cell.value,
                            cell.class.as_str(),
                            cell.class.is_flagged()
                        ])
                        .with_context(|| {
                            format!("failed to insert observation for {} on {}", row.test, date)
                        })?;
                    observation_count += 1;
                }
            }
        }
        tx.commit().context("failed to commit result tables")?;

        info!(
            path = %path.display(),
            tests = table.rows.len(),
            observations = observation_count,
            "wrote sqlite table"
        );
        Ok(())
    }
}
