use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, warn};

use super::dates::ObservationDate;
use super::document::{DocumentError, DocumentRows};
use super::line_classify::{LineClassifier, LineKind};
use super::types::{RawDocument, RawResultRow};

const RANGE_HEADERS: [&str; 5] = [
    "reference range",
    "normal range",
    "range",
    "reference interval",
    "standard range",
];
const RESULT_HEADERS: [&str; 5] = ["result", "results", "value", "your value", "current result"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnRole {
    Date(ObservationDate),
    ReferenceRange,
    Ignored,
}

/// Column-header strategy: the first section header names the columns and
/// every later line with at least as many cells becomes one row.
pub(crate) fn extract_delimited_rows(
    document: &RawDocument,
    classifier: &LineClassifier,
    cell_split: &Regex,
) -> Result<DocumentRows, DocumentError> {
    let lines = classifier.classify_text(&document.text);
    let header_index = lines
        .iter()
        .position(|line| line.kind == LineKind::SectionHeader)
        .ok_or(DocumentError::NoSectionHeader)?;
    let header = lines[header_index];

    let headers = split_cells(header.text, cell_split);
    if headers.len() < 2 {
        return Err(DocumentError::Parse {
            line: header.number,
            reason: format!(
                "column header has {} cell(s); expected a test column and at least one result column",
                headers.len()
            ),
        });
    }

    let fallback_date = document
        .document_date
        .or_else(|| classifier.dates().first_date_in(&document.text));
    let roles = headers
        .iter()
        .skip(1)
        .map(|cell| resolve_column_role(cell, fallback_date))
        .collect::<Vec<ColumnRole>>();

    for (cell, role) in headers.iter().skip(1).zip(&roles) {
        if *role == ColumnRole::Ignored {
            warn!(
                document = %document.identifier,
                column = %cell,
                "ignoring column header that is neither a date nor a reference range"
            );
        }
    }

    if !roles.iter().any(|role| matches!(role, ColumnRole::Date(_))) {
        return Err(DocumentError::NoDateHeaders { sections: 1 });
    }

    let mut rows = Vec::new();
    for line in &lines[header_index + 1..] {
        if line.kind == LineKind::SectionHeader {
            continue;
        }

        let cells = split_cells(line.text, cell_split);
        if cells.len() < headers.len() {
            debug!(
                document = %document.identifier,
                line = line.number,
                cells = cells.len(),
                expected = headers.len(),
                "discarding malformed row"
            );
            continue;
        }

        let mut values = BTreeMap::new();
        let mut reference_range = None;
        for (cell, role) in cells.iter().skip(1).zip(&roles) {
            match role {
                ColumnRole::Date(date) => {
                    values.entry(*date).or_insert_with(|| cell.clone());
                }
                ColumnRole::ReferenceRange => reference_range = Some(cell.clone()),
                ColumnRole::Ignored => {}
            }
        }

        rows.push(RawResultRow {
            source: document.identifier.clone(),
            test_name: cells[0].clone(),
            reference_range,
            values,
        });
    }

    if rows.is_empty() {
        return Err(DocumentError::NoRows);
    }

    Ok(DocumentRows::from_rows(rows, 1))
}

pub(crate) fn resolve_column_role(
    header: &str,
    fallback_date: Option<ObservationDate>,
) -> ColumnRole {
    if let Some(date) = ObservationDate::parse(header) {
        return ColumnRole::Date(date);
    }

    let lowered = header.trim().trim_end_matches(':').to_lowercase();
    if RANGE_HEADERS.contains(&lowered.as_str()) {
        return ColumnRole::ReferenceRange;
    }
    if RESULT_HEADERS.contains(&lowered.as_str())
        && let Some(date) = fallback_date
    {
        return ColumnRole::Date(date);
    }

    ColumnRole::Ignored
}

fn split_cells(line: &str, cell_split: &Regex) -> Vec<String> {
    cell_split
        .split(line)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
