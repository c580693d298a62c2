use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use super::config::MergeConfig;
use super::dates::ObservationDate;
use super::delimited::extract_delimited_rows;
use super::line_classify::LineClassifier;
use super::sections::extract_section_rows;
use super::source_text::extract_text;
use super::types::{FormatHint, RawDocument, RawResultRow};

/// Why one document contributed no rows. Never fatal for the run.
#[derive(Debug, Error)]
pub(crate) enum DocumentError {
    #[error("text extraction failed: {0:#}")]
    TextExtraction(anyhow::Error),

    #[error("no section header line found")]
    NoSectionHeader,

    #[error("no date header lines found in {sections} section(s)")]
    NoDateHeaders { sections: usize },

    #[error("no result rows recovered")]
    NoRows,

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DocumentRows {
    pub rows: Vec<RawResultRow>,
    pub section_count: usize,
    pub dates: Vec<ObservationDate>,
}

impl DocumentRows {
    pub(crate) fn from_rows(rows: Vec<RawResultRow>, section_count: usize) -> Self {
        let dates = rows
            .iter()
            .flat_map(|row| row.values.keys().copied())
            .collect::<BTreeSet<ObservationDate>>()
            .into_iter()
            .collect();

        Self {
            rows,
            section_count,
            dates,
        }
    }
}

#[derive(Debug)]
pub(crate) struct DocumentExtraction {
    pub identifier: String,
    pub format_hint: FormatHint,
    pub outcome: Result<DocumentRows, DocumentError>,
}

#[derive(Debug)]
pub(crate) struct TableExtractor {
    classifier: LineClassifier,
    cell_split: Regex,
}

impl TableExtractor {
    pub(crate) fn new(config: &MergeConfig) -> Result<Self> {
        Ok(Self {
            classifier: LineClassifier::new(config)?,
            cell_split: Regex::new(r"\s{2,}|\t|\|").context("failed to compile cell split regex")?,
        })
    }

    pub(crate) fn classifier(&self) -> &LineClassifier {
        &self.classifier
    }

    pub(crate) fn extract(&self, document: &RawDocument) -> Result<DocumentRows, DocumentError> {
        match document.format_hint {
            FormatHint::ScanReport => extract_section_rows(document, &self.classifier),
            FormatHint::Tabular => {
                extract_delimited_rows(document, &self.classifier, &self.cell_split)
            }
        }
    }

    /// Loads and extracts source files in parallel; results keep input order.
    /// A file that cannot be read is reported like any other per-document
    /// failure.
    pub(crate) fn extract_paths(
        &self,
        paths: &[PathBuf],
        config: &MergeConfig,
    ) -> Vec<DocumentExtraction> {
        paths
            .par_iter()
            .map(|path| {
                let identifier = document_identifier(path);
                let format_hint = config.format_hint_for(&identifier);
                let outcome = load_document(path, config, &self.classifier)
                    .and_then(|document| self.extract(&document));
                log_outcome(&identifier, format_hint, &outcome);
                DocumentExtraction {
                    identifier,
                    format_hint,
                    outcome,
                }
            })
            .collect()
    }
}

pub(crate) fn document_identifier(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn load_document(
    path: &Path,
    config: &MergeConfig,
    classifier: &LineClassifier,
) -> Result<RawDocument, DocumentError> {
    let identifier = document_identifier(path);
    let format_hint = config.format_hint_for(&identifier);
    let text = extract_text(path, format_hint).map_err(DocumentError::TextExtraction)?;

    Ok(RawDocument {
        format_hint,
        document_date: classifier.dates().date_in_identifier(&identifier),
        identifier,
        text,
    })
}

fn log_outcome(
    identifier: &str,
    format_hint: FormatHint,
    outcome: &Result<DocumentRows, DocumentError>,
) {
    match outcome {
        Ok(rows) => info!(
            document = %identifier,
            strategy = format_hint.strategy_name(),
            sections = rows.section_count,
            rows = rows.rows.len(),
            dates = ?rows.dates.iter().map(ToString::to_string).collect::<Vec<String>>(),
            "extracted document"
        ),
        Err(error) => warn!(
            document = %identifier,
            strategy = format_hint.strategy_name(),
            error = %error,
            "skipping document"
        ),
    }
}
