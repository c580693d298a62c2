use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::MergeArgs;
use crate::commands::inventory;
use crate::model::{DocumentEntry, DocumentOutcome, MergeCounts, MergePaths, MergeRunManifest};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

use super::assemble::assemble_table;
use super::config::MergeConfig;
use super::dates::DateScanner;
use super::document::{DocumentExtraction, TableExtractor};
use super::reconcile::{AliasTable, Reconciler};
use super::sink::sink_for;
use super::types::RawResultRow;

pub fn run(args: MergeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("merge-{}", utc_compact_string(started_ts));

    let mut config = MergeConfig::load(args.config.as_deref())?;
    if let Some(policy) = args.conflict_policy {
        config.conflict_policy = policy;
    }

    let input_dir = args.input_dir.clone();
    let output_path = args.output.clone().unwrap_or_else(|| {
        input_dir.join(format!(
            "Combined_Lab_Results.{}",
            args.output_format.extension()
        ))
    });
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        input_dir
            .join("manifests")
            .join(format!("merge_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(input_dir = %input_dir.display(), run_id = %run_id, "starting merge");

    let paths = inventory::discover_documents(&input_dir)?;
    if paths.is_empty() {
        bail!("no files found in {}", input_dir.display());
    }

    let extractor = TableExtractor::new(&config)?;
    let extractions = extractor.extract_paths(&paths, &config);
    let (rows, outcomes, warnings) = collect_extractions(extractions);

    let parsed_document_count = outcomes
        .iter()
        .filter(|outcome| outcome.record.error.is_none())
        .count();
    if rows.is_empty() {
        bail!(
            "no data extracted from {} document(s) in {}",
            paths.len(),
            input_dir.display()
        );
    }

    let reconciler = Reconciler::new(
        AliasTable::from_labels(&config.aliases),
        config.conflict_policy,
    );
    let merged = reconciler
        .reconcile(&rows)
        .context("failed to reconcile extracted rows")?;
    if merged.is_empty() {
        bail!("no data extracted: reconciliation produced no rows");
    }

    let table = assemble_table(merged);
    let flagged_cell_count = table.flagged_cells().len();
    info!(
        rows = table.rows.len(),
        columns = ?table.columns,
        flagged = flagged_cell_count,
        "assembled final table"
    );

    sink_for(args.output_format, args.flag_suffix.clone()).write(&table, &output_path)?;

    let source_hashes = hash_sources(&paths, &config, extractor.classifier().dates());
    let manifest = MergeRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        output_format: args.output_format.as_str().to_string(),
        conflict_policy: config.conflict_policy.as_str().to_string(),
        paths: MergePaths {
            input_dir: input_dir.display().to_string(),
            output_path: output_path.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
            config_path: args.config.as_ref().map(|path| path.display().to_string()),
        },
        counts: MergeCounts {
            document_count: paths.len(),
            parsed_document_count,
            skipped_document_count: paths.len() - parsed_document_count,
            section_count: outcomes.iter().map(|outcome| outcome.section_count).sum(),
            raw_row_count: rows.len(),
            merged_row_count: table.rows.len(),
            date_column_count: table.dates.len(),
            flagged_cell_count,
        },
        date_columns: table.dates.iter().map(ToString::to_string).collect(),
        documents: outcomes.into_iter().map(|outcome| outcome.record).collect(),
        source_hashes,
        warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote merge run manifest");
    info!(output = %output_path.display(), "merge completed");

    Ok(())
}

struct OutcomeSummary {
    record: DocumentOutcome,
    section_count: usize,
}

fn collect_extractions(
    extractions: Vec<DocumentExtraction>,
) -> (Vec<RawResultRow>, Vec<OutcomeSummary>, Vec<String>) {
    let mut rows = Vec::new();
    let mut outcomes = Vec::with_capacity(extractions.len());
    let mut warnings = Vec::new();

    for extraction in extractions {
        let strategy = extraction.format_hint.strategy_name().to_string();
        match extraction.outcome {
            Ok(document_rows) => {
                outcomes.push(OutcomeSummary {
                    record: DocumentOutcome {
                        filename: extraction.identifier,
                        strategy,
                        status: "parsed".to_string(),
                        row_count: document_rows.rows.len(),
                        date_columns: document_rows
                            .dates
                            .iter()
                            .map(ToString::to_string)
                            .collect(),
                        error: None,
                    },
                    section_count: document_rows.section_count,
                });
                rows.extend(document_rows.rows);
            }
            Err(error) => {
                let message = error.to_string();
                warnings.push(format!("{}: {}", extraction.identifier, message));
                outcomes.push(OutcomeSummary {
                    record: DocumentOutcome {
                        filename: extraction.identifier,
                        strategy,
                        status: "skipped".to_string(),
                        row_count: 0,
                        date_columns: Vec::new(),
                        error: Some(message),
                    },
                    section_count: 0,
                });
            }
        }
    }

    (rows, outcomes, warnings)
}

fn hash_sources(
    paths: &[PathBuf],
    config: &MergeConfig,
    scanner: &DateScanner,
) -> Vec<DocumentEntry> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        match inventory::describe_document(path, config, scanner) {
            Ok(entry) => entries.push(entry),
            Err(error) => warn!(path = %path.display(), error = %error, "failed to hash source"),
        }
    }
    entries
}
