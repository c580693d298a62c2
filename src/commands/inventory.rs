use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::InventoryArgs;
use crate::commands::merge::{DateScanner, MergeConfig, is_supported_document};
use crate::model::{DocumentEntry, DocumentInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let config = MergeConfig::load(args.config.as_deref())?;
    let manifest = build_manifest(&args.input_dir, &config)?;

    if args.dry_run {
        for entry in &manifest.documents {
            info!(
                document = %entry.filename,
                format_hint = %entry.format_hint,
                document_date = %entry.document_date.clone().unwrap_or_default(),
                "discovered document"
            );
        }
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.input_dir
            .join("manifests")
            .join("document_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

pub(crate) fn build_manifest(
    input_dir: &Path,
    config: &MergeConfig,
) -> Result<DocumentInventoryManifest> {
    let paths = discover_documents(input_dir)?;
    if paths.is_empty() {
        bail!("no documents found in {}", input_dir.display());
    }

    let scanner = DateScanner::new()?;
    let documents = paths
        .iter()
        .map(|path| describe_document(path, config, &scanner))
        .collect::<Result<Vec<DocumentEntry>>>()?;

    Ok(DocumentInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        document_count: documents.len(),
        documents,
    })
}

/// Report files (`.pdf`, `.txt`) directly inside `input_dir`, sorted by name.
pub fn discover_documents(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        if is_supported_document(&path) {
            documents.push(path);
        }
    }

    documents.sort();
    Ok(documents)
}

pub(crate) fn describe_document(
    path: &Path,
    config: &MergeConfig,
    scanner: &DateScanner,
) -> Result<DocumentEntry> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

    Ok(DocumentEntry {
        format_hint: config.format_hint_for(&filename).as_str().to_string(),
        document_date: scanner
            .date_in_identifier(&filename)
            .map(|date| date.to_string()),
        sha256: sha256_file(path)?,
        filename,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn discover_documents_keeps_only_report_files_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("Scan - CMP - Mar 31, 2025.txt"), "Component\n").expect("write");
        fs::write(dir.path().join("Labcorp_20250306.PDF"), b"%PDF-1.4").expect("write");
        fs::write(dir.path().join("notes.md"), "ignored").expect("write");
        fs::create_dir(dir.path().join("manifests")).expect("mkdir");

        let found = discover_documents(dir.path()).expect("discover");
        let names = found
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect::<Vec<&str>>();

        assert_eq!(names, vec!["Labcorp_20250306.PDF", "Scan - CMP - Mar 31, 2025.txt"]);
    }

    #[test]
    fn build_manifest_records_hint_date_and_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("Scan - CBC - Mar 31, 2025.txt"), "Component\n").expect("write");
        fs::write(dir.path().join("Labcorp_20230728.txt"), "Test  Jul 28, 2023\n").expect("write");

        let manifest = build_manifest(dir.path(), &MergeConfig::default()).expect("manifest");
        assert_eq!(manifest.document_count, 2);

        let labcorp = &manifest.documents[0];
        assert_eq!(labcorp.filename, "Labcorp_20230728.txt");
        assert_eq!(labcorp.format_hint, "tabular");
        assert_eq!(labcorp.document_date.as_deref(), Some("07/28/2023"));
        assert_eq!(labcorp.sha256.len(), 64);

        let scan = &manifest.documents[1];
        assert_eq!(scan.format_hint, "scan_report");
        assert_eq!(scan.document_date.as_deref(), Some("03/31/2025"));
    }

    #[test]
    fn build_manifest_fails_without_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = build_manifest(dir.path(), &MergeConfig::default()).unwrap_err();
        assert!(error.to_string().contains("no documents found"));
    }
}
