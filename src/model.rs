use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub filename: String,
    pub format_hint: String,
    pub document_date: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergePaths {
    pub input_dir: String,
    pub output_path: String,
    pub manifest_path: String,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeCounts {
    pub document_count: usize,
    pub parsed_document_count: usize,
    pub skipped_document_count: usize,
    pub section_count: usize,
    pub raw_row_count: usize,
    pub merged_row_count: usize,
    pub date_column_count: usize,
    pub flagged_cell_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub filename: String,
    pub strategy: String,
    pub status: String,
    pub row_count: usize,
    pub date_columns: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub output_format: String,
    pub conflict_policy: String,
    pub paths: MergePaths,
    pub counts: MergeCounts,
    pub date_columns: Vec<String>,
    pub documents: Vec<DocumentOutcome>,
    pub source_hashes: Vec<DocumentEntry>,
    pub warnings: Vec<String>,
}
