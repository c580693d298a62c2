use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::info;

use crate::cli::ConflictPolicy;

use super::dates::ObservationDate;
use super::types::{MergedRow, RawResultRow};

/// Normalized, alias-resolved identity of a lab test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CanonicalTestKey(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("conflicting values for '{test}' on {date}: '{kept}' vs '{incoming}' (from {source_document})")]
pub(crate) struct ConflictError {
    pub test: String,
    pub date: ObservationDate,
    pub kept: String,
    pub incoming: String,
    pub source_document: String,
}

/// Lower-case and drop whitespace and punctuation: "Testosterone, Total"
/// becomes "testosteronetotal".
pub(crate) fn normalize_test_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|character| character.is_alphanumeric() || *character == '_')
        .collect()
}

pub(crate) fn normalize_range(range: Option<&str>) -> String {
    let Some(range) = range else {
        return String::new();
    };

    let dashed = range
        .trim()
        .to_lowercase()
        .replace(['–', '—', '‐', '−'], "-");
    let collapsed = dashed.split_whitespace().collect::<Vec<&str>>().join(" ");
    collapsed.replace(" - ", "-").replace("- ", "-").replace(" -", "-")
}

/// Synonym table mapping normalized labels to a canonical normalized label.
#[derive(Debug, Clone, Default)]
pub(crate) struct AliasTable {
    canonical: HashMap<String, String>,
}

impl AliasTable {
    pub(crate) fn from_labels(aliases: &BTreeMap<String, String>) -> Self {
        Self {
            canonical: aliases
                .iter()
                .map(|(label, canonical)| {
                    (normalize_test_name(label), normalize_test_name(canonical))
                })
                .filter(|(label, canonical)| !label.is_empty() && !canonical.is_empty())
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.canonical.len()
    }

    pub(crate) fn canonical_key(&self, test_name: &str) -> CanonicalTestKey {
        let normalized = normalize_test_name(test_name);
        match self.canonical.get(&normalized) {
            Some(canonical) => CanonicalTestKey(canonical.clone()),
            None => CanonicalTestKey(normalized),
        }
    }
}

#[derive(Debug)]
struct MergeGroup {
    display_test_name: String,
    reference_range: Option<String>,
    values: BTreeMap<ObservationDate, String>,
    sources: Vec<String>,
}

impl MergeGroup {
    fn new(row: &RawResultRow) -> Self {
        Self {
            display_test_name: row.test_name.clone(),
            reference_range: row.reference_range.clone(),
            values: BTreeMap::new(),
            sources: Vec::new(),
        }
    }

    fn absorb(&mut self, row: &RawResultRow, policy: ConflictPolicy) -> Result<(), ConflictError> {
        if row.test_name.chars().count() > self.display_test_name.chars().count() {
            self.display_test_name = row.test_name.clone();
        }
        if !self.sources.contains(&row.source) {
            self.sources.push(row.source.clone());
        }

        for (date, value) in &row.values {
            let value = value.trim();
            // Blank cells keep their date column but never displace a value.
            if value.is_empty() {
                self.values.entry(*date).or_default();
                continue;
            }

            match policy {
                ConflictPolicy::FirstWins => {
                    let kept = self.values.entry(*date).or_default();
                    if kept.is_empty() {
                        *kept = value.to_string();
                    }
                }
                ConflictPolicy::LastWins => {
                    self.values.insert(*date, value.to_string());
                }
                ConflictPolicy::Error => match self.values.get(date) {
                    Some(kept) if !kept.is_empty() && kept != value => {
                        return Err(ConflictError {
                            test: self.display_test_name.clone(),
                            date: *date,
                            kept: kept.clone(),
                            incoming: value.to_string(),
                            source_document: row.source.clone(),
                        });
                    }
                    _ => {
                        self.values.insert(*date, value.to_string());
                    }
                },
            }
        }

        Ok(())
    }

    fn into_row(self) -> MergedRow {
        MergedRow {
            display_test_name: self.display_test_name,
            reference_range: self.reference_range,
            values: self.values,
            sources: self.sources,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Reconciler {
    aliases: AliasTable,
    policy: ConflictPolicy,
}

impl Reconciler {
    pub(crate) fn new(aliases: AliasTable, policy: ConflictPolicy) -> Self {
        Self { aliases, policy }
    }

    /// Merges rows sharing a canonical test key and normalized range into one
    /// row per test, sorted case-insensitively by display name.
    pub(crate) fn reconcile(&self, rows: &[RawResultRow]) -> Result<Vec<MergedRow>, ConflictError> {
        let mut index = HashMap::<(CanonicalTestKey, String), usize>::new();
        let mut groups = Vec::<MergeGroup>::new();

        for row in rows {
            let key = (
                self.aliases.canonical_key(&row.test_name),
                normalize_range(row.reference_range.as_deref()),
            );
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(MergeGroup::new(row));
                groups.len() - 1
            });
            groups[slot].absorb(row, self.policy)?;
        }

        let mut merged = groups
            .into_iter()
            .map(MergeGroup::into_row)
            .collect::<Vec<MergedRow>>();
        merged.sort_by(|a, b| {
            a.display_test_name
                .to_lowercase()
                .cmp(&b.display_test_name.to_lowercase())
        });

        info!(
            raw_rows = rows.len(),
            merged_rows = merged.len(),
            aliases = self.aliases.len(),
            policy = self.policy.as_str(),
            "reconciled rows"
        );

        Ok(merged)
    }
}
