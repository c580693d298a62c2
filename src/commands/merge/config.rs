use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::ConflictPolicy;
use crate::util::read_json;

use super::types::FormatHint;

/// Parsing and reconciliation knobs, loaded from a JSON file.
///
/// Every field falls back to its default, so a config file only needs the
/// entries it changes. File `aliases` are added to the built-in synonyms,
/// overriding a built-in label only when the file names it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MergeConfig {
    pub section_markers: Vec<String>,
    pub range_marker: String,
    pub scan_prefix: String,
    pub unit_fragments: Vec<String>,
    pub new_test_tokens: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub conflict_policy: ConflictPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            section_markers: to_strings(&["Component", "Test"]),
            range_marker: "Normal Range:".to_string(),
            scan_prefix: "scan".to_string(),
            unit_fragments: to_strings(&[
                "m2",
                "m²",
                "mL/min/1.73m2",
                "%",
                "mg/dL",
                "mmol/L",
                "g/dL",
                "U/L",
                "fL",
                "pg",
                "x10E3/uL",
                "x10E6/uL",
            ]),
            new_test_tokens: to_strings(&["CO2", "A1C", "HBA1C", "B12", "T3", "T4", "FT3", "FT4"]),
            aliases: default_aliases(),
            conflict_policy: ConflictPolicy::FirstWins,
        }
    }
}

impl MergeConfig {
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let mut config: Self = read_json(path)?;
        let mut aliases = default_aliases();
        aliases.extend(config.aliases);
        config.aliases = aliases;

        info!(
            path = %path.display(),
            aliases = config.aliases.len(),
            conflict_policy = config.conflict_policy.as_str(),
            "loaded merge config"
        );
        Ok(config)
    }

    pub(crate) fn format_hint_for(&self, identifier: &str) -> FormatHint {
        let prefix = self.scan_prefix.trim();
        let matches_prefix = !prefix.is_empty()
            && identifier
                .trim_start()
                .get(..prefix.len())
                .map(|head| head.eq_ignore_ascii_case(prefix))
                .unwrap_or(false);

        if matches_prefix {
            FormatHint::ScanReport
        } else {
            FormatHint::Tabular
        }
    }
}

fn default_aliases() -> BTreeMap<String, String> {
    let total = "Testosterone, Total, LC/MS";
    let free = "Free Testosterone (Direct)";

    [
        ("Testosterone Total", total),
        ("Testosterone, Total, LC/MS", total),
        ("Testosterone, Total, LC/MS-LC", total),
        ("Free Testosterone", free),
        ("Free Testosterone (Direct)", free),
    ]
    .into_iter()
    .map(|(label, canonical)| (label.to_string(), canonical.to_string()))
    .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
