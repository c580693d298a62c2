use std::collections::BTreeMap;

use super::dates::ObservationDate;

/// Which extraction strategy a document is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatHint {
    /// Free-flowing scanned report, parsed section by section.
    ScanReport,
    /// Column-aligned report, parsed from a delimited header row.
    Tabular,
}

impl FormatHint {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ScanReport => "scan_report",
            Self::Tabular => "tabular",
        }
    }

    pub(crate) fn strategy_name(self) -> &'static str {
        match self {
            Self::ScanReport => "section_state_machine",
            Self::Tabular => "delimited_columns",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RawDocument {
    pub identifier: String,
    pub text: String,
    pub format_hint: FormatHint,
    pub document_date: Option<ObservationDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawResultRow {
    pub source: String,
    pub test_name: String,
    pub reference_range: Option<String>,
    pub values: BTreeMap<ObservationDate, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergedRow {
    pub display_test_name: String,
    pub reference_range: Option<String>,
    pub values: BTreeMap<ObservationDate, String>,
    pub sources: Vec<String>,
}
