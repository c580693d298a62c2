use std::collections::HashSet;

use anyhow::Result;

use super::config::MergeConfig;
use super::dates::{DateScanner, ObservationDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    SectionHeader,
    DateHeader,
    RangeFragment,
    /// Wrapped unit remnant such as "m2"; never starts a test.
    UnitFragment,
    NumericValue,
    Label,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassifiedLine<'a> {
    pub number: usize,
    pub text: &'a str,
    pub kind: LineKind,
}

#[derive(Debug)]
pub(crate) struct LineClassifier {
    section_markers: Vec<String>,
    range_marker: String,
    unit_fragments: HashSet<String>,
    new_test_tokens: HashSet<String>,
    dates: DateScanner,
}

impl LineClassifier {
    pub(crate) fn new(config: &MergeConfig) -> Result<Self> {
        Ok(Self {
            section_markers: config
                .section_markers
                .iter()
                .map(|marker| marker.trim().to_string())
                .filter(|marker| !marker.is_empty())
                .collect(),
            range_marker: config.range_marker.trim().to_string(),
            unit_fragments: config
                .unit_fragments
                .iter()
                .map(|fragment| fragment.trim().to_lowercase())
                .collect(),
            new_test_tokens: config
                .new_test_tokens
                .iter()
                .map(|token| token.trim().to_uppercase())
                .collect(),
            dates: DateScanner::new()?,
        })
    }

    pub(crate) fn dates(&self) -> &DateScanner {
        &self.dates
    }

    pub(crate) fn classify(&self, line: &str) -> LineKind {
        let line = line.trim();

        if self.is_section_header(line) {
            return LineKind::SectionHeader;
        }
        if self.strip_range_marker(line).is_some() {
            return LineKind::RangeFragment;
        }
        if self.dates.parse_date_line(line).is_some() {
            return LineKind::DateHeader;
        }
        if self.new_test_tokens.contains(&line.to_uppercase()) {
            return LineKind::Label;
        }
        if self.unit_fragments.contains(&line.to_lowercase()) {
            return LineKind::UnitFragment;
        }
        if line.chars().any(|character| character.is_ascii_digit()) {
            return LineKind::NumericValue;
        }

        LineKind::Label
    }

    /// Classifies every non-blank line of `text`, keeping 1-based line numbers.
    pub(crate) fn classify_text<'a>(&self, text: &'a str) -> Vec<ClassifiedLine<'a>> {
        text.lines()
            .enumerate()
            .map(|(index, raw)| (index + 1, raw.trim()))
            .filter(|(_, line)| !line.is_empty())
            .map(|(number, line)| ClassifiedLine {
                number,
                text: line,
                kind: self.classify(line),
            })
            .collect()
    }

    pub(crate) fn parse_date_header(&self, line: &str) -> Option<ObservationDate> {
        self.dates.parse_date_line(line)
    }

    /// Range text after the marker, or `None` when the line has no marker.
    pub(crate) fn strip_range_marker<'a>(&self, line: &'a str) -> Option<&'a str> {
        let marker = self.range_marker.as_str();
        if marker.is_empty() {
            return None;
        }

        let trimmed = line.trim_start();
        let head = trimmed.get(..marker.len())?;
        if !head.eq_ignore_ascii_case(marker) {
            return None;
        }

        trimmed.get(marker.len()..).map(str::trim)
    }

    fn is_section_header(&self, line: &str) -> bool {
        self.section_markers.iter().any(|marker| {
            let Some(head) = line.get(..marker.len()) else {
                return false;
            };
            if !head.eq_ignore_ascii_case(marker) {
                return false;
            }

            line[marker.len()..]
                .chars()
                .next()
                .map(|next| !next.is_alphanumeric())
                .unwrap_or(true)
        })
    }
}
