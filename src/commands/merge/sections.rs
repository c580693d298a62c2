use std::collections::BTreeMap;

use tracing::debug;

use super::dates::ObservationDate;
use super::document::{DocumentError, DocumentRows};
use super::line_classify::{ClassifiedLine, LineClassifier, LineKind};
use super::types::{RawDocument, RawResultRow};

/// Parser position inside a scanned report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionState {
    /// Before the first section header.
    Preamble,
    /// Right after a section header, collecting date columns.
    AwaitingDates,
    AwaitingTestOrRange,
    /// Inside a reference range that may wrap onto following lines.
    AccumulatingRange,
    /// Section without date headers; ignored up to the next header.
    SkippingSection,
}

#[derive(Debug)]
struct PendingTest {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Default)]
struct RangeText {
    text: String,
    fragments: Vec<String>,
}

impl RangeText {
    fn new(first: &str) -> Self {
        let mut range = Self::default();
        range.absorb(first);
        range
    }

    fn absorb(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        self.fragments.push(fragment.to_string());
    }

    /// Still waiting for its upper bound or first token.
    fn is_open(&self) -> bool {
        let text = self.text.trim_end();
        if text.is_empty() {
            return true;
        }

        let lowered = text.to_lowercase();
        lowered.ends_with(['-', '–', '—', '<', '>', '='])
            || lowered == "to"
            || lowered.ends_with(" to")
    }

    /// Exact fragment match: a value equal to a range bound is still a value.
    fn contains_fragment(&self, line: &str) -> bool {
        self.fragments.iter().any(|fragment| fragment == line)
    }
}

/// Explicit state machine over classified lines of one scanned report.
///
/// Tests complete when the next label, section header or end of text is
/// reached; values are assigned to the section's dates in order.
#[derive(Debug)]
pub(crate) struct SectionParser<'a> {
    source: &'a str,
    classifier: &'a LineClassifier,
    state: SectionState,
    dates: Vec<ObservationDate>,
    current: Option<PendingTest>,
    range: Option<RangeText>,
    rows: Vec<RawResultRow>,
    section_count: usize,
    skipped_sections: usize,
}

impl<'a> SectionParser<'a> {
    pub(crate) fn new(source: &'a str, classifier: &'a LineClassifier) -> Self {
        Self {
            source,
            classifier,
            state: SectionState::Preamble,
            dates: Vec::new(),
            current: None,
            range: None,
            rows: Vec::new(),
            section_count: 0,
            skipped_sections: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> SectionState {
        self.state
    }

    pub(crate) fn step(&mut self, line: &ClassifiedLine<'_>) {
        if line.kind == LineKind::SectionHeader {
            self.begin_section();
            return;
        }

        match self.state {
            SectionState::Preamble | SectionState::SkippingSection => {}
            SectionState::AwaitingDates => self.on_awaiting_dates(line),
            SectionState::AwaitingTestOrRange => self.on_test_or_range(line),
            SectionState::AccumulatingRange => self.on_range_line(line),
        }
    }

    pub(crate) fn finish(mut self) -> Result<DocumentRows, DocumentError> {
        self.close_section();

        if self.section_count == 0 {
            return Err(DocumentError::NoSectionHeader);
        }
        if self.skipped_sections == self.section_count {
            return Err(DocumentError::NoDateHeaders {
                sections: self.section_count,
            });
        }
        if self.rows.is_empty() {
            return Err(DocumentError::NoRows);
        }

        Ok(DocumentRows::from_rows(self.rows, self.section_count))
    }

    fn begin_section(&mut self) {
        self.close_section();
        self.section_count += 1;
        self.dates.clear();
        self.state = SectionState::AwaitingDates;
    }

    fn close_section(&mut self) {
        if self.state == SectionState::AwaitingDates && self.dates.is_empty() {
            self.mark_section_skipped();
        }
        self.flush_current();
        self.range = None;
    }

    fn mark_section_skipped(&mut self) {
        self.skipped_sections += 1;
        debug!(
            document = %self.source,
            section = self.section_count,
            "section has no date headers; skipping"
        );
    }

    fn on_awaiting_dates(&mut self, line: &ClassifiedLine<'_>) {
        if line.kind == LineKind::DateHeader
            && let Some(date) = self.classifier.parse_date_header(line.text)
        {
            self.dates.push(date);
            return;
        }

        if self.dates.is_empty() {
            self.mark_section_skipped();
            self.state = SectionState::SkippingSection;
            return;
        }

        self.state = SectionState::AwaitingTestOrRange;
        self.on_test_or_range(line);
    }

    fn on_test_or_range(&mut self, line: &ClassifiedLine<'_>) {
        match line.kind {
            LineKind::Label => {
                self.flush_current();
                self.range = None;
                self.current = Some(PendingTest {
                    name: line.text.to_string(),
                    values: Vec::new(),
                });
            }
            LineKind::RangeFragment => {
                let text = self.classifier.strip_range_marker(line.text).unwrap_or("");
                self.range = Some(RangeText::new(text));
                self.state = SectionState::AccumulatingRange;
            }
            LineKind::NumericValue => self.push_value(line),
            LineKind::UnitFragment | LineKind::DateHeader | LineKind::SectionHeader => {
                debug!(
                    document = %self.source,
                    line = line.number,
                    text = %line.text,
                    "ignoring line"
                );
            }
        }
    }

    fn on_range_line(&mut self, line: &ClassifiedLine<'_>) {
        let Some(range) = self.range.as_mut() else {
            self.state = SectionState::AwaitingTestOrRange;
            self.on_test_or_range(line);
            return;
        };

        let continues = match line.kind {
            LineKind::UnitFragment => true,
            LineKind::NumericValue | LineKind::Label => range.is_open(),
            LineKind::RangeFragment | LineKind::DateHeader | LineKind::SectionHeader => false,
        };

        if continues {
            range.absorb(line.text);
            return;
        }

        self.state = SectionState::AwaitingTestOrRange;
        self.on_test_or_range(line);
    }

    fn push_value(&mut self, line: &ClassifiedLine<'_>) {
        if self
            .range
            .as_ref()
            .map(|range| range.contains_fragment(line.text))
            .unwrap_or(false)
        {
            debug!(document = %self.source, line = line.number, "value already consumed by range");
            return;
        }

        let date_count = self.dates.len();
        let Some(current) = self.current.as_mut() else {
            debug!(document = %self.source, line = line.number, "value without a test; ignoring");
            return;
        };

        if current.values.len() >= date_count {
            debug!(
                document = %self.source,
                line = line.number,
                test = %current.name,
                "more values than date columns; dropping"
            );
            return;
        }

        current.values.push(line.text.to_string());
    }

    fn flush_current(&mut self) {
        let Some(mut test) = self.current.take() else {
            return;
        };
        if test.values.is_empty() {
            debug!(document = %self.source, test = %test.name, "dropping test without values");
            return;
        }

        test.values.resize(self.dates.len(), String::new());

        let mut values = BTreeMap::new();
        for (date, value) in self.dates.iter().zip(test.values) {
            values.entry(*date).or_insert(value);
        }

        self.rows.push(RawResultRow {
            source: self.source.to_string(),
            test_name: test.name,
            reference_range: self.range.as_ref().map(|range| range.text.clone()),
            values,
        });
    }
}

pub(crate) fn extract_section_rows(
    document: &RawDocument,
    classifier: &LineClassifier,
) -> Result<DocumentRows, DocumentError> {
    let mut parser = SectionParser::new(&document.identifier, classifier);
    for line in classifier.classify_text(&document.text) {
        parser.step(&line);
    }
    parser.finish()
}
