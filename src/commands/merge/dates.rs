use std::fmt;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Serialize, Serializer};

/// Calendar date used as a result column key.
///
/// Ordering and equality follow the calendar date, never the text the date
/// was parsed from, so "Mar 6, 2025" and "03/06/2025" land in one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ObservationDate(NaiveDate);

impl ObservationDate {
    const DISPLAY_FORMAT: &'static str = "%m/%d/%Y";

    pub(crate) fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parses "Mar 31, 2025", "March 31 2025", "03/31/2025", "2025-03-31"
    /// and compact "20250331".
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let cleaned = text
            .split_whitespace()
            .collect::<Vec<&str>>()
            .join(" ")
            .replace('.', "");
        if cleaned.is_empty() {
            return None;
        }

        for format in ["%B %d, %Y", "%B %d %Y", "%m/%d/%Y", "%Y-%m-%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
                return Some(Self(date));
            }
        }

        parse_compact(&cleaned)
    }

    pub(crate) fn naive(self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for ObservationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::DISPLAY_FORMAT))
    }
}

impl Serialize for ObservationDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_compact(value: &str) -> Option<ObservationDate> {
    if value.len() != 8 || !value.chars().all(|character| character.is_ascii_digit()) {
        return None;
    }

    let year = value[0..4].parse::<i32>().ok()?;
    let month = value[4..6].parse::<u32>().ok()?;
    let day = value[6..8].parse::<u32>().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }

    ObservationDate::from_ymd(year, month, day)
}

/// Finds observation dates in date-header lines, free text and file names.
#[derive(Debug)]
pub(crate) struct DateScanner {
    date_line: Regex,
    date_in_text: Regex,
    compact_date: Regex,
}

impl DateScanner {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            date_line: Regex::new(
                r"(?i)^(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}$",
            )
            .context("failed to compile date header regex")?,
            date_in_text: Regex::new(
                r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b",
            )
            .context("failed to compile inline date regex")?,
            compact_date: Regex::new(r"(?:^|[^0-9])(\d{8})(?:[^0-9]|$)")
                .context("failed to compile compact date regex")?,
        })
    }

    /// A line that is nothing but a `Mon D, YYYY` date.
    pub(crate) fn parse_date_line(&self, line: &str) -> Option<ObservationDate> {
        if !self.date_line.is_match(line.trim()) {
            return None;
        }
        ObservationDate::parse(line)
    }

    pub(crate) fn first_date_in(&self, text: &str) -> Option<ObservationDate> {
        self.date_in_text
            .find_iter(text)
            .find_map(|found| ObservationDate::parse(found.as_str()))
    }

    /// Date carried by a file name such as "Scan - CMP - Mar 31, 2025.PDF"
    /// or "Labcorp_20250306.pdf".
    pub(crate) fn date_in_identifier(&self, identifier: &str) -> Option<ObservationDate> {
        self.first_date_in(identifier).or_else(|| {
            self.compact_date
                .captures_iter(identifier)
                .filter_map(|captures| captures.get(1))
                .find_map(|found| parse_compact(found.as_str()))
        })
    }
}
