use std::error::Error;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classify;
use crate::record::{normalize_digits, CategoryKind, Record};

/// Failure of a roster mutation.
///
/// `Validation` carries the offending field so a form can focus it;
/// validation failures block the mutation entirely and leave the roster
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    Validation {
        field: &'static str,
        message: String,
    },
    NotFound(i64),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::Validation { field, message } => {
                write!(f, "invalid {}: {}", field, message)
            }
            RosterError::NotFound(id) => write!(f, "record {} not found", id),
        }
    }
}

impl Error for RosterError {}

/// Raw field values as submitted from a form or read from a CSV row.
///
/// Every field is optional; on update, absent fields keep their stored
/// value. Dates and the elapsed-days count arrive as strings and are parsed
/// here so the submitter gets field-level errors instead of silent defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordInput {
    pub person_code: Option<String>,
    pub name_line1: Option<String>,
    pub name_line2: Option<String>,
    pub status_category: Option<String>,
    pub nationality: Option<String>,
    pub card_number: Option<String>,
    pub birth_date: Option<String>,
    pub cohort: Option<String>,
    pub grant_date: Option<String>,
    pub expiry_date: Option<String>,
    pub days_already_elapsed: Option<String>,
    pub threshold1: Option<i64>,
    pub threshold2: Option<i64>,
    pub threshold3: Option<i64>,
}

/// Parse a date in `YYYY-MM-DD` or `YYYY/MM/DD` form. Malformed values and
/// years before 1900 are treated as absent, never as errors.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
        .ok()?;
    if chrono::Datelike::year(&parsed) < 1900 {
        return None;
    }
    Some(parsed)
}

/// Validate the manual elapsed-days input against the (effective) category.
///
/// Tier-1 requires a non-negative integer; trainee and tier-2 categories
/// require a blank; anything else accepts blank or an integer. `provided` is
/// the raw submitted value, `stored` the value already on the record (used
/// when the submission leaves the field out).
fn resolve_elapsed_days(
    kind: CategoryKind,
    provided: Option<&str>,
    stored: Option<i64>,
) -> Result<Option<i64>, RosterError> {
    const FIELD: &str = "days_already_elapsed";

    let provided = provided.map(|v| normalize_digits(v.trim()));

    if kind.requires_blank_elapsed() {
        if let Some(value) = &provided {
            if !value.is_empty() {
                return Err(RosterError::Validation {
                    field: FIELD,
                    message: "must be blank for trainee and tier-2 categories".to_string(),
                });
            }
        }
        return Ok(None);
    }

    let value = match provided {
        Some(value) if value.is_empty() => None,
        Some(value) => match value.parse::<i64>() {
            Ok(days) => Some(days),
            Err(_) => {
                return Err(RosterError::Validation {
                    field: FIELD,
                    message: "must be an integer".to_string(),
                })
            }
        },
        None => stored,
    };

    if kind == CategoryKind::SkilledWorkerTier1 {
        match value {
            Some(days) if days < 0 => Err(RosterError::Validation {
                field: FIELD,
                message: "must be zero or greater".to_string(),
            }),
            Some(days) => Ok(Some(days)),
            None => Err(RosterError::Validation {
                field: FIELD,
                message: "required for 特定技能1号 (zero or greater)".to_string(),
            }),
        }
    } else {
        match value {
            Some(days) if days < 0 => Err(RosterError::Validation {
                field: FIELD,
                message: "must be zero or greater".to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// Aggregated counters for the summary endpoint and CLI report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub deadline_passed: usize,
    pub expired: usize,
    pub days_30_count: usize,
    pub days_60_count: usize,
    pub days_90_count: usize,
    pub skill1_limit_count: usize,
}

/// The full ordered roster as loaded for the current session.
///
/// Insertion order is the ingest order and is stable across re-renders;
/// sorting happens on view copies only. The roster is replaced wholesale on
/// every successful load/upload, and every mutation reclassifies all records
/// so derived fields stay consistent with one "today".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Roster {
    records: Vec<Record>,
    next_id: i64,
    pub filename: Option<String>,
}

impl Roster {
    pub fn new() -> Self {
        Roster {
            records: Vec::new(),
            next_id: 1,
            filename: None,
        }
    }

    /// Build a roster from ingest rows. Ingest is lenient: rows are accepted
    /// as-is (legacy files may predate the edit-time validation rules) and
    /// ids are assigned in file order.
    pub fn from_inputs(inputs: Vec<RecordInput>, filename: Option<String>, today: NaiveDate) -> Self {
        let mut roster = Roster::new();
        roster.filename = filename;
        for input in inputs {
            let id = roster.next_id;
            roster.next_id += 1;
            let mut record = Record::new(id);
            apply_input(&mut record, &input);
            // Lenient path: keep whatever elapsed count parses, drop the rest.
            record.days_already_elapsed = input
                .days_already_elapsed
                .as_deref()
                .map(|v| normalize_digits(v.trim()))
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|days| *days >= 0);
            if record.category_kind().requires_blank_elapsed() {
                record.days_already_elapsed = None;
            }
            roster.records.push(record);
        }
        roster.reclassify(today);
        roster
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Recompute the derived fields of every record against `today`.
    pub fn reclassify(&mut self, today: NaiveDate) {
        for record in &mut self.records {
            classify::classify(record, today);
        }
    }

    /// Append a new record. Validation failures leave the roster unchanged.
    pub fn add(&mut self, input: &RecordInput, today: NaiveDate) -> Result<i64, RosterError> {
        let mut record = Record::new(self.next_id);
        apply_input(&mut record, input);
        record.days_already_elapsed = resolve_elapsed_days(
            record.category_kind(),
            input.days_already_elapsed.as_deref(),
            None,
        )?;

        let id = record.id;
        self.next_id += 1;
        self.records.push(record);
        self.reclassify(today);
        Ok(id)
    }

    /// Update the provided fields of an existing record. The elapsed-days
    /// rule is checked against the category as it stands after the update.
    pub fn update(
        &mut self,
        id: i64,
        input: &RecordInput,
        today: NaiveDate,
    ) -> Result<(), RosterError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(RosterError::NotFound(id))?;

        // Validate against a copy so a rejected edit leaves the record as-is.
        let mut updated = self.records[index].clone();
        apply_input(&mut updated, input);
        updated.days_already_elapsed = resolve_elapsed_days(
            updated.category_kind(),
            input.days_already_elapsed.as_deref(),
            self.records[index].days_already_elapsed,
        )?;

        self.records[index] = updated;
        self.reclassify(today);
        Ok(())
    }

    pub fn delete(&mut self, id: i64) -> Result<Record, RosterError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(RosterError::NotFound(id))?;
        Ok(self.records.remove(index))
    }

    /// Summary counters. Assumes the roster was classified against the same
    /// `today` the caller is reporting for.
    pub fn summary(&self) -> SummaryCounts {
        let mut counts = SummaryCounts {
            total: self.records.len(),
            ..SummaryCounts::default()
        };

        for record in &self.records {
            if record.any_deadline_overdue() {
                counts.deadline_passed += 1;
            }
            match record.days_until_expiry {
                Some(days) if days < 0 => counts.expired += 1,
                Some(days) if days <= 30 => counts.days_30_count += 1,
                Some(days) if days <= 60 => counts.days_60_count += 1,
                Some(days) if days <= 90 => counts.days_90_count += 1,
                _ => {}
            }
            if record.over_tier1_limit {
                counts.skill1_limit_count += 1;
            }
        }

        counts
    }

    /// Records whose remaining days are within any slot threshold (the
    /// alert-list export source), nearest expiry first. Records without an
    /// expiry date never alert.
    pub fn alerts(&self) -> Vec<Record> {
        let mut hits: Vec<Record> = self
            .records
            .iter()
            .filter(|record| match record.days_until_expiry {
                Some(days) => record.thresholds.iter().any(|&t| days <= t),
                None => false,
            })
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.days_until_expiry.unwrap_or(i64::MAX));
        hits
    }
}

/// Copy the provided input fields onto a record. Text fields with full-width
/// digits are normalized; absent fields are left untouched so partial
/// updates work. The elapsed-days field is handled separately by the caller
/// because its rules depend on the effective category.
fn apply_input(record: &mut Record, input: &RecordInput) {
    if let Some(value) = &input.person_code {
        record.person_code = normalize_digits(value.trim());
    }
    if let Some(value) = &input.name_line1 {
        record.name_line1 = value.trim().to_string();
    }
    if let Some(value) = &input.name_line2 {
        record.name_line2 = value.trim().to_string();
    }
    if let Some(value) = &input.status_category {
        record.status_category = normalize_digits(value.trim());
    }
    if let Some(value) = &input.nationality {
        record.nationality = value.trim().to_string();
    }
    if let Some(value) = &input.card_number {
        record.card_number = normalize_digits(value.trim());
    }
    if let Some(value) = &input.birth_date {
        record.birth_date = parse_date(value);
    }
    if let Some(value) = &input.cohort {
        record.cohort = normalize_digits(value.trim());
    }
    if let Some(value) = &input.grant_date {
        record.grant_date = parse_date(value);
    }
    if let Some(value) = &input.expiry_date {
        record.expiry_date = parse_date(value);
    }
    if let Some(t) = input.threshold1 {
        record.thresholds[0] = t;
    }
    if let Some(t) = input.threshold2 {
        record.thresholds[1] = t;
    }
    if let Some(t) = input.threshold3 {
        record.thresholds[2] = t;
    }
}
