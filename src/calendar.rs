use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// A (year, month) pair with year-rolling navigation. `month` is 1-12.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

impl MonthRef {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(MonthRef { year, month })
        } else {
            None
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            MonthRef {
                year: self.year + 1,
                month: 1,
            }
        } else {
            MonthRef {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            MonthRef {
                year: self.year - 1,
                month: 12,
            }
        } else {
            MonthRef {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// The columns shown in a calendar cell for one due record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub person_code: String,
    pub name_line2: String,
    pub status_category: String,
}

impl CalendarEntry {
    fn of(record: &Record) -> Self {
        CalendarEntry {
            person_code: record.person_code.clone(),
            name_line2: record.name_line2.clone(),
            status_category: record.status_category.clone(),
        }
    }
}

/// Entries due on one day, one list per deadline slot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayDeadlines {
    pub deadline1: Vec<CalendarEntry>,
    pub deadline2: Vec<CalendarEntry>,
    pub deadline3: Vec<CalendarEntry>,
}

impl DayDeadlines {
    fn slot_mut(&mut self, index: usize) -> &mut Vec<CalendarEntry> {
        match index {
            0 => &mut self.deadline1,
            1 => &mut self.deadline2,
            _ => &mut self.deadline3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deadline1.is_empty() && self.deadline2.is_empty() && self.deadline3.is_empty()
    }
}

/// Project slot due dates into a sparse day-bucketed map for one month.
///
/// Keys are ISO date strings; only days with at least one due entry appear.
/// Entries keep the roster order within each slot list. Leap years and month
/// lengths fall out of the calendar arithmetic on the due dates themselves.
pub fn project(records: &[Record], month: MonthRef) -> BTreeMap<String, DayDeadlines> {
    let mut calendar: BTreeMap<String, DayDeadlines> = BTreeMap::new();

    for record in records {
        for (index, slot) in record.deadlines.iter().enumerate() {
            let due = match slot.due_date {
                Some(date) if month.contains(date) => date,
                _ => continue,
            };
            let key = due.format("%Y-%m-%d").to_string();
            calendar
                .entry(key)
                .or_default()
                .slot_mut(index)
                .push(CalendarEntry::of(record));
        }
    }

    calendar
}
