use serde::{Deserialize, Serialize};

use crate::record::{Level, Record};

/// Named filter predicates. Mutually exclusive; always applied to the full
/// roster, never to a previous filter's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    All,
    DeadlinePassed,
    Expired,
    Level1,
    Level2,
    Level3,
    Skill1Limit,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::DeadlinePassed => record.any_deadline_overdue(),
            // Records without an expiry date never count as expired.
            Filter::Expired => matches!(record.days_until_expiry, Some(days) if days < 0),
            Filter::Level1 => record.level == Level::Level1,
            Filter::Level2 => record.level == Level::Level2,
            Filter::Level3 => record.level == Level::Level3,
            Filter::Skill1Limit => record.over_tier1_limit,
        }
    }
}

/// Sortable columns of the dashboard table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    PersonCode,
    NameLine1,
    NameLine2,
    StatusCategory,
    Nationality,
    Cohort,
    GrantDate,
    ExpiryDate,
    DaysUntilExpiry,
}

/// Ephemeral view configuration: active filter, search text, and sort order.
/// Applying a view never mutates the underlying roster.
#[derive(Clone, Debug)]
pub struct ViewState {
    pub filter: Filter,
    pub search: String,
    pub sort: Option<SortColumn>,
    pub ascending: bool,
}

impl ViewState {
    pub fn new() -> Self {
        ViewState {
            filter: Filter::All,
            search: String::new(),
            sort: None,
            ascending: true,
        }
    }

    pub fn apply_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_string();
    }

    /// Sort by a column; a repeated sort on the same column toggles the
    /// direction, a new column starts ascending.
    pub fn toggle_sort(&mut self, column: SortColumn) {
        if self.sort == Some(column) {
            self.ascending = !self.ascending;
        } else {
            self.sort = Some(column);
            self.ascending = true;
        }
    }

    /// The derived visible sequence: filter, then search, then sort.
    /// Search narrows the currently filtered set.
    pub fn visible(&self, records: &[Record]) -> Vec<Record> {
        let needle = self.search.trim().to_lowercase();
        let mut rows: Vec<Record> = records
            .iter()
            .filter(|r| self.filter.matches(r))
            .filter(|r| needle.is_empty() || search_matches(r, &needle))
            .cloned()
            .collect();

        if let Some(column) = self.sort {
            sort_records(&mut rows, column, self.ascending);
        }
        rows
    }
}

/// Case-insensitive substring match over the searchable text columns.
/// `needle` must already be lowercased.
fn search_matches(record: &Record, needle: &str) -> bool {
    [
        &record.person_code,
        &record.name_line1,
        &record.name_line2,
        &record.status_category,
        &record.nationality,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Stable sort on one column. The descending order is the exact reverse of
/// the ascending one, so sorting the same column twice flips the sequence.
/// Missing numeric/date values order as largest (the end when ascending).
pub fn sort_records(rows: &mut Vec<Record>, column: SortColumn, ascending: bool) {
    match column {
        SortColumn::PersonCode => rows.sort_by(|a, b| a.person_code.cmp(&b.person_code)),
        SortColumn::NameLine1 => rows.sort_by(|a, b| a.name_line1.cmp(&b.name_line1)),
        SortColumn::NameLine2 => rows.sort_by(|a, b| a.name_line2.cmp(&b.name_line2)),
        SortColumn::StatusCategory => {
            rows.sort_by(|a, b| a.status_category.cmp(&b.status_category))
        }
        SortColumn::Nationality => rows.sort_by(|a, b| a.nationality.cmp(&b.nationality)),
        SortColumn::Cohort => rows.sort_by(|a, b| a.cohort.cmp(&b.cohort)),
        SortColumn::GrantDate => rows.sort_by_key(|r| date_key(r.grant_date)),
        SortColumn::ExpiryDate => rows.sort_by_key(|r| date_key(r.expiry_date)),
        SortColumn::DaysUntilExpiry => {
            rows.sort_by_key(|r| r.days_until_expiry.unwrap_or(i64::MAX))
        }
    }

    if !ascending {
        rows.reverse();
    }
}

fn date_key(date: Option<chrono::NaiveDate>) -> chrono::NaiveDate {
    date.unwrap_or(chrono::NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 4, 1)
    }

    fn record(id: i64, code: &str, expiry: Option<NaiveDate>) -> Record {
        let mut r = Record::new(id);
        r.person_code = code.to_string();
        r.name_line1 = format!("Name {}", id);
        r.status_category = "技術・人文知識・国際業務".to_string();
        r.nationality = "Vietnam".to_string();
        r.expiry_date = expiry;
        classify(&mut r, today());
        r
    }

    fn roster() -> Vec<Record> {
        vec![
            record(1, "A-100", Some(date(2024, 3, 1))),  // expired
            record(2, "B-200", Some(date(2024, 4, 15))), // level1
            record(3, "C-300", Some(date(2024, 5, 20))), // level2
            record(4, "D-400", Some(date(2024, 6, 25))), // level3
            record(5, "E-500", Some(date(2024, 12, 1))), // safe
            record(6, "F-600", None),                    // unknown
        ]
    }

    #[test]
    fn filter_round_trip_preserves_the_id_set() {
        let records = roster();
        let mut view = ViewState::new();

        let all_before: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        view.apply_filter(Filter::Level1);
        assert!(!view.visible(&records).is_empty());
        view.apply_filter(Filter::All);
        let all_after: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();

        assert_eq!(all_before, all_after);
        assert_eq!(all_after.len(), records.len());
    }

    #[test]
    fn expired_filter_skips_records_without_expiry() {
        let records = roster();
        let mut view = ViewState::new();
        view.apply_filter(Filter::Expired);
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn deadline_passed_matches_any_overdue_slot() {
        let records = roster();
        let mut view = ViewState::new();
        view.apply_filter(Filter::DeadlinePassed);
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn level_filters_are_mutually_exclusive() {
        let records = roster();
        let mut view = ViewState::new();

        // The expired record has every slot overdue, so it is level1 too.
        view.apply_filter(Filter::Level1);
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        view.apply_filter(Filter::Level2);
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3]);
        view.apply_filter(Filter::Level3);
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn skill1_limit_filter_uses_the_cap_check() {
        let mut records = roster();
        let mut flagged = Record::new(7);
        flagged.person_code = "G-700".to_string();
        flagged.status_category = "特定技能1号".to_string();
        flagged.days_already_elapsed = Some(1650);
        classify(&mut flagged, today());
        records.push(flagged);

        let mut view = ViewState::new();
        view.apply_filter(Filter::Skill1Limit);
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7]);
    }

    #[test]
    fn search_narrows_the_filtered_set() {
        let records = roster();
        let mut view = ViewState::new();
        view.apply_filter(Filter::DeadlinePassed);
        view.set_search("b-200");
        let ids: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);

        // The safe record matches the text but not the active filter.
        view.set_search("e-500");
        assert!(view.visible(&records).is_empty());
    }

    #[test]
    fn search_is_case_insensitive_across_columns() {
        let records = roster();
        let mut view = ViewState::new();
        view.set_search("VIETNAM");
        assert_eq!(view.visible(&records).len(), records.len());
    }

    #[test]
    fn repeated_sort_reverses_the_order() {
        let records = roster();
        let mut view = ViewState::new();

        view.toggle_sort(SortColumn::DaysUntilExpiry);
        let ascending: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();
        view.toggle_sort(SortColumn::DaysUntilExpiry);
        let descending: Vec<i64> = view.visible(&records).iter().map(|r| r.id).collect();

        let mut reversed = ascending.clone();
        reversed.reverse();
        assert_eq!(descending, reversed);
    }

    #[test]
    fn missing_days_sort_to_the_end_ascending() {
        let records = roster();
        let mut view = ViewState::new();
        view.toggle_sort(SortColumn::DaysUntilExpiry);
        let rows = view.visible(&records);
        assert_eq!(rows.last().map(|r| r.id), Some(6));
        assert_eq!(rows.first().map(|r| r.id), Some(1));
    }

    #[test]
    fn switching_columns_resets_to_ascending() {
        let mut view = ViewState::new();
        view.toggle_sort(SortColumn::PersonCode);
        view.toggle_sort(SortColumn::PersonCode);
        assert!(!view.ascending);
        view.toggle_sort(SortColumn::ExpiryDate);
        assert!(view.ascending);
        assert_eq!(view.sort, Some(SortColumn::ExpiryDate));
    }

    #[test]
    fn sorting_does_not_mutate_the_source_order() {
        let records = roster();
        let before: Vec<i64> = records.iter().map(|r| r.id).collect();
        let mut view = ViewState::new();
        view.toggle_sort(SortColumn::PersonCode);
        let _ = view.visible(&records);
        let after: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(before, after);
    }
}
