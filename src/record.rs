use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Coarse urgency bucket derived from which deadline slot is overdue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Level1,
    Level2,
    Level3,
    None,
}

/// Overall row state derived from the remaining days until expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Expired,
    Urgent,
    Warning,
    Caution,
    Safe,
    Unknown,
}

/// State of a single deadline slot relative to "today".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeadlineState {
    OnTrack { days_remaining: i64 },
    Overdue { days_overdue: i64 },
}

impl DeadlineState {
    pub fn is_overdue(&self) -> bool {
        matches!(self, DeadlineState::Overdue { .. })
    }
}

/// One of the three configurable day-offsets tracked before the expiry date.
/// Slots are independent; no ordering between thresholds is assumed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeadlineSlot {
    pub threshold_days: i64,
    pub due_date: Option<NaiveDate>,
    pub state: Option<DeadlineState>,
}

impl DeadlineSlot {
    pub fn empty(threshold_days: i64) -> Self {
        DeadlineSlot {
            threshold_days,
            due_date: None,
            state: None,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.state.map(|s| s.is_overdue()).unwrap_or(false)
    }
}

/// Residence-status category family, detected from the category label.
///
/// The label is normalized first so that full-width digits (１号) and ASCII
/// digits (1号) match the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryKind {
    /// 特定技能1号 - subject to the cumulative stay cap.
    SkilledWorkerTier1,
    /// 特定技能2号 - no cumulative cap, elapsed-days input must stay blank.
    SkilledWorkerTier2,
    /// 技能実習* - trainee categories, elapsed-days input must stay blank.
    Trainee,
    Other,
}

impl CategoryKind {
    pub fn of(category: &str) -> Self {
        let normalized = normalize_digits(category);
        if normalized.starts_with("技能実習") {
            CategoryKind::Trainee
        } else if normalized.contains("特定技能") {
            if normalized.contains("1号") {
                CategoryKind::SkilledWorkerTier1
            } else if normalized.contains("2号") {
                CategoryKind::SkilledWorkerTier2
            } else {
                CategoryKind::Other
            }
        } else {
            CategoryKind::Other
        }
    }

    /// Blank-only categories: the manual elapsed-days field must not be set.
    pub fn requires_blank_elapsed(&self) -> bool {
        matches!(self, CategoryKind::Trainee | CategoryKind::SkilledWorkerTier2)
    }
}

/// Default slot thresholds in days, nearest slot last.
pub const DEFAULT_THRESHOLDS: [i64; 3] = [90, 60, 30];

/// One tracked person/status entry. Input fields are set at ingest or edit
/// time; the remaining fields are recomputed by [`crate::classify`] against a
/// given "today" and must not be edited directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub person_code: String,
    pub name_line1: String,
    pub name_line2: String,
    pub status_category: String,
    pub nationality: String,
    pub card_number: String,
    pub birth_date: Option<NaiveDate>,
    /// Cohort label (期生): a bare number or free-form text. Stored as
    /// entered; display/export normalization never writes back.
    pub cohort: String,
    pub grant_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    /// Manually tracked days already spent under the status (既満了日数).
    pub days_already_elapsed: Option<i64>,
    pub thresholds: [i64; 3],

    // Computed by classification.
    pub days_until_expiry: Option<i64>,
    pub cumulative_days: Option<i64>,
    pub deadlines: [DeadlineSlot; 3],
    pub level: Level,
    pub status: RowStatus,
    pub over_tier1_limit: bool,
}

impl Record {
    pub fn new(id: i64) -> Self {
        Record {
            id,
            person_code: String::new(),
            name_line1: String::new(),
            name_line2: String::new(),
            status_category: String::new(),
            nationality: String::new(),
            card_number: String::new(),
            birth_date: None,
            cohort: String::new(),
            grant_date: None,
            expiry_date: None,
            days_already_elapsed: None,
            thresholds: DEFAULT_THRESHOLDS,
            days_until_expiry: None,
            cumulative_days: None,
            deadlines: [
                DeadlineSlot::empty(DEFAULT_THRESHOLDS[0]),
                DeadlineSlot::empty(DEFAULT_THRESHOLDS[1]),
                DeadlineSlot::empty(DEFAULT_THRESHOLDS[2]),
            ],
            level: Level::None,
            status: RowStatus::Unknown,
            over_tier1_limit: false,
        }
    }

    pub fn category_kind(&self) -> CategoryKind {
        CategoryKind::of(&self.status_category)
    }

    pub fn any_deadline_overdue(&self) -> bool {
        self.deadlines.iter().any(|slot| slot.is_overdue())
    }

    /// Cohort label for display/export: bare integers gain the 期 suffix,
    /// anything else is passed through untouched.
    pub fn cohort_display(&self) -> String {
        let normalized = normalize_digits(self.cohort.trim());
        if !normalized.is_empty() && normalized.chars().all(|c| c.is_ascii_digit()) {
            format!("{}期", normalized)
        } else {
            self.cohort.clone()
        }
    }
}

/// Replace full-width digits (０-９) with their ASCII counterparts.
pub fn normalize_digits(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_full_width_digits() {
        assert_eq!(normalize_digits("特定技能１号"), "特定技能1号");
        assert_eq!(normalize_digits("１２期"), "12期");
        assert_eq!(normalize_digits("abc123"), "abc123");
    }

    #[test]
    fn detects_category_kinds_in_both_spellings() {
        assert_eq!(
            CategoryKind::of("特定技能1号"),
            CategoryKind::SkilledWorkerTier1
        );
        assert_eq!(
            CategoryKind::of("特定技能１号"),
            CategoryKind::SkilledWorkerTier1
        );
        assert_eq!(
            CategoryKind::of("特定技能2号"),
            CategoryKind::SkilledWorkerTier2
        );
        assert_eq!(CategoryKind::of("技能実習2号ロ"), CategoryKind::Trainee);
        assert_eq!(CategoryKind::of("技術・人文知識・国際業務"), CategoryKind::Other);
    }

    #[test]
    fn trainee_prefix_wins_over_substring_checks() {
        // A trainee label never falls into the skilled-worker families.
        assert_eq!(CategoryKind::of("技能実習1号イ"), CategoryKind::Trainee);
        assert!(CategoryKind::of("技能実習1号イ").requires_blank_elapsed());
    }

    #[test]
    fn cohort_display_adds_suffix_only_to_bare_numbers() {
        let mut record = Record::new(1);
        record.cohort = "12".to_string();
        assert_eq!(record.cohort_display(), "12期");

        record.cohort = "１２".to_string();
        assert_eq!(record.cohort_display(), "12期");

        record.cohort = "12期".to_string();
        assert_eq!(record.cohort_display(), "12期");

        record.cohort = "第一".to_string();
        assert_eq!(record.cohort_display(), "第一");

        // Stored value is never mutated by display normalization.
        assert_eq!(record.cohort, "第一");
    }
}
