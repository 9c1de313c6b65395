use chrono::{Duration, NaiveDate};

use crate::record::{
    CategoryKind, DeadlineSlot, DeadlineState, Level, Record, RowStatus,
};

/// Fixed cumulative stay cap for 特定技能1号: five years in days.
pub const TIER1_CAP_DAYS: i64 = 1826;

/// Carryover added to the manually tracked elapsed count before comparing
/// against the cap.
pub const TIER1_CARRYOVER_DAYS: i64 = 184;

/// Whole days from `today` to the expiry date. Negative once expired,
/// `None` when the expiry date is absent.
pub fn days_until(expiry: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    expiry.map(|date| (date - today).num_days())
}

/// Due date for one deadline slot: `expiry - threshold` days.
pub fn slot_due_date(expiry: Option<NaiveDate>, threshold_days: i64) -> Option<NaiveDate> {
    expiry.map(|date| date - Duration::days(threshold_days))
}

/// Overdue/on-track state of a due date relative to `today`.
pub fn slot_state(due_date: Option<NaiveDate>, today: NaiveDate) -> Option<DeadlineState> {
    let due = due_date?;
    if today > due {
        Some(DeadlineState::Overdue {
            days_overdue: (today - due).num_days(),
        })
    } else {
        Some(DeadlineState::OnTrack {
            days_remaining: (due - today).num_days(),
        })
    }
}

/// Cumulative elapsed days under the status (満了日数).
///
/// Trainee and tier-2 categories never accumulate. Tier-1 always does,
/// falling back to a zero manual count; other categories accumulate only
/// when a manual count was entered. Requires both grant and expiry dates.
pub fn cumulative_days(
    kind: CategoryKind,
    days_already_elapsed: Option<i64>,
    grant_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
) -> Option<i64> {
    let grant = grant_date?;
    let expiry = expiry_date?;
    let current_period = (expiry - grant).num_days() + 1;

    match kind {
        CategoryKind::Trainee | CategoryKind::SkilledWorkerTier2 => None,
        CategoryKind::SkilledWorkerTier1 => {
            Some(days_already_elapsed.unwrap_or(0) + current_period)
        }
        CategoryKind::Other => days_already_elapsed.map(|d| d + current_period),
    }
}

/// The tier-1 cumulative cap check: the manually tracked elapsed count plus
/// the fixed carryover exceeds the five-year cap. Applies only to tier-1
/// records; other categories are never flagged.
pub fn over_tier1_limit(kind: CategoryKind, days_already_elapsed: Option<i64>) -> bool {
    if kind != CategoryKind::SkilledWorkerTier1 {
        return false;
    }
    match days_already_elapsed {
        Some(days) => days + TIER1_CARRYOVER_DAYS > TIER1_CAP_DAYS,
        None => false,
    }
}

/// Derive the coarse urgency bucket from the slot states.
///
/// The level is keyed on threshold *values*, not slot positions: among the
/// overdue slots, the one with the smallest threshold (the one nearest the
/// expiry date) decides the tier. With the default 90/60/30 thresholds an
/// overdue 30-day slot is level1, 60-day level2, 90-day level3.
pub fn level(slots: &[DeadlineSlot; 3]) -> Level {
    let min_overdue = slots
        .iter()
        .filter(|slot| slot.is_overdue())
        .map(|slot| slot.threshold_days)
        .min();

    let threshold = match min_overdue {
        Some(t) => t,
        None => return Level::None,
    };

    let mut sorted = [slots[0].threshold_days, slots[1].threshold_days, slots[2].threshold_days];
    sorted.sort_unstable();

    match sorted.iter().position(|&t| t == threshold) {
        Some(0) => Level::Level1,
        Some(1) => Level::Level2,
        _ => Level::Level3,
    }
}

/// Overall row status from the remaining days until expiry.
pub fn row_status(days_until_expiry: Option<i64>) -> RowStatus {
    match days_until_expiry {
        None => RowStatus::Unknown,
        Some(days) if days < 0 => RowStatus::Expired,
        Some(days) if days <= 7 => RowStatus::Urgent,
        Some(days) if days <= 30 => RowStatus::Warning,
        Some(days) if days <= 90 => RowStatus::Caution,
        Some(_) => RowStatus::Safe,
    }
}

/// Recompute every derived field of a record against `today`.
pub fn classify(record: &mut Record, today: NaiveDate) {
    let kind = record.category_kind();

    record.days_until_expiry = days_until(record.expiry_date, today);
    record.cumulative_days = cumulative_days(
        kind,
        record.days_already_elapsed,
        record.grant_date,
        record.expiry_date,
    );

    for (slot, &threshold) in record.deadlines.iter_mut().zip(record.thresholds.iter()) {
        slot.threshold_days = threshold;
        slot.due_date = slot_due_date(record.expiry_date, threshold);
        slot.state = slot_state(slot.due_date, today);
    }

    record.level = level(&record.deadlines);
    record.status = row_status(record.days_until_expiry);
    record.over_tier1_limit = over_tier1_limit(kind, record.days_already_elapsed);
}
