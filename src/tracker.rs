use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unsaved-change tracker: records whether local edits are newer than the
/// last successful export, so a caller can warn before destructive
/// navigation or highlight an "export needed" affordance.
///
/// States are `Clean` and `Dirty`. Any successful mutation moves to `Dirty`
/// with a change timestamp; a completed export, or an observed export
/// timestamp at or after the last change, moves back to `Clean`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChangeTracker {
    dirty: bool,
    last_change: Option<DateTime<Utc>>,
    last_export: Option<DateTime<Utc>>,
    last_export_filename: Option<String>,
}

impl ChangeTracker {
    /// Fresh tracker, `Clean`. A page load with no local edits starts here.
    pub fn new() -> Self {
        ChangeTracker::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        self.last_change
    }

    pub fn last_export(&self) -> Option<DateTime<Utc>> {
        self.last_export
    }

    pub fn last_export_filename(&self) -> Option<&str> {
        self.last_export_filename.as_deref()
    }

    /// A successful add/update/delete/upload happened at `now`.
    pub fn record_change(&mut self, now: DateTime<Utc>) {
        self.dirty = true;
        self.last_change = Some(now);
    }

    /// A processed-data export completed at `now`.
    pub fn record_export(&mut self, now: DateTime<Utc>, filename: &str) {
        self.last_export = Some(now);
        self.last_export_filename = Some(filename.to_string());
        self.dirty = false;
    }

    /// An externally reported export timestamp clears the dirty flag when it
    /// is at or after the last local change.
    pub fn observe_export(&mut self, exported_at: DateTime<Utc>) {
        if self.last_export.map(|t| t < exported_at).unwrap_or(true) {
            self.last_export = Some(exported_at);
        }
        match self.last_change {
            Some(changed_at) if exported_at < changed_at => {}
            _ => self.dirty = false,
        }
    }
}
