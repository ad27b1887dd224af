//! Backup files and popup display helpers

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::ExportData;

/// Backup file name for `date`, e.g. `tracker-remover-backup-2024-05-01.json`.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("tracker-remover-backup-{}.json", date.format("%Y-%m-%d"))
}

impl ExportData {
    /// Pretty-printed JSON as written to backup files.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Suggested file name for this export.
    pub fn file_name(&self) -> String {
        backup_file_name(self.export_date.date_naive())
    }
}

/// Relative wording for a "last cleaned" timestamp.
pub fn describe_last_cleaned(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let last = match last {
        Some(last) => last,
        None => return "No tracking removed yet".to_string(),
    };

    let mins = (now - last).num_minutes();
    if mins < 1 {
        return "Last cleaned: Just now".to_string();
    }

    let ago = if mins < 60 {
        plural(mins, "minute")
    } else if mins < 1440 {
        plural(mins / 60, "hour")
    } else {
        plural(mins / 1440, "day")
    };
    format!("Last cleaned: {} ago", ago)
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
