use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    /// Every variant, in the order a picker should list them.
    pub const ALL: [Recurrence; 4] = [
        Recurrence::None,
        Recurrence::Daily,
        Recurrence::Weekly,
        Recurrence::Monthly,
    ];

    pub fn is_recurring(self) -> bool {
        self != Recurrence::None
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Recurrence::None => "None",
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::Monthly => "Monthly",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub is_completed: bool,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Recurrence,
}

impl Task {
    pub fn new(title: impl Into<String>, due_date: DateTime<Utc>, recurrence: Recurrence) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            is_completed: false,
            due_date,
            recurrence,
        }
    }

    /// Recurring tasks never leave the active list.
    pub fn is_active(&self) -> bool {
        !self.is_completed || self.recurrence.is_recurring()
    }

    /// Past due, incomplete and one-off: the tasks that get an alert when the store opens.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && !self.recurrence.is_recurring() && self.due_date < now
    }

    pub fn urgency(&self, now: DateTime<Utc>, due_soon: Duration) -> Urgency {
        let remaining = self.due_date - now;
        if remaining < Duration::zero() {
            Urgency::Overdue
        } else if remaining <= due_soon {
            Urgency::DueSoon
        } else {
            Urgency::Later
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Overdue,
    DueSoon,
    Later,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// IANA zone name used for calendar math. `None` follows the system zone.
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default = "default_reminder_title")]
    pub reminder_title: String,
    #[serde(default = "default_overdue_title")]
    pub overdue_title: String,
    #[serde(default = "default_sound_enabled")]
    pub sound_enabled: bool,
    #[serde(default)]
    pub attachment_path: Option<PathBuf>,
    #[serde(default = "default_due_soon_hours")]
    pub due_soon_hours: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_zone: None,
            reminder_title: default_reminder_title(),
            overdue_title: default_overdue_title(),
            sound_enabled: default_sound_enabled(),
            attachment_path: None,
            due_soon_hours: default_due_soon_hours(),
        }
    }
}

impl Settings {
    pub fn due_soon_window(&self) -> Duration {
        Duration::hours(i64::from(self.due_soon_hours))
    }
}

fn default_reminder_title() -> String {
    "Task Reminder".to_string()
}

fn default_overdue_title() -> String {
    "Overdue Task".to_string()
}

fn default_sound_enabled() -> bool {
    true
}

fn default_due_soon_hours() -> u32 {
    24
}
