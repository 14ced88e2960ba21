use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Recurrence, Settings, Task, TaskId};
use crate::repeat::CalendarZone;

pub const OVERDUE_PREFIX: &str = "overdue-";

pub fn reminder_identifier(task_id: TaskId) -> String {
    task_id.to_string()
}

pub fn overdue_identifier(task_id: TaskId) -> String {
    format!("{OVERDUE_PREFIX}{task_id}")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification rejected: {0}")]
    Rejected(String),
    #[error("notification dispatcher unavailable")]
    Unavailable,
}

/// Delivery side of reminders. Implementations own the platform notification center.
///
/// Scheduling a reminder under an identifier that is already pending replaces it.
pub trait Notifier: Send + Sync {
    fn schedule_reminder(&self, request: &ReminderRequest) -> Result<(), NotifyError>;
    fn cancel_reminder(&self, identifier: &str) -> Result<(), NotifyError>;
    fn fire_overdue_alert(&self, alert: &OverdueAlert) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn schedule_reminder(&self, request: &ReminderRequest) -> Result<(), NotifyError> {
        (**self).schedule_reminder(request)
    }

    fn cancel_reminder(&self, identifier: &str) -> Result<(), NotifyError> {
        (**self).cancel_reminder(identifier)
    }

    fn fire_overdue_alert(&self, alert: &OverdueAlert) -> Result<(), NotifyError> {
        (**self).fire_overdue_alert(alert)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub attachment: Option<PathBuf>,
}

/// Calendar fields a platform trigger should match. `None` means "any".
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DateComponents {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub weekday: Option<Weekday>,
    pub hour: u32,
    pub minute: u32,
}

/// Last day-of-month that every month has.
const DAY_IN_EVERY_MONTH: u32 = 28;

impl DateComponents {
    /// A monthly trigger past day 28 would skip short months, so it pins the exact date
    /// instead and the store reissues it each time the task advances.
    pub fn for_recurrence(wall: NaiveDateTime, recurrence: Recurrence) -> Self {
        let mut components = Self {
            year: None,
            month: None,
            day: None,
            weekday: None,
            hour: wall.hour(),
            minute: wall.minute(),
        };
        match recurrence {
            Recurrence::None => components.pin_date(wall),
            Recurrence::Daily => {}
            Recurrence::Weekly => components.weekday = Some(wall.weekday()),
            Recurrence::Monthly if wall.day() > DAY_IN_EVERY_MONTH => components.pin_date(wall),
            Recurrence::Monthly => components.day = Some(wall.day()),
        }
        components
    }

    fn pin_date(&mut self, wall: NaiveDateTime) {
        self.year = Some(wall.year());
        self.month = Some(wall.month());
        self.day = Some(wall.day());
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReminderRequest {
    pub identifier: String,
    pub task_id: TaskId,
    pub title: String,
    pub fire_at: DateTime<Utc>,
    pub repeating: bool,
    pub trigger: DateComponents,
    pub content: NotificationContent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverdueAlert {
    pub identifier: String,
    pub task_id: TaskId,
    pub title: String,
    pub content: NotificationContent,
}

/// Builds notifier requests from tasks using the user's settings.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    zone: CalendarZone,
    reminder_title: String,
    overdue_title: String,
    sound: bool,
    attachment_path: Option<PathBuf>,
}

impl RequestBuilder {
    pub fn new(settings: &Settings, zone: CalendarZone) -> Self {
        Self {
            zone,
            reminder_title: settings.reminder_title.clone(),
            overdue_title: settings.overdue_title.clone(),
            sound: settings.sound_enabled,
            attachment_path: settings.attachment_path.clone(),
        }
    }

    pub fn reminder(&self, task: &Task) -> ReminderRequest {
        let wall = self.zone.wall_time(task.due_date);
        ReminderRequest {
            identifier: reminder_identifier(task.id),
            task_id: task.id,
            title: task.title.clone(),
            fire_at: task.due_date,
            repeating: task.recurrence.is_recurring(),
            trigger: DateComponents::for_recurrence(wall, task.recurrence),
            content: NotificationContent {
                title: self.reminder_title.clone(),
                body: format!("Don't forget: {}", task.title),
                sound: self.sound,
                attachment: resolve_attachment(self.attachment_path.as_deref()),
            },
        }
    }

    pub fn overdue(&self, task: &Task) -> OverdueAlert {
        OverdueAlert {
            identifier: overdue_identifier(task.id),
            task_id: task.id,
            title: task.title.clone(),
            content: NotificationContent {
                title: self.overdue_title.clone(),
                body: format!("The task {} is overdue.", task.title),
                sound: self.sound,
                attachment: None,
            },
        }
    }
}

/// The decorative image is optional: a missing file only costs the picture.
fn resolve_attachment(path: Option<&Path>) -> Option<PathBuf> {
    let path = path?;
    if path.is_file() {
        Some(path.to_path_buf())
    } else {
        log::warn!(
            "notification attachment unavailable, sending without it path={}",
            path.display()
        );
        None
    }
}

/// Writes every request to the log instead of a notification center.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn schedule_reminder(&self, request: &ReminderRequest) -> Result<(), NotifyError> {
        log::info!(
            "reminder scheduled id={} fire_at={} repeating={} title={:?}",
            request.identifier,
            request.fire_at,
            request.repeating,
            request.title
        );
        Ok(())
    }

    fn cancel_reminder(&self, identifier: &str) -> Result<(), NotifyError> {
        log::info!("reminder cancelled id={identifier}");
        Ok(())
    }

    fn fire_overdue_alert(&self, alert: &OverdueAlert) -> Result<(), NotifyError> {
        log::info!(
            "overdue alert id={} title={:?}",
            alert.identifier,
            alert.title
        );
        Ok(())
    }
}
