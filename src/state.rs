use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::error::StoreError;
use crate::models::{Recurrence, Settings, Task, TaskId, Urgency};
use crate::notify::{overdue_identifier, reminder_identifier, Notifier, RequestBuilder};
use crate::repeat::CalendarZone;
use crate::storage::{load_settings, FileStore, TaskPersistence};

/// Owner of the task collection.
///
/// Every mutation is applied in memory, saved and handed to the notifier while the collection
/// lock is held, so saves never interleave and reminders reach the notifier in the same order as
/// the changes they mirror. Side-effect failures are only logged: the in-memory state stays
/// authoritative.
///
/// If the stored collection cannot be read on open, its raw payload is copied aside before the
/// store starts empty. When even that copy fails, automatic saves stay off so the unreadable data
/// is never overwritten; an explicit [`TaskStore::save`] still writes.
pub struct TaskStore<P, N> {
    tasks: Mutex<Vec<Task>>,
    preserved_as: Option<String>,
    autosave: bool,
    persistence: P,
    notifier: N,
    zone: CalendarZone,
    requests: RequestBuilder,
    due_soon: Duration,
}

impl<N: Notifier> TaskStore<FileStore, N> {
    /// Opens the store kept in `root`, reading settings from the same directory.
    pub fn open_dir(root: PathBuf, notifier: N) -> Self {
        let files = FileStore::new(root);
        let settings = load_settings(&files).unwrap_or_else(|err| {
            log::warn!("settings unreadable, using defaults: {err}");
            Settings::default()
        });
        Self::open(files, notifier, &settings)
    }
}

impl<P: TaskPersistence, N: Notifier> TaskStore<P, N> {
    pub fn open(persistence: P, notifier: N, settings: &Settings) -> Self {
        Self::open_at(persistence, notifier, settings, Utc::now())
    }

    /// Loads the collection and fires overdue alerts relative to `now`.
    pub fn open_at(persistence: P, notifier: N, settings: &Settings, now: DateTime<Utc>) -> Self {
        let mut preserved_as = None;
        let mut autosave = true;
        let loaded = match persistence.load_tasks() {
            Ok(tasks) => tasks,
            Err(err) => {
                log::warn!("task data unreadable, starting empty: {err}");
                match persistence.preserve_unreadable() {
                    Ok(key) => {
                        if let Some(key) = &key {
                            log::warn!("unreadable task data preserved key={key}");
                        }
                        preserved_as = key;
                    }
                    Err(err) => {
                        log::error!("could not preserve unreadable task data, autosave off: {err}");
                        autosave = false;
                    }
                }
                Vec::new()
            }
        };
        let zone = CalendarZone::from_name(settings.time_zone.as_deref());
        let store = Self {
            tasks: Mutex::new(dedupe(loaded)),
            preserved_as,
            autosave,
            persistence,
            notifier,
            zone,
            requests: RequestBuilder::new(settings, zone),
            due_soon: settings.due_soon_window(),
        };
        let alerted = store.alert_overdue(now);
        log::info!(
            "task store opened tasks={} overdue_alerts={alerted}",
            store.lock().len()
        );
        store
    }

    pub fn add(
        &self,
        title: impl Into<String>,
        due_date: DateTime<Utc>,
        recurrence: Recurrence,
    ) -> Task {
        let task = Task::new(title, due_date, recurrence);
        let mut guard = self.lock();
        guard.push(task.clone());
        self.persist(&guard);
        self.schedule(&task);
        log::debug!("task added id={} recurrence={recurrence}", task.id);
        task
    }

    /// Replaces the stored task with the same id. Recurring tasks are stored incomplete.
    pub fn update(&self, task: Task) -> Result<Task, StoreError> {
        let mut task = task;
        if task.recurrence.is_recurring() && task.is_completed {
            log::debug!("recurring task cannot stay completed id={}", task.id);
            task.is_completed = false;
        }
        let mut guard = self.lock();
        let existing = guard
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or(StoreError::NotFound(task.id))?;
        *existing = task.clone();
        self.persist(&guard);
        self.schedule(&task);
        log::debug!("task updated id={}", task.id);
        Ok(task)
    }

    /// Completes a one-off task (or reopens it); advances a recurring task to its next due date.
    pub fn toggle(&self, id: TaskId) -> Result<Task, StoreError> {
        let mut guard = self.lock();
        let task = guard
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if task.recurrence.is_recurring() {
            task.is_completed = false;
            task.due_date = self.zone.next_due_date(task.due_date, task.recurrence);
        } else {
            task.is_completed = !task.is_completed;
        }
        let toggled = task.clone();
        self.persist(&guard);

        if toggled.recurrence.is_recurring() {
            log::debug!("task advanced id={} due={}", toggled.id, toggled.due_date);
            self.schedule(&toggled);
        } else {
            log::debug!("task toggled id={} completed={}", toggled.id, toggled.is_completed);
        }
        Ok(toggled)
    }

    pub fn delete(&self, id: TaskId) -> Result<Task, StoreError> {
        let mut guard = self.lock();
        let index = guard
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let removed = guard.remove(index);
        self.persist(&guard);

        for identifier in [reminder_identifier(id), overdue_identifier(id)] {
            if let Err(err) = self.notifier.cancel_reminder(&identifier) {
                log::warn!("cancel reminder failed id={identifier}: {err}");
            }
        }
        log::debug!("task deleted id={id}");
        Ok(removed)
    }

    /// Tasks still needing attention, earliest due first.
    pub fn active_tasks(&self) -> Vec<Task> {
        let mut active: Vec<Task> = self
            .lock()
            .iter()
            .filter(|task| task.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|task| task.due_date);
        active
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.lock().iter().find(|t| t.id == id).cloned()
    }

    /// Key the unreadable payload was copied to when the store opened, if that happened.
    pub fn preserved_as(&self) -> Option<&str> {
        self.preserved_as.as_deref()
    }

    pub fn next_due_date(&self, date: DateTime<Utc>, recurrence: Recurrence) -> DateTime<Utc> {
        self.zone.next_due_date(date, recurrence)
    }

    pub fn urgency(&self, task: &Task, now: DateTime<Utc>) -> Urgency {
        task.urgency(now, self.due_soon)
    }

    /// Writes the current collection and reports the outcome.
    pub fn save(&self) -> Result<(), StoreError> {
        let guard = self.lock();
        self.persistence.save_tasks(&guard)?;
        Ok(())
    }

    /// Re-issues reminders for every active task, returning how many were accepted.
    pub fn resync_reminders(&self) -> Result<usize, StoreError> {
        let mut accepted = 0;
        let mut first_error = None;
        let guard = self.lock();
        for task in guard.iter().filter(|task| task.is_active()) {
            match self.notifier.schedule_reminder(&self.requests.reminder(task)) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    log::warn!("reminder resync failed id={}: {err}", task.id);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(accepted),
        }
    }

    fn alert_overdue(&self, now: DateTime<Utc>) -> usize {
        let overdue: Vec<Task> = self
            .lock()
            .iter()
            .filter(|task| task.is_overdue(now))
            .cloned()
            .collect();
        for task in &overdue {
            log::info!("task overdue id={} due={}", task.id, task.due_date);
            if let Err(err) = self.notifier.fire_overdue_alert(&self.requests.overdue(task)) {
                log::warn!("overdue alert failed id={}: {err}", task.id);
            }
        }
        overdue.len()
    }

    fn schedule(&self, task: &Task) {
        if let Err(err) = self.notifier.schedule_reminder(&self.requests.reminder(task)) {
            log::warn!("schedule reminder failed id={}: {err}", task.id);
        }
    }

    fn persist(&self, tasks: &[Task]) {
        if !self.autosave {
            log::warn!("autosave off, change kept in memory only");
            return;
        }
        if let Err(err) = self.persistence.save_tasks(tasks) {
            log::warn!("saving tasks failed, keeping in-memory state: {err}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn dedupe(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(task.id);
            if !fresh {
                log::warn!("dropping duplicate task id={}", task.id);
            }
            fresh
        })
        .collect()
}
