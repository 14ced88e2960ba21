use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::notify::{Notifier, NotifyError, OverdueAlert, ReminderRequest};

enum Command {
    Schedule(ReminderRequest),
    Cancel(String),
    Overdue(OverdueAlert),
}

/// Queues requests for a background dispatcher and returns immediately.
///
/// Requests reach the wrapped notifier in submission order, so a later reminder for the same
/// identifier always replaces an earlier one.
#[derive(Clone)]
pub struct DispatchNotifier {
    tx: mpsc::UnboundedSender<Command>,
}

impl DispatchNotifier {
    fn submit(&self, command: Command) -> Result<(), NotifyError> {
        self.tx.send(command).map_err(|_| NotifyError::Unavailable)
    }
}

impl Notifier for DispatchNotifier {
    fn schedule_reminder(&self, request: &ReminderRequest) -> Result<(), NotifyError> {
        self.submit(Command::Schedule(request.clone()))
    }

    fn cancel_reminder(&self, identifier: &str) -> Result<(), NotifyError> {
        self.submit(Command::Cancel(identifier.to_string()))
    }

    fn fire_overdue_alert(&self, alert: &OverdueAlert) -> Result<(), NotifyError> {
        self.submit(Command::Overdue(alert.clone()))
    }
}

/// Spawns the dispatcher on the blocking pool of the current tokio runtime.
///
/// The returned handle completes once every `DispatchNotifier` clone has been dropped and the
/// queue is drained.
pub fn start_dispatcher<N>(notifier: N) -> (DispatchNotifier, JoinHandle<()>)
where
    N: Notifier + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let handle = tokio::task::spawn_blocking(move || {
        while let Some(command) = rx.blocking_recv() {
            let (kind, identifier, result) = match &command {
                Command::Schedule(request) => (
                    "schedule",
                    request.identifier.as_str(),
                    notifier.schedule_reminder(request),
                ),
                Command::Cancel(identifier) => (
                    "cancel",
                    identifier.as_str(),
                    notifier.cancel_reminder(identifier),
                ),
                Command::Overdue(alert) => (
                    "overdue",
                    alert.identifier.as_str(),
                    notifier.fire_overdue_alert(alert),
                ),
            };
            if let Err(err) = result {
                log::warn!("notification {kind} failed id={identifier}: {err}");
            }
        }
        log::debug!("notification dispatcher stopped");
    });
    (DispatchNotifier { tx }, handle)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Recurrence, Settings, Task};
    use crate::notify::recording::{Call, RecordingNotifier};
    use crate::notify::RequestBuilder;
    use crate::repeat::CalendarZone;
    use chrono::{TimeZone, Utc};

    fn builder() -> RequestBuilder {
        RequestBuilder::new(&Settings::default(), CalendarZone::Named(chrono_tz::UTC))
    }

    #[tokio::test]
    async fn requests_are_forwarded_in_submission_order() {
        let recorder = Arc::new(RecordingNotifier::default());
        let (dispatch, handle) = start_dispatcher(Arc::clone(&recorder));

        let due = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let task = Task::new("Pay rent", due, Recurrence::Monthly);
        let first = builder().reminder(&task);
        let mut moved = task.clone();
        moved.due_date = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let second = builder().reminder(&moved);

        dispatch.schedule_reminder(&first).unwrap();
        dispatch.schedule_reminder(&second).unwrap();
        dispatch.cancel_reminder(&first.identifier).unwrap();
        dispatch.fire_overdue_alert(&builder().overdue(&task)).unwrap();
        drop(dispatch);
        handle.await.unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], Call::Scheduled(first.clone()));
        assert_eq!(calls[1], Call::Scheduled(second));
        assert_eq!(calls[2], Call::Cancelled(first.identifier));
        assert!(matches!(calls[3], Call::Overdue(_)));
        assert!(recorder.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_requests_do_not_stop_the_dispatcher() {
        let recorder = Arc::new(RecordingNotifier::default());
        recorder.set_reject(true);
        let (dispatch, handle) = start_dispatcher(Arc::clone(&recorder));

        let due = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let task = Task::new("t", due, Recurrence::None);
        assert!(dispatch.schedule_reminder(&builder().reminder(&task)).is_ok());
        assert!(dispatch.cancel_reminder("anything").is_ok());
        drop(dispatch);
        handle.await.unwrap();

        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn submitting_after_shutdown_reports_unavailable() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let dispatch = DispatchNotifier { tx };
        assert_eq!(
            dispatch.cancel_reminder("gone"),
            Err(NotifyError::Unavailable)
        );
    }
}
