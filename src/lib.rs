mod error;
pub mod logging;
mod models;
pub mod notify;
mod repeat;
pub mod scheduler;
mod state;
pub mod storage;

pub use crate::error::StoreError;
pub use crate::models::{Recurrence, Settings, Task, TaskId, Urgency};
pub use crate::notify::{LogNotifier, Notifier, NotifyError, OverdueAlert, ReminderRequest};
pub use crate::repeat::{next_due_date, next_due_date_in, CalendarZone};
pub use crate::scheduler::{start_dispatcher, DispatchNotifier};
pub use crate::state::TaskStore;
pub use crate::storage::{FileStore, KeyValueStore, MemoryStore, StorageError, TaskPersistence};
