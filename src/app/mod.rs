//! Application layer: the Monitor Loop, Confirmer/Notifier Fanout,
//! Fallback Path, Retry Classifier, and the shared state they're wired
//! through.

pub mod confirmer;
pub mod fallback;
pub mod monitor;
pub mod retry;
pub mod state;
pub mod worker;

pub use confirmer::confirm_and_notify;
pub use fallback::{run_fallback, FallbackOutcome};
pub use monitor::{check_confirmation, run_cycle, MonitorHandle, MonitorState};
pub use retry::{execute_with_retry, RetryPolicy, RetryTally};
pub use state::{AppState, NotificationRoom};
pub use worker::{spawn_worker, WorkerConfig};
