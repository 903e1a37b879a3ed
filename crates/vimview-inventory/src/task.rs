//! Task polling
//!
//! A task's `info.state` moves `queued | running → success | error`. The
//! waiter re-synchronizes the task view at a fixed interval until a terminal
//! state is seen, the caller cancels, or an optional timeout elapses.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use vimview_invoke::WireValue;

use crate::entities::Task;
use crate::error::InventoryError;

/// Server-side task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

impl TaskState {
    /// Whether no further transitions will happen
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

impl FromStr for TaskState {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskState::Queued),
            "running" => Ok(TaskState::Running),
            "success" => Ok(TaskState::Success),
            "error" => Ok(TaskState::Error),
            other => Err(InventoryError::Protocol(format!(
                "unrecognized task state {other:?}"
            ))),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Terminal task failure, reported as data
///
/// A task in the error state that carries no `error` field yields the
/// default value: empty name and message with a `Null` detail.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaultInfo {
    /// Fault type (e.g. `InvalidPowerState`)
    pub fault_name: String,
    /// Full fault object
    pub detail: WireValue,
    /// Human-readable message from the server
    pub localized_message: String,
}

impl FaultInfo {
    /// Decode a `LocalizedMethodFault`
    fn from_wire(error: &WireValue) -> Option<Self> {
        let error = error.as_data()?;
        let detail = error.field("fault").cloned().unwrap_or_default();
        let fault_name = detail
            .as_data()
            .map_or_else(|| error.type_name.clone(), |f| f.type_name.clone());
        let localized_message = error
            .field("localizedMessage")
            .and_then(WireValue::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self {
            fault_name,
            detail,
            localized_message,
        })
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.fault_name, self.localized_message)
    }
}

/// Decoded `TaskInfo` data object
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    /// Current state
    pub state: TaskState,
    /// Result payload (meaningful on success)
    pub result: WireValue,
    /// Fault (present on error)
    pub error: Option<FaultInfo>,
    /// Completion percentage, while running
    pub progress: Option<i64>,
    /// Operation identifier (e.g. `Folder.createVm`)
    pub description_id: Option<String>,
}

impl TaskInfo {
    /// Decode the `info` attribute of a task
    ///
    /// # Errors
    /// Returns `InventoryError::Protocol` when `info` is missing, has no
    /// state, or carries a state outside the known four.
    pub fn from_wire(info: &WireValue) -> Result<Self, InventoryError> {
        let data = info
            .as_data()
            .ok_or_else(|| InventoryError::Protocol("task has no info".to_string()))?;
        let state: TaskState = data
            .field("state")
            .and_then(WireValue::as_str)
            .ok_or_else(|| InventoryError::Protocol("task info has no state".to_string()))?
            .parse()?;

        Ok(Self {
            state,
            result: data.field("result").cloned().unwrap_or_default(),
            error: data.field("error").and_then(FaultInfo::from_wire),
            progress: data.field("progress").and_then(WireValue::as_i64),
            description_id: data
                .field("descriptionId")
                .and_then(WireValue::as_str)
                .map(str::to_string),
        })
    }
}

impl Task {
    /// Decoded task info as of the last synchronization
    ///
    /// # Errors
    /// Returns `InventoryError::Protocol` if the info is missing or malformed.
    pub fn info(&self) -> Result<TaskInfo, InventoryError> {
        TaskInfo::from_wire(self.attribute("info").unwrap_or(&WireValue::Null))
    }

    /// State as of the last synchronization
    ///
    /// # Errors
    /// Returns `InventoryError::Protocol` if the state is missing or unknown.
    pub fn state(&self) -> Result<TaskState, InventoryError> {
        self.info().map(|i| i.state)
    }
}

/// Why a wait ended without a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `CancelToken::cancel` was called
    Aborted,
    /// The waiter's timeout elapsed
    TimedOut,
}

/// Result of waiting for a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Task succeeded with this result payload
    Success(WireValue),
    /// Task failed on the server
    Failed(FaultInfo),
    /// Wait stopped before the task finished
    Cancelled(CancelReason),
}

impl TaskOutcome {
    /// Whether the task succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Cloneable abort signal for task waits
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create an untriggered token
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal every clone of this token
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `cancel` has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls tasks to completion
#[derive(Debug, Clone)]
pub struct TaskWaiter {
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl TaskWaiter {
    /// Interval between polls unless configured otherwise
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// Create a waiter with the default interval and no timeout
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }

    /// Set the interval between polls
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up after `timeout` with `CancelReason::TimedOut`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Interval between polls
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `task` reaches a terminal state
    ///
    /// The task's current (already synchronized) state is checked first;
    /// each further check costs one sleep and one re-synchronization.
    ///
    /// # Errors
    /// Transport faults during polling and protocol violations (unknown
    /// state, missing info) are errors. A failed task is not: it is returned
    /// as `TaskOutcome::Failed`, with a default `FaultInfo` if the server
    /// sent none.
    #[instrument(skip(self, task, cancel), fields(task = %task.identity()))]
    pub async fn await_completion(
        &self,
        task: &mut Task,
        cancel: &CancelToken,
    ) -> Result<TaskOutcome, InventoryError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut polls = 0u32;
        let mut last_state = None;

        loop {
            let info = task.info()?;
            if last_state != Some(info.state) {
                debug!(state = %info.state, progress = ?info.progress, polls, "task state");
                last_state = Some(info.state);
            }

            if info.state.is_terminal() {
                if info.state == TaskState::Success {
                    info!(polls, "task succeeded");
                    return Ok(TaskOutcome::Success(info.result));
                }
                let fault = info.error.unwrap_or_default();
                warn!(polls, fault = %fault, "task failed");
                return Ok(TaskOutcome::Failed(fault));
            }

            if cancel.is_cancelled() {
                return Ok(TaskOutcome::Cancelled(CancelReason::Aborted));
            }

            let next_poll = Instant::now() + self.poll_interval;
            let wake = deadline.map_or(next_poll, |d| d.min(next_poll));
            tokio::select! {
                () = tokio::time::sleep_until(wake) => {}
                () = cancel.cancelled() => {
                    info!(polls, "task wait aborted");
                    return Ok(TaskOutcome::Cancelled(CancelReason::Aborted));
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!(polls, "task wait timed out");
                return Ok(TaskOutcome::Cancelled(CancelReason::TimedOut));
            }

            task.sync().await?;
            polls += 1;
        }
    }
}

impl Default for TaskWaiter {
    fn default() -> Self {
        Self::new()
    }
}
