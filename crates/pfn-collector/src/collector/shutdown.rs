//! Run lifecycle and graceful shutdown.
//!
//! A run moves strictly forward through [`RunState`]:
//!
//! ```text
//! Running -> Draining -> Flushing -> Terminated
//! ```
//!
//! `Draining` means no new units are admitted; units already handed to a
//! worker finish and are written. `Flushing` means buffered output is being
//! persisted. Any stage may jump ahead, but never back.

use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use std::fmt;
use tokio_util::sync::CancellationToken;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunState {
    Running = 0,
    Draining = 1,
    Flushing = 2,
    Terminated = 3,
}

impl RunState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            2 => Self::Flushing,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Flushing => "flushing",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why the run stopped admitting work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Every unit was dispatched.
    Completed,
    /// An external signal asked the run to stop.
    Interrupted(String),
    /// An unrecoverable error stopped the run.
    Fatal(String),
}

impl ShutdownReason {
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Interrupted(signal) => write!(f, "interrupted by {signal}"),
            Self::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

/// Shared handle driving the run's lifecycle.
///
/// Cloning is not supported; share it through an `Arc`.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    state: AtomicU8,
    terminated: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
    token: CancellationToken,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Running as u8),
            terminated: AtomicBool::new(false),
            reason: Mutex::new(None),
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves the run to `to` if that is ahead of the current state.
    ///
    /// Returns `true` if the state changed.
    pub fn advance(&self, to: RunState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= to as u8 {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::debug!("Run state {} -> {to}", RunState::from_u8(current));
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Records why the run is stopping and moves it to
    /// [`RunState::Draining`].
    ///
    /// Only the first reason is kept. Anything but
    /// [`ShutdownReason::Completed`] also cancels [`Self::token`], which stops
    /// dispatch and tells the writer to wrap up.
    pub fn request(&self, reason: ShutdownReason) {
        let cancel = !matches!(reason, ShutdownReason::Completed);
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                tracing::info!("Shutdown requested: {reason}");
                *slot = Some(reason);
            }
        }
        self.advance(RunState::Draining);
        if cancel {
            self.token.cancel();
        }
    }

    /// Token cancelled when the run is interrupted or fails.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_interrupted(&self) -> bool {
        self.reason
            .lock()
            .as_ref()
            .is_some_and(ShutdownReason::is_interrupt)
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().clone()
    }

    /// Marks the run terminated. Returns `true` for the first caller only.
    pub fn terminate(&self) -> bool {
        self.advance(RunState::Terminated);
        !self.terminated.swap(true, Ordering::AcqRel)
    }
}
