use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum RunStatus {
    /// No backup is running and the last one failed.
    Failed,
    Idle,
    Running,
}

impl RunStatus {
    /// The value of the status gauge.
    pub fn gauge_value(&self) -> i64 {
        match self {
            RunStatus::Failed => -1,
            RunStatus::Idle => 0,
            RunStatus::Running => 1,
        }
    }

    fn from_gauge_value(value: i8) -> Self {
        match value {
            v if v < 0 => RunStatus::Failed,
            0 => RunStatus::Idle,
            _ => RunStatus::Running,
        }
    }
}

/// Shared state of the backup runner.
///
/// Holds the guard that keeps backups from overlapping and the current [`RunStatus`]. Both are
/// atomics so the status can be read at any time without waiting for a running backup.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
    status: AtomicI8,
}

impl RunState {
    /// Claims the guard without waiting; returns `None` while another run holds it.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { state: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_gauge_value(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: RunStatus) {
        self.status
            .store(status.gauge_value() as i8, Ordering::Release);
    }
}

/// Releases the run guard when dropped.
#[derive(Debug)]
pub struct RunPermit<'a> {
    state: &'a RunState,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
    }
}
