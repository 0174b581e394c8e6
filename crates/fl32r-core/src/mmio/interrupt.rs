use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle for raising hardware interrupts by index.
///
/// Devices hold a clone and may raise from `tick` or from another thread;
/// the CPU drains the queue at the start of every step.
#[derive(Debug, Clone, Default)]
pub struct InterruptLine {
    pending: Arc<Mutex<VecDeque<u32>>>,
}

impl InterruptLine {
    /// Creates an empty line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<u32>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues hardware interrupt `index`.
    pub fn raise(&self, index: u32) {
        self.queue().push_back(index);
    }

    /// Removes and returns the oldest pending interrupt.
    #[must_use]
    pub fn take(&self) -> Option<u32> {
        self.queue().pop_front()
    }

    /// Returns `true` when at least one interrupt is pending.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.queue().is_empty()
    }

    /// Drops every pending interrupt.
    pub fn clear(&self) {
        self.queue().clear();
    }
}
