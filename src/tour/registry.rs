//! Single-flight slot for tour runs
//!
//! At most one run may be alive per registry. Controllers share the
//! process-wide [`TourRegistry::global`] unless given their own.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::TourError;

/// Identifier of a tour run, unique within its registry
pub type RunId = u64;

static GLOBAL: Lazy<Arc<TourRegistry>> = Lazy::new(|| Arc::new(TourRegistry::new()));

#[derive(Debug, Default)]
pub struct TourRegistry {
    active: Mutex<Option<RunId>>,
    next_id: AtomicU64,
}

impl TourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every controller in the process
    pub fn global() -> Arc<TourRegistry> {
        Arc::clone(&GLOBAL)
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for a new run
    pub fn acquire(self: &Arc<Self>) -> Result<RunSlot, TourError> {
        let mut active = self.lock();
        if let Some(run_id) = *active {
            return Err(TourError::AlreadyActive(run_id));
        }
        let run_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        *active = Some(run_id);
        Ok(RunSlot {
            registry: Arc::clone(self),
            run_id,
        })
    }

    /// Run currently holding the slot
    pub fn active_run(&self) -> Option<RunId> {
        *self.lock()
    }

    fn release(&self, run_id: RunId) {
        let mut active = self.lock();
        if *active == Some(run_id) {
            *active = None;
        }
    }
}

/// Occupancy of the registry slot; released on drop
#[derive(Debug)]
pub struct RunSlot {
    registry: Arc<TourRegistry>,
    run_id: RunId,
}

impl RunSlot {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.registry.release(self.run_id);
    }
}
