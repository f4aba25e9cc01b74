use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::CoreError;

/// Bounded pool of monitoring slots.
///
/// Each active monitor holds exactly one [`AdmissionSlot`]; once the pool is
/// exhausted, further monitors wait in [`AdmissionPool::acquire`].
#[derive(Clone)]
pub struct AdmissionPool {
    sem: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of capacity. Released when dropped, whatever the monitor's exit path.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<AdmissionSlot, CoreError> {
        let permit = Arc::clone(&self.sem)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::AdmissionClosed)?;
        Ok(AdmissionSlot { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionSlot> {
        Arc::clone(&self.sem)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionSlot { _permit: permit })
    }

    /// Stop admitting; pending and future acquisitions fail.
    pub fn close(&self) {
        self.sem.close();
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}
