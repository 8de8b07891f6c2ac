use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds how many pipelines run at once. Clones share the same slots.
#[derive(Debug, Clone)]
pub struct Gate {
    slots: Arc<Semaphore>,
}

/// A held slot. Dropping it, on any path, frees the slot.
#[derive(Debug)]
pub struct GatePass {
    _permit: OwnedSemaphorePermit,
}

impl Gate {
    /// A zero-sized gate would never open, so `size` is raised to 1.
    pub fn new(size: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Suspends until a slot is free. Fails only if the semaphore was closed.
    pub async fn enter(&self) -> anyhow::Result<GatePass> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .context("pipeline gate is closed")?;

        Ok(GatePass { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
