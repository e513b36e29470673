//! Bounded worker pool for batch processing.
//!
//! Two independent limits live here: the pool width caps how many tasks
//! are in flight, and the [`StageGate`] caps how many of them are inside
//! the expensive stage at once. Both are counting permits released on
//! drop, so a task that panics or is cancelled never leaks one.

use std::future::Future;
use std::sync::Arc;

use certflow_domain::error::{BatchFatalError, ValidationError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Counting permit guarding the expensive stage of a task.
#[derive(Debug, Clone)]
pub struct StageGate {
    permits: Arc<Semaphore>,
}

impl StageGate {
    /// Wait for a stage permit; it is released when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BatchFatalError::PermitsClosed`] once the pool is closed.
    pub async fn enter(&self) -> Result<OwnedSemaphorePermit, BatchFatalError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BatchFatalError::PermitsClosed)
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Outputs collected at the join barrier.
#[derive(Debug)]
pub struct Joined<O> {
    pub outputs: Vec<O>,
    /// Tasks that panicked or were cancelled.
    pub interrupted: usize,
}

/// A bounded set of worker tasks with a join barrier.
pub struct WorkerPool<O> {
    slots: Arc<Semaphore>,
    gate: StageGate,
    tasks: JoinSet<O>,
}

impl<O: Send + 'static> WorkerPool<O> {
    /// Create a pool running at most `width` tasks, at most
    /// `stage_permits` of them inside the expensive stage.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroLimit`] when either limit is zero.
    pub fn new(width: usize, stage_permits: usize) -> Result<Self, ValidationError> {
        if width == 0 {
            return Err(ValidationError::ZeroLimit("pool width"));
        }
        if stage_permits == 0 {
            return Err(ValidationError::ZeroLimit("stage permits"));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(width)),
            gate: StageGate {
                permits: Arc::new(Semaphore::new(stage_permits)),
            },
            tasks: JoinSet::new(),
        })
    }

    /// Wait for a free slot, then spawn the task built by `task`.
    ///
    /// The slot is held until the task finishes, panics, or is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`BatchFatalError::PermitsClosed`] once the pool is closed.
    pub async fn spawn<F, Fut>(&mut self, task: F) -> Result<(), BatchFatalError>
    where
        F: FnOnce(StageGate) -> Fut,
        Fut: Future<Output = O> + Send + 'static,
    {
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BatchFatalError::PermitsClosed)?;
        let work = task(self.gate.clone());
        self.tasks.spawn(async move {
            let _slot = slot;
            work.await
        });
        Ok(())
    }

    /// Refuse new slots and stage permits; tasks already holding them run
    /// to completion.
    pub fn close(&self) {
        self.slots.close();
        self.gate.permits.close();
    }

    /// Wait for every task.
    pub async fn join(mut self) -> Joined<O> {
        let mut joined = Joined {
            outputs: Vec::with_capacity(self.tasks.len()),
            interrupted: 0,
        };
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(output) => joined.outputs.push(output),
                Err(err) => {
                    tracing::warn!(panicked = err.is_panic(), "worker task interrupted");
                    joined.interrupted += 1;
                }
            }
        }
        joined
    }
}
