//! Background workers for blocking jobs, driven from the server tick.

mod pool;
mod task;
mod worker;

pub use pool::AsyncPool;
pub use task::{AsyncTask, Progress, TaskContext, TaskError, TaskHandle, TaskState};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("task {0} has already been submitted")]
    AlreadySubmitted(usize),
    #[error("invalid worker {worker}, pool size is {size}")]
    InvalidWorker { worker: usize, size: usize },
    #[error("pool has been shut down")]
    Stopped,
    #[error("failed to start async worker {worker}: {source}")]
    Spawn { worker: usize, source: std::io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Running,
    ShuttingDown,
    Stopped,
}

/// Returned by [`AsyncPool::add_worker_start_hook`] so the hook can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);
