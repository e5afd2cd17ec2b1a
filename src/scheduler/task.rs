use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};

pub type TaskError = Box<dyn std::error::Error + Send + Sync>;
pub type Progress = Box<dyn Any + Send>;

/// A unit of blocking work run on a pool worker.
///
/// `run` executes on the worker thread. The hooks run on the thread that calls
/// [`super::AsyncPool::collect_tasks`], after the task has finished.
pub trait AsyncTask: Send + 'static {
    fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError>;
    fn on_completion(&mut self) {}
    /// Called instead of `on_completion` when the task was cancelled, whether or not it ever ran.
    fn on_cancel(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Crashed,
    Cancelled,
}
impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Queued,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Crashed,
            _ => Self::Cancelled,
        }
    }
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Crashed | Self::Cancelled)
    }
}

struct TaskShared {
    type_name: &'static str,
    id: OnceLock<usize>,
    state: AtomicU8,
    cancel_requested: AtomicBool,
    body: Mutex<Option<Box<dyn AsyncTask>>>,
    progress_tx: Sender<Progress>,
    progress_rx: Receiver<Progress>,
    on_progress: Mutex<Option<Box<dyn FnMut(Progress) + Send>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handed to [`AsyncTask::run`] for talking back to the scheduling thread.
pub struct TaskContext {
    shared: Arc<TaskShared>,
}
impl TaskContext {
    /// Queues a progress update for the task's progress hook.
    pub fn publish_progress<P: Any + Send>(&self, progress: P) {
        // the receiver lives as long as the task, so this cannot fail
        let _ = self.shared.progress_tx.send(Box::new(progress));
    }
    /// Cancellation is cooperative; long running tasks should poll this.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }
}

/// Shared handle to a submitted (or submittable) task. Clones refer to the same task.
#[derive(Clone)]
pub struct TaskHandle(Arc<TaskShared>);

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("type", &self.0.type_name)
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    pub fn new<T: AsyncTask>(task: T) -> Self {
        let (progress_tx, progress_rx) = unbounded();
        Self(Arc::new(TaskShared {
            type_name: std::any::type_name::<T>(),
            id: OnceLock::new(),
            state: AtomicU8::new(TaskState::Queued as u8),
            cancel_requested: AtomicBool::new(false),
            body: Mutex::new(Some(Box::new(task))),
            progress_tx,
            progress_rx,
            on_progress: Mutex::new(None),
        }))
    }

    /// Receives every progress update in publish order, on the scheduling thread.
    pub fn on_progress(self, hook: impl FnMut(Progress) + Send + 'static) -> Self {
        *lock(&self.0.on_progress) = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> Option<usize> {
        self.0.id.get().copied()
    }
    pub fn type_name(&self) -> &'static str {
        self.0.type_name
    }
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.0.state.load(Ordering::Acquire))
    }
    pub fn cancel(&self) {
        self.0.cancel_requested.store(true, Ordering::Release);
    }
    pub fn is_cancel_requested(&self) -> bool {
        self.0.cancel_requested.load(Ordering::Acquire)
    }

    pub(super) fn assign_id(&self, id: usize) -> bool {
        self.0.id.set(id).is_ok()
    }
    pub(super) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0.state.compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub(super) fn with_body(&self, f: impl FnOnce(&mut dyn AsyncTask)) {
        if let Some(body) = lock(&self.0.body).as_mut() {
            f(body.as_mut())
        }
    }

    pub(super) fn drain_progress(&self) {
        let mut hook = lock(&self.0.on_progress);
        while let Ok(progress) = self.0.progress_rx.try_recv() {
            if let Some(hook) = hook.as_mut() {
                hook(progress);
            }
        }
    }

    /// Runs the task on the calling thread. Called by workers only.
    pub(super) fn execute(&self, worker: usize) {
        if self.is_cancel_requested() {
            self.transition(TaskState::Queued, TaskState::Cancelled);
            return;
        }
        if !self.transition(TaskState::Queued, TaskState::Running) {
            return;
        }
        let Some(mut body) = lock(&self.0.body).take() else {
            self.0.state.store(TaskState::Crashed as u8, Ordering::Release);
            return;
        };
        let ctx = TaskContext { shared: Arc::clone(&self.0) };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body.run(&ctx)));
        *lock(&self.0.body) = Some(body);

        let state = match outcome {
            Ok(Ok(())) if self.is_cancel_requested() => TaskState::Cancelled,
            Ok(Ok(())) => TaskState::Completed,
            Ok(Err(e)) => {
                log::warn!("task {:?} ({}) on worker {worker} failed: {e}", self.id(), self.type_name());
                TaskState::Crashed
            }
            Err(_) => {
                log::warn!("task {:?} ({}) on worker {worker} panicked", self.id(), self.type_name());
                TaskState::Crashed
            }
        };
        self.0.state.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(u32);
    impl AsyncTask for Counting {
        fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
            for i in 0..self.0 {
                ctx.publish_progress(i);
            }
            Ok(())
        }
    }

    struct Failing;
    impl AsyncTask for Failing {
        fn run(&mut self, _: &TaskContext) -> Result<(), TaskError> {
            Err("no disk".into())
        }
    }

    #[test]
    fn execute_completes_and_keeps_progress_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = TaskHandle::new(Counting(4)).on_progress(move |p| {
            if let Ok(n) = p.downcast::<u32>() {
                sink.lock().unwrap().push(*n);
            }
        });
        handle.execute(0);
        assert_eq!(handle.state(), TaskState::Completed);
        handle.drain_progress();
        assert_eq!(*seen.lock().unwrap(), [0, 1, 2, 3]);
    }

    #[test]
    fn errors_mark_the_task_crashed() {
        let handle = TaskHandle::new(Failing);
        handle.execute(0);
        assert_eq!(handle.state(), TaskState::Crashed);
        assert!(handle.type_name().ends_with("Failing"));
    }

    #[test]
    fn cancelled_before_start_never_runs() {
        let handle = TaskHandle::new(Counting(1));
        handle.cancel();
        handle.execute(0);
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(handle.0.progress_rx.is_empty());
    }

    #[test]
    fn ids_are_assigned_once() {
        let handle = TaskHandle::new(Counting(0));
        assert!(handle.assign_id(3));
        assert!(!handle.clone().assign_id(4));
        assert_eq!(handle.id(), Some(3));
    }
}
