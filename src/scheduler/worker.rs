use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::task::TaskHandle;
use super::PoolError;

/// One worker thread and its queue of stacked tasks.
pub(super) struct Worker {
    id: usize,
    queue: Sender<TaskHandle>,
    // lets the pool take back tasks the thread has not picked up yet
    backlog: Receiver<TaskHandle>,
    thread: JoinHandle<()>,
}

impl Worker {
    pub fn start(id: usize) -> Result<Self, PoolError> {
        let (queue, backlog) = unbounded::<TaskHandle>();
        let receiver = backlog.clone();
        let thread = thread::Builder::new()
            .name(format!("async-worker-{id}"))
            .spawn(move || {
                log::debug!("async worker {id} started");
                while let Ok(task) = receiver.recv() {
                    task.execute(id);
                }
                log::debug!("async worker {id} stopped");
            })
            .map_err(|source| PoolError::Spawn { worker: id, source })?;
        Ok(Self { id, queue, backlog, thread })
    }

    pub fn stack(&self, task: TaskHandle) {
        if self.queue.send(task).is_err() {
            log::error!("async worker {} queue closed", self.id);
        }
    }

    pub fn unstack(&self) -> Option<TaskHandle> {
        self.backlog.try_recv().ok()
    }

    /// Closes the queue and waits for the thread to finish whatever is left in it.
    pub fn quit(self) {
        let Worker { id, queue, backlog, thread } = self;
        drop(queue);
        drop(backlog);
        if thread.join().is_err() {
            log::error!("async worker {id} panicked outside of a task");
        }
    }
}
