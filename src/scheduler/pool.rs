use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::task::{TaskHandle, TaskState};
use super::worker::Worker;
use super::{HookId, PoolError, PoolState};
use crate::config::PoolConfig;

const REMOVE_POLL: Duration = Duration::from_millis(25);

type StartHook = Box<dyn FnMut(usize) + Send>;

/// A lazily started, fixed upper size set of worker threads.
///
/// Owned by the tick thread. Workers are started on first use and tasks are
/// balanced by backlog: the number of submitted tasks a worker holds that have
/// not been collected yet.
pub struct AsyncPool {
    size: usize,
    idle_timeout: Duration,

    tasks: BTreeMap<usize, TaskHandle>,
    task_workers: BTreeMap<usize, usize>,
    next_task_id: usize,

    workers: BTreeMap<usize, Worker>,
    worker_usage: BTreeMap<usize, usize>,
    worker_last_used: BTreeMap<usize, Instant>,

    start_hooks: BTreeMap<HookId, StartHook>,
    next_hook_id: u64,

    shutting_down: bool,
    stopped: bool,
}

impl AsyncPool {
    pub fn new(size: usize, idle_timeout: Duration) -> Self {
        Self {
            size: size.max(1),
            idle_timeout,
            tasks: BTreeMap::new(),
            task_workers: BTreeMap::new(),
            next_task_id: 1,
            workers: BTreeMap::new(),
            worker_usage: BTreeMap::new(),
            worker_last_used: BTreeMap::new(),
            start_hooks: BTreeMap::new(),
            next_hook_id: 0,
            shutting_down: false,
            stopped: false,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.size, Duration::from_secs(config.idle_timeout_secs))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Raises the maximum worker count. The pool never shrinks.
    pub fn increase_size(&mut self, size: usize) {
        if size > self.size {
            log::debug!("async pool size {} -> {}", self.size, size);
            self.size = size;
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn state(&self) -> PoolState {
        if self.stopped {
            PoolState::Stopped
        } else if self.shutting_down {
            PoolState::ShuttingDown
        } else if self.workers.is_empty() {
            PoolState::Idle
        } else {
            PoolState::Running
        }
    }

    pub fn running_workers(&self) -> Vec<usize> {
        self.workers.keys().copied().collect()
    }

    pub fn backlog(&self, worker: usize) -> usize {
        self.worker_usage.get(&worker).copied().unwrap_or(0)
    }

    pub fn task_worker(&self, task_id: usize) -> Option<usize> {
        self.task_workers.get(&task_id).copied()
    }

    pub fn tracked_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Registers `hook` and calls it for every worker already running.
    pub fn add_worker_start_hook(&mut self, hook: impl FnMut(usize) + Send + 'static) -> HookId {
        let id = HookId(self.next_hook_id);
        self.next_hook_id += 1;
        let mut hook: StartHook = Box::new(hook);
        for &worker in self.workers.keys() {
            hook(worker);
        }
        self.start_hooks.insert(id, hook);
        id
    }

    pub fn remove_worker_start_hook(&mut self, id: HookId) -> bool {
        self.start_hooks.remove(&id).is_some()
    }

    fn start_worker(&mut self, worker: usize) -> Result<(), PoolError> {
        if self.workers.contains_key(&worker) {
            return Ok(());
        }
        self.workers.insert(worker, Worker::start(worker)?);
        self.worker_usage.insert(worker, 0);
        log::debug!("started async worker {worker}");
        for hook in self.start_hooks.values_mut() {
            hook(worker);
        }
        Ok(())
    }

    /// The worker the next task should go to.
    ///
    /// Prefers the running worker with the smallest backlog, lowest index first.
    /// An unstarted slot is used instead when nothing is running or every running
    /// worker is busy and the pool has room left.
    pub fn select_worker(&self) -> usize {
        let mut best: Option<(usize, usize)> = None;
        for (&worker, &usage) in &self.worker_usage {
            if best.map_or(true, |(_, min)| usage < min) {
                best = Some((worker, usage));
                if usage == 0 {
                    break;
                }
            }
        }
        match best {
            Some((worker, usage)) if usage == 0 || self.workers.len() >= self.size => worker,
            _ => (0..self.size).find(|i| !self.workers.contains_key(i)).unwrap_or(0),
        }
    }

    /// Queues `task` on the least busy worker and returns that worker's index.
    pub fn submit_task(&mut self, task: &TaskHandle) -> Result<usize, PoolError> {
        let worker = self.select_worker();
        self.submit_task_to_worker(task, worker)?;
        Ok(worker)
    }

    /// Queues `task` on a specific worker, starting it if needed. Returns the task id.
    pub fn submit_task_to_worker(&mut self, task: &TaskHandle, worker: usize) -> Result<usize, PoolError> {
        if self.stopped || self.shutting_down {
            return Err(PoolError::Stopped);
        }
        if worker >= self.size {
            return Err(PoolError::InvalidWorker { worker, size: self.size });
        }
        if let Some(id) = task.id() {
            return Err(PoolError::AlreadySubmitted(id));
        }
        self.start_worker(worker)?;

        let id = self.next_task_id;
        if !task.assign_id(id) {
            return Err(PoolError::AlreadySubmitted(task.id().unwrap_or(id)));
        }
        self.next_task_id += 1;

        self.tasks.insert(id, task.clone());
        self.task_workers.insert(id, worker);
        *self.worker_usage.entry(worker).or_insert(0) += 1;
        self.worker_last_used.insert(worker, Instant::now());
        if let Some(w) = self.workers.get(&worker) {
            w.stack(task.clone());
        }
        log::trace!("task {id} ({}) queued on worker {worker}", task.type_name());
        Ok(id)
    }

    fn release(&mut self, id: usize) {
        self.tasks.remove(&id);
        if let Some(worker) = self.task_workers.remove(&id) {
            if let Some(usage) = self.worker_usage.get_mut(&worker) {
                *usage = usage.saturating_sub(1);
            }
        }
    }

    /// Runs hooks for every finished task and stops tracking it.
    pub fn collect_tasks(&mut self) {
        let finished: Vec<(usize, TaskHandle)> = self.tasks.iter().map(|(&id, task)| (id, task.clone())).collect();
        for (id, task) in finished {
            task.drain_progress();
            match task.state() {
                TaskState::Queued | TaskState::Running => continue,
                TaskState::Completed => {
                    task.drain_progress();
                    task.with_body(|body| body.on_completion());
                }
                TaskState::Cancelled => {
                    task.drain_progress();
                    task.with_body(|body| body.on_cancel());
                }
                TaskState::Crashed => {
                    let name = task.type_name().rsplit("::").next().unwrap_or(task.type_name());
                    log::error!("Could not execute asynchronous task {name}: task crashed");
                }
            }
            self.release(id);
        }
    }

    /// Cancels everything. Blocks until running tasks notice and finish.
    pub fn remove_tasks(&mut self) {
        let mut unstacked = Vec::new();
        for worker in self.workers.values() {
            while let Some(task) = worker.unstack() {
                unstacked.push(task);
            }
        }
        for task in unstacked {
            task.cancel();
            if task.transition(TaskState::Queued, TaskState::Cancelled) {
                task.with_body(|body| body.on_cancel());
            }
            if let Some(id) = task.id() {
                self.release(id);
            }
        }

        let mut waited = false;
        loop {
            let ids: Vec<usize> = self.tasks.keys().copied().collect();
            for id in ids {
                let Some(task) = self.tasks.get(&id).cloned() else { continue };
                task.cancel();
                let state = task.state();
                if state.is_terminal() {
                    task.drain_progress();
                    if state == TaskState::Cancelled {
                        task.with_body(|body| body.on_cancel());
                    }
                    self.release(id);
                }
            }
            if self.tasks.is_empty() {
                break;
            }
            if !waited {
                log::warn!("waiting for {} running async tasks to notice cancellation", self.tasks.len());
                waited = true;
            }
            std::thread::sleep(REMOVE_POLL);
        }

        for usage in self.worker_usage.values_mut() {
            *usage = 0;
        }
        self.task_workers.clear();
    }

    /// Stops workers with nothing to do that have sat idle for the idle timeout.
    pub fn shutdown_unused_workers(&mut self) -> usize {
        let now = Instant::now();
        let idle: Vec<usize> = self
            .worker_usage
            .iter()
            .filter(|&(worker, &usage)| {
                usage == 0
                    && self
                        .worker_last_used
                        .get(worker)
                        .map_or(true, |&last| now.duration_since(last) >= self.idle_timeout)
            })
            .map(|(&worker, _)| worker)
            .collect();

        for worker in &idle {
            self.worker_usage.remove(worker);
            self.worker_last_used.remove(worker);
            if let Some(w) = self.workers.remove(worker) {
                w.quit();
            }
        }
        if !idle.is_empty() {
            log::debug!("shut down {} unused async workers", idle.len());
        }
        idle.len()
    }

    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.shutting_down = true;
        self.collect_tasks();
        self.remove_tasks();
        for (_, worker) in std::mem::take(&mut self.workers) {
            worker.quit();
        }
        self.worker_usage.clear();
        self.worker_last_used.clear();
        self.shutting_down = false;
        self.stopped = true;
        log::debug!("async pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{AsyncTask, TaskContext, TaskError};
    use crossbeam_channel::{bounded, Receiver, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Counters {
        completed: Arc<AtomicUsize>,
        cancelled: Arc<AtomicUsize>,
    }
    impl Counters {
        fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
        fn cancelled(&self) -> usize {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    /// Blocks until the gate gets a message or is dropped, or the task is cancelled.
    struct Gated {
        gate: Receiver<()>,
        counters: Counters,
    }
    impl AsyncTask for Gated {
        fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
            while !ctx.is_cancelled() {
                match self.gate.recv_timeout(Duration::from_millis(1)) {
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
            Ok(())
        }
        fn on_completion(&mut self) {
            self.counters.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_cancel(&mut self) {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Quick(Counters);
    impl AsyncTask for Quick {
        fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
            for i in 0..3u32 {
                ctx.publish_progress(i);
            }
            Ok(())
        }
        fn on_completion(&mut self) {
            self.0.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing(Counters);
    impl AsyncTask for Failing {
        fn run(&mut self, _: &TaskContext) -> Result<(), TaskError> {
            Err("broken".into())
        }
        fn on_completion(&mut self) {
            self.0.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;
    impl AsyncTask for Panicking {
        fn run(&mut self, _: &TaskContext) -> Result<(), TaskError> {
            panic!("worker task blew up")
        }
    }

    fn gated(counters: &Counters) -> (Sender<()>, TaskHandle) {
        let (tx, rx) = bounded(1);
        (tx, TaskHandle::new(Gated { gate: rx, counters: counters.clone() }))
    }

    fn wait_for(task: &TaskHandle, pred: impl Fn(TaskState) -> bool) {
        let start = Instant::now();
        while !pred(task.state()) {
            assert!(start.elapsed() < Duration::from_secs(10), "task stuck in {:?}", task.state());
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn wait_terminal(task: &TaskHandle) {
        wait_for(task, TaskState::is_terminal)
    }

    #[test]
    fn tasks_spread_lowest_index_first() {
        let counters = Counters::default();
        let mut pool = AsyncPool::new(2, Duration::from_secs(300));
        assert_eq!(pool.state(), PoolState::Idle);
        let gates: Vec<_> = (0..3).map(|_| gated(&counters)).collect();
        let workers: Vec<usize> = gates.iter().map(|(_, t)| pool.submit_task(t).unwrap()).collect();
        assert_eq!(workers, [0, 1, 0]);
        assert_eq!((pool.backlog(0), pool.backlog(1)), (2, 1));
        assert_eq!(pool.state(), PoolState::Running);
        assert_eq!(gates.iter().map(|(_, t)| t.id().unwrap()).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(pool.task_worker(3), Some(0));
        drop(gates);
        pool.shutdown();
    }

    #[test]
    fn backlog_drops_as_tasks_are_collected() {
        let counters = Counters::default();
        let mut pool = AsyncPool::new(1, Duration::from_secs(300));
        let gates: Vec<_> = (0..3).map(|_| gated(&counters)).collect();
        for (_, task) in &gates {
            assert_eq!(pool.submit_task(task).unwrap(), 0);
        }
        assert_eq!(pool.backlog(0), 3);

        for (n, (gate, task)) in gates.iter().enumerate() {
            gate.send(()).unwrap();
            wait_terminal(task);
            pool.collect_tasks();
            assert_eq!(pool.backlog(0), 2 - n);
            assert_eq!(counters.completed(), n + 1);
        }
        pool.collect_tasks();
        assert_eq!(counters.completed(), 3);
        assert_eq!(pool.tracked_tasks(), 0);
        pool.shutdown();
    }

    #[test]
    fn progress_arrives_before_completion() {
        let counters = Counters::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let task = TaskHandle::new(Quick(counters.clone())).on_progress(move |p| {
            if let Ok(n) = p.downcast::<u32>() {
                sink.lock().unwrap().push(*n);
            }
        });
        let mut pool = AsyncPool::new(1, Duration::from_secs(300));
        pool.submit_task(&task).unwrap();
        wait_terminal(&task);
        pool.collect_tasks();
        assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
        assert_eq!(counters.completed(), 1);
        pool.shutdown();
    }

    #[test]
    fn double_submission_is_rejected() {
        let mut pool = AsyncPool::new(2, Duration::from_secs(300));
        let task = TaskHandle::new(Quick(Counters::default()));
        pool.submit_task(&task).unwrap();
        assert!(matches!(pool.submit_task(&task.clone()), Err(PoolError::AlreadySubmitted(1))));
        assert!(matches!(
            pool.submit_task_to_worker(&TaskHandle::new(Quick(Counters::default())), 2),
            Err(PoolError::InvalidWorker { worker: 2, size: 2 })
        ));
        pool.shutdown();
    }

    #[test]
    fn stopped_pool_rejects_work() {
        let mut pool = AsyncPool::new(1, Duration::from_secs(300));
        pool.shutdown();
        assert_eq!(pool.state(), PoolState::Stopped);
        let task = TaskHandle::new(Quick(Counters::default()));
        assert!(matches!(pool.submit_task(&task), Err(PoolError::Stopped)));
        assert_eq!(task.id(), None);
    }

    #[test]
    fn remove_tasks_cancels_queued_and_running() {
        let counters = Counters::default();
        let mut pool = AsyncPool::new(1, Duration::from_secs(300));
        let (_gate_a, running) = gated(&counters);
        let (_gate_b, queued) = gated(&counters);
        pool.submit_task(&running).unwrap();
        pool.submit_task(&queued).unwrap();
        wait_for(&running, |s| s == TaskState::Running);

        pool.remove_tasks();
        assert_eq!(queued.state(), TaskState::Cancelled);
        assert_eq!(running.state(), TaskState::Cancelled);
        assert_eq!(counters.cancelled(), 2);
        assert_eq!(counters.completed(), 0);
        assert_eq!(pool.tracked_tasks(), 0);
        assert_eq!(pool.backlog(0), 0);
        assert_eq!(pool.task_worker(1), None);
        pool.shutdown();
    }

    #[test]
    fn unused_workers_are_stopped_busy_ones_kept() {
        let counters = Counters::default();
        let mut pool = AsyncPool::new(2, Duration::ZERO);
        let (gate, busy) = gated(&counters);
        let quick = TaskHandle::new(Quick(counters.clone()));
        pool.submit_task_to_worker(&busy, 0).unwrap();
        pool.submit_task_to_worker(&quick, 1).unwrap();
        wait_terminal(&quick);
        pool.collect_tasks();
        assert_eq!(pool.backlog(1), 0);

        assert_eq!(pool.shutdown_unused_workers(), 1);
        assert_eq!(pool.running_workers(), [0]);

        drop(gate);
        wait_terminal(&busy);
        pool.collect_tasks();
        assert_eq!(pool.shutdown_unused_workers(), 1);
        assert_eq!(pool.state(), PoolState::Idle);
        pool.shutdown();
    }

    #[test]
    fn recently_used_workers_survive_the_timeout() {
        let mut pool = AsyncPool::new(1, Duration::from_secs(300));
        let task = TaskHandle::new(Quick(Counters::default()));
        pool.submit_task(&task).unwrap();
        wait_terminal(&task);
        pool.collect_tasks();
        assert_eq!(pool.shutdown_unused_workers(), 0);
        assert_eq!(pool.running_workers(), [0]);
        pool.shutdown();
    }

    #[test]
    fn start_hooks_see_every_worker() {
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let mut pool = AsyncPool::new(2, Duration::from_secs(300));
        let counters = Counters::default();

        let sink = Arc::clone(&seen_a);
        let a = pool.add_worker_start_hook(move |w| sink.lock().unwrap().push(w));
        assert!(seen_a.lock().unwrap().is_empty());

        let (_g1, t1) = gated(&counters);
        pool.submit_task(&t1).unwrap();
        let sink = Arc::clone(&seen_b);
        pool.add_worker_start_hook(move |w| sink.lock().unwrap().push(w));
        assert_eq!(*seen_b.lock().unwrap(), [0]);

        let (_g2, t2) = gated(&counters);
        assert_eq!(pool.submit_task(&t2).unwrap(), 1);
        assert_eq!(*seen_a.lock().unwrap(), [0, 1]);
        assert_eq!(*seen_b.lock().unwrap(), [0, 1]);

        assert!(pool.remove_worker_start_hook(a));
        assert!(!pool.remove_worker_start_hook(a));
        pool.shutdown();
    }

    #[test]
    fn crashed_tasks_do_not_take_the_worker_down() {
        let counters = Counters::default();
        let mut pool = AsyncPool::new(1, Duration::from_secs(300));
        let failing = TaskHandle::new(Failing(counters.clone()));
        let panicking = TaskHandle::new(Panicking);
        let after = TaskHandle::new(Quick(counters.clone()));
        for task in [&failing, &panicking, &after] {
            pool.submit_task(task).unwrap();
        }
        wait_terminal(&after);
        assert_eq!(failing.state(), TaskState::Crashed);
        assert_eq!(panicking.state(), TaskState::Crashed);
        assert_eq!(after.state(), TaskState::Completed);

        pool.collect_tasks();
        assert_eq!(counters.completed(), 1);
        assert_eq!(pool.tracked_tasks(), 0);
        assert_eq!(pool.backlog(0), 0);
        pool.shutdown();
    }

    #[test]
    fn increase_size_only_grows() {
        let mut pool = AsyncPool::new(0, Duration::from_secs(1));
        assert_eq!(pool.size(), 1);
        pool.increase_size(4);
        pool.increase_size(2);
        assert_eq!(pool.size(), 4);
    }
}
