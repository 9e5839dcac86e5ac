//! Task queues for render node execution.
//!
//! Node `execute_frame` calls are submitted as boxed closures and drained by
//! either queue kind:
//!
//! | Queue | Execution |
//! |-------|-----------|
//! | [`ParallelTaskQueue`] | Scoped worker threads pulling tasks from a channel |
//! | [`SequentialTaskQueue`] | In submission order on the calling thread |
//!
//! Both block in [`TaskQueue::execute`] until every submitted task finished.
//! Tasks may borrow from the caller's stack: the worker scope is joined
//! before `execute` returns.

use std::sync::mpsc;

use parking_lot::Mutex;

/// A unit of work that may borrow data living for `'env`.
pub type Task<'env> = Box<dyn FnOnce() + Send + 'env>;

/// Scoped worker thread pool.
///
/// # Example
///
/// ```
/// use redlilium_renderer::task_queue::ThreadPool;
///
/// let pool = ThreadPool::new(4);
///
/// let mut results = vec![0u32; 4];
/// pool.scope(|s| {
///     for (i, slot) in results.iter_mut().enumerate() {
///         s.spawn(move || {
///             *slot = (i as u32) * 10;
///         });
///     }
/// });
/// assert_eq!(results, vec![0, 10, 20, 30]);
/// ```
#[derive(Debug)]
pub struct ThreadPool {
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a pool with the given number of worker threads.
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Creates a pool sized to the number of available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    /// Worker thread count.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Runs `f` with a scope whose spawned threads are joined on return.
    pub fn scope<'env, F>(&self, f: F)
    where
        F: for<'scope> FnOnce(&'scope std::thread::Scope<'scope, 'env>),
    {
        std::thread::scope(f);
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::default_threads()
    }
}

/// A queue of tasks executed together.
pub trait TaskQueue<'env> {
    /// Add a task.
    fn submit(&mut self, task: Task<'env>);

    /// Run every submitted task and wait for all of them.
    fn execute(&mut self);

    /// Number of tasks waiting for `execute`.
    fn len(&self) -> usize;

    /// Whether no task is waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Executes tasks on scoped worker threads.
pub struct ParallelTaskQueue<'pool, 'env> {
    pool: &'pool ThreadPool,
    tasks: Vec<Task<'env>>,
}

impl<'pool, 'env> ParallelTaskQueue<'pool, 'env> {
    /// Create a queue backed by `pool`.
    pub fn new(pool: &'pool ThreadPool) -> Self {
        Self {
            pool,
            tasks: Vec::new(),
        }
    }
}

impl<'env> TaskQueue<'env> for ParallelTaskQueue<'_, 'env> {
    fn submit(&mut self, task: Task<'env>) {
        self.tasks.push(task);
    }

    fn execute(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return;
        }
        let workers = self.pool.num_threads().min(tasks.len());
        log::trace!(
            "ParallelTaskQueue: {} tasks on {} workers",
            tasks.len(),
            workers
        );

        let (sender, receiver) = mpsc::channel::<Task<'env>>();
        for task in tasks {
            // The receiver is alive until the end of this function.
            let _ = sender.send(task);
        }
        drop(sender);
        let receiver = Mutex::new(receiver);

        self.pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|| loop {
                    let next = receiver.lock().recv();
                    match next {
                        Ok(task) => task(),
                        Err(_) => break,
                    }
                });
            }
        });
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Executes tasks in order on the calling thread.
#[derive(Default)]
pub struct SequentialTaskQueue<'env> {
    tasks: Vec<Task<'env>>,
}

impl SequentialTaskQueue<'_> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }
}

impl<'env> TaskQueue<'env> for SequentialTaskQueue<'env> {
    fn submit(&mut self, task: Task<'env>) {
        self.tasks.push(task);
    }

    fn execute(&mut self) {
        for task in std::mem::take(&mut self.tasks) {
            task();
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}
