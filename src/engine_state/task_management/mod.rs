//! # Task Management System
//!
//! This module provides the worker pool that runs chunk generation and meshing off the
//! main thread.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, which can spawn additional tasks
//! - `TaskChannel`: Communication channel between the main thread and one worker thread
//!
//! Each worker is a `std::thread` with its own pair of `mpsc` channels. Tasks are handed
//! out round-robin to workers that have a free slot; the rest wait in a FIFO queue.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send back results
//! 4. Results are processed on the main thread in `process_completed_tasks()`
//! 5. Results can spawn new tasks, which are published in turn
//!
//! ## Cancellation
//! Cancellation is coarse: `clear_queued_tasks()` drops every task that has not been
//! handed to a worker yet. Tasks already running always run to completion. The only
//! blocking calls are `drain()` and `shutdown()`.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(num_workers, context);
//! task_manager.publish_task(Box::new(MyTask::new(...)));
//!
//! // In the main loop:
//! task_manager.process_completed_tasks();
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use task::{Task, TaskContext, TaskResult};

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `result_receiver`: Receives task results from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread
///
/// The worker exits once `task_sender` is dropped and its current task is done.
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task + Send>>,
    result_receiver: Receiver<Box<dyn TaskResult + Send>>,
    num_tasks_in_flight: usize,
    worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
/// - `context`: Shared state passed to every task result
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task + Send>>,
    current_channel: usize,
    context: TaskContext,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 leaves everything else in `queued_tasks`, where
/// `clear_queued_tasks` can still drop it.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create
    /// * `context` - Shared state passed to task results
    ///
    /// # Panics
    /// Panics if the underlying thread creation fails.
    pub fn new(num_workers: usize, context: TaskContext) -> Self {
        info!(
            "Starting {} workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        let mut channels = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task + Send>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult + Send>>();

            let worker = thread::spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                worker,
            });
        }

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            context,
        }
    }

    /// The shared state passed to task results.
    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was successfully sent to the worker
    /// - `Err(task)` if the send failed (the worker is gone)
    fn try_send_task(
        &mut self,
        task: Box<dyn Task + Send>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task + Send>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// Round-robin starting from the channel after the last one used. Channels that
    /// have reached `MAX_TASKS_IN_FLIGHT` are skipped.
    fn find_available_channel(&self) -> Option<usize> {
        let len = self.channels.len();
        (0..len)
            .map(|offset| (self.current_channel + offset) % len)
            .find(|&index| self.channels[index].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately handed to a worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task + Send>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to workers until the queue is empty or every worker is busy.
    ///
    /// Tasks are processed in FIFO order. Call this once per frame.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Processes all completed task results from worker threads.
    ///
    /// Must be called on the main thread. Follow-up tasks are published right away.
    pub fn process_completed_tasks(&mut self) {
        let mut tasks_to_queue = Vec::new();
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight -= 1;
                tasks_to_queue.extend(result.handle_result(&self.context));
            }
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
    }

    /// Drops every task that has not been handed to a worker yet.
    ///
    /// # Returns
    /// The number of tasks dropped.
    pub fn clear_queued_tasks(&mut self) -> usize {
        let dropped = self.queued_tasks.len();
        self.queued_tasks.clear();
        if dropped > 0 {
            debug!("Dropped {} queued tasks", dropped);
        }
        dropped
    }

    /// Number of tasks waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether any task is queued or running.
    pub fn has_pending_work(&self) -> bool {
        !self.queued_tasks.is_empty()
            || self
                .channels
                .iter()
                .any(|channel| channel.num_tasks_in_flight > 0)
    }

    /// Blocks until every queued and running task, including the follow-up tasks they
    /// spawn, has completed and its result has been handled.
    pub fn drain(&mut self) {
        loop {
            self.process_queued_tasks();
            let Some(channel_idx) = self
                .channels
                .iter()
                .position(|channel| channel.num_tasks_in_flight > 0)
            else {
                if !self.queued_tasks.is_empty() {
                    error!(
                        "No worker left to run {} queued tasks; dropping them",
                        self.queued_tasks.len()
                    );
                    self.queued_tasks.clear();
                }
                return;
            };

            let channel = &mut self.channels[channel_idx];
            match channel.result_receiver.recv() {
                Ok(result) => {
                    channel.num_tasks_in_flight -= 1;
                    for task in result.handle_result(&self.context) {
                        self.publish_task(task);
                    }
                }
                Err(_) => {
                    error!("Worker {} stopped with tasks in flight", channel_idx);
                    channel.num_tasks_in_flight = 0;
                    self.channels.remove(channel_idx);
                    self.current_channel = 0;
                }
            }
        }
    }

    /// Drops queued tasks, waits for running ones and stops every worker.
    ///
    /// Results of the tasks still running are discarded.
    pub fn shutdown(&mut self) {
        self.clear_queued_tasks();
        for channel in self.channels.drain(..) {
            let TaskChannel {
                task_sender,
                result_receiver,
                worker,
                ..
            } = channel;
            drop(task_sender);
            if worker.join().is_err() {
                error!("A worker thread panicked");
            }
            drop(result_receiver);
        }
        self.current_channel = 0;
        info!("Task manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::Receiver;
    use std::sync::{Arc, Mutex};

    use crate::core::MtResource;
    use crate::engine_state::rendering::meshing::MeshManager;
    use crate::engine_state::voxels::generator::EmptyGenerator;
    use crate::engine_state::voxels::services::tests::services_with;
    use crate::engine_state::voxels::world::WorldGrid;

    fn context() -> TaskContext {
        TaskContext::new(
            MtResource::new(WorldGrid::new(1, 1, 0)),
            MtResource::new(MeshManager::new(4)),
            Arc::new(services_with(Arc::new(EmptyGenerator), None)),
        )
    }

    /// Counts itself, then spawns `children` more counting tasks.
    struct CountingTask {
        counter: Arc<AtomicUsize>,
        children: usize,
    }

    struct CountingResult {
        counter: Arc<AtomicUsize>,
        children: usize,
    }

    impl Task for CountingTask {
        fn process(&self) -> Box<dyn TaskResult + Send> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingResult {
                counter: Arc::clone(&self.counter),
                children: self.children,
            })
        }
    }

    impl TaskResult for CountingResult {
        fn handle_result(self: Box<Self>, _context: &TaskContext) -> Vec<Box<dyn Task + Send>> {
            (0..self.children)
                .map(|_| {
                    Box::new(CountingTask {
                        counter: Arc::clone(&self.counter),
                        children: 0,
                    }) as Box<dyn Task + Send>
                })
                .collect()
        }
    }

    /// Blocks its worker until the test releases it.
    struct GateTask {
        gate: Mutex<Receiver<()>>,
    }

    impl Task for GateTask {
        fn process(&self) -> Box<dyn TaskResult + Send> {
            let gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());
            let _ = gate.recv();
            Box::new(CountingResult {
                counter: Arc::new(AtomicUsize::new(0)),
                children: 0,
            })
        }
    }

    #[test]
    fn drain_runs_tasks_and_their_follow_ups() {
        let mut manager = TaskManager::new(3, context());
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            manager.publish_task(Box::new(CountingTask {
                counter: Arc::clone(&counter),
                children: 2,
            }));
        }

        manager.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 30);
        assert!(!manager.has_pending_work());
        manager.shutdown();
    }

    #[test]
    fn clearing_the_queue_drops_only_tasks_not_yet_started() {
        let mut manager = TaskManager::new(1, context());
        let (release, gate) = std::sync::mpsc::channel();
        assert!(manager.publish_task(Box::new(GateTask {
            gate: Mutex::new(gate),
        })));

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            assert!(!manager.publish_task(Box::new(CountingTask {
                counter: Arc::clone(&counter),
                children: 0,
            })));
        }
        assert_eq!(manager.queued_len(), 3);
        assert_eq!(manager.clear_queued_tasks(), 3);
        assert!(manager.has_pending_work());

        release.send(()).expect("gate task is waiting");
        manager.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!manager.has_pending_work());
        manager.shutdown();
    }

    #[test]
    fn shutdown_discards_queued_work() {
        let mut manager = TaskManager::new(2, context());
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            manager.publish_task(Box::new(CountingTask {
                counter: Arc::clone(&counter),
                children: 0,
            }));
        }
        manager.shutdown();
        assert!(counter.load(Ordering::SeqCst) <= 2);
        assert!(!manager.publish_task(Box::new(CountingTask {
            counter: Arc::clone(&counter),
            children: 0,
        })));
    }
}
