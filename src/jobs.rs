//! Background jobs.
//!
//! Work is submitted with a [`JobType`] and a [`JobPriority`]. Worker threads pick
//! jobs whose type matches their mask, always draining the high queue before the
//! normal one and the normal one before the low one. Results travel back through
//! a bounded [`RingQueue`] and completion callbacks run on the thread that calls
//! [`JobSystem::update`], so callbacks may touch state that is not `Send`.
//!
//! - RESOURCE_LOAD jobs run on a single dedicated worker so disk reads don't compete
//! - GPU_RESOURCE jobs run on worker 0 for multithreaded backends, otherwise on the
//!   owning thread inside `update`
//! - there is no cancellation; a started job runs to completion

use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};

use crate::{data_structures::ring_queue::RingQueue, error::JobError};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct JobType: u8 {
        const GENERAL = 0x02;
        const RESOURCE_LOAD = 0x04;
        const GPU_RESOURCE = 0x08;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

pub type JobId = u64;

type Payload = Box<dyn Any + Send>;
type Work = Box<dyn FnOnce() -> anyhow::Result<Payload> + Send>;
type Callback = Box<dyn FnOnce(anyhow::Result<Payload>)>;

struct Job {
    id: JobId,
    kind: JobType,
    work: Work,
}

struct JobResult {
    id: JobId,
    outcome: anyhow::Result<Payload>,
}

#[derive(Default)]
struct PriorityQueues {
    high: VecDeque<Job>,
    normal: VecDeque<Job>,
    low: VecDeque<Job>,
}

impl PriorityQueues {
    fn push(&mut self, priority: JobPriority, job: Job) {
        match priority {
            JobPriority::High => self.high.push_back(job),
            JobPriority::Normal => self.normal.push_back(job),
            JobPriority::Low => self.low.push_back(job),
        }
    }

    /// First job the mask accepts, highest priority first.
    fn pop_matching(&mut self, mask: JobType) -> Option<Job> {
        for queue in [&mut self.high, &mut self.normal, &mut self.low] {
            if let Some(pos) = queue.iter().position(|j| mask.intersects(j.kind)) {
                return queue.remove(pos);
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }
}

struct Shared {
    queues: Mutex<PriorityQueues>,
    available: Condvar,
    results: Mutex<RingQueue<JobResult>>,
    shutdown: AtomicBool,
}

impl Shared {
    fn push_result(&self, mut result: JobResult) {
        loop {
            match self.results.lock().enqueue(result) {
                Ok(()) => return,
                Err((_, back)) => result = back,
            }
            if self.shutdown.load(Ordering::Acquire) {
                log::warn!("dropping result of job {} during shutdown", result.id);
                return;
            }
            // the owner drains the queue in update()
            thread::yield_now();
        }
    }
}

pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    masks: Vec<JobType>,
    /// GPU jobs for single-threaded backends, run by `update`.
    local: PriorityQueues,
    callbacks: HashMap<JobId, Callback>,
    next_id: JobId,
    gpu_on_owner: bool,
}

impl JobSystem {
    pub fn new(
        worker_count: usize,
        result_capacity: usize,
        multithreaded_backend: bool,
    ) -> Result<Self, JobError> {
        if worker_count == 0 {
            return Err(JobError::NoWorkers);
        }
        let shared = Arc::new(Shared {
            queues: Mutex::new(PriorityQueues::default()),
            available: Condvar::new(),
            results: Mutex::new(RingQueue::new(result_capacity.max(1))),
            shutdown: AtomicBool::new(false),
        });
        let masks = worker_masks(worker_count, multithreaded_backend);
        let mut workers = Vec::with_capacity(worker_count);
        for (index, mask) in masks.iter().copied().enumerate() {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("job-worker-{index}"))
                .spawn(move || worker_loop(index, mask, shared))
                .map_err(JobError::Spawn)?;
            workers.push(handle);
        }
        log::debug!("job system started with {worker_count} workers: {masks:?}");
        Ok(Self {
            shared,
            workers,
            masks,
            local: PriorityQueues::default(),
            callbacks: HashMap::new(),
            next_id: 1,
            gpu_on_owner: !multithreaded_backend,
        })
    }

    pub fn worker_masks(&self) -> &[JobType] {
        &self.masks
    }

    /// Queues `work`. `on_complete` runs inside a later [`update`](Self::update)
    /// call with the job's result.
    pub fn submit<T, W, C>(
        &mut self,
        kind: JobType,
        priority: JobPriority,
        work: W,
        on_complete: C,
    ) -> Result<JobId, JobError>
    where
        T: Send + 'static,
        W: FnOnce() -> anyhow::Result<T> + Send + 'static,
        C: FnOnce(anyhow::Result<T>) + 'static,
    {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(JobError::ShutDown);
        }
        let id = self.next_id;
        self.next_id += 1;
        let job = Job {
            id,
            kind,
            work: Box::new(move || work().map(|v| Box::new(v) as Payload)),
        };
        self.callbacks.insert(
            id,
            Box::new(move |outcome: anyhow::Result<Payload>| {
                let typed = outcome.and_then(|payload| {
                    payload
                        .downcast::<T>()
                        .map(|v| *v)
                        .map_err(|_| anyhow::anyhow!("job {id} produced an unexpected type"))
                });
                on_complete(typed);
            }),
        );
        if kind.contains(JobType::GPU_RESOURCE) && self.gpu_on_owner {
            self.local.push(priority, job);
        } else {
            self.shared.queues.lock().push(priority, job);
            self.shared.available.notify_all();
        }
        Ok(id)
    }

    /// Jobs waiting to be started, on workers and locally.
    pub fn pending(&self) -> usize {
        self.shared.queues.lock().len() + self.local.len()
    }

    /// Jobs submitted whose callback has not run yet.
    pub fn in_flight(&self) -> usize {
        self.callbacks.len()
    }

    /// Runs local GPU jobs and dispatches every finished result to its callback.
    pub fn update(&mut self) {
        while let Some(job) = self.local.pop_matching(JobType::all()) {
            let outcome = (job.work)();
            self.dispatch(JobResult {
                id: job.id,
                outcome,
            });
        }
        loop {
            let next = self.shared.results.lock().dequeue();
            match next {
                Ok(result) => self.dispatch(result),
                Err(_) => break,
            }
        }
    }

    fn dispatch(&mut self, result: JobResult) {
        match self.callbacks.remove(&result.id) {
            Some(callback) => {
                if let Err(e) = &result.outcome {
                    log::error!("job {} failed: {e:#}", result.id);
                }
                callback(result.outcome)
            }
            None => log::warn!("no callback registered for job {}", result.id),
        }
    }

    /// Stops the workers after their current job and joins them. Queued jobs are dropped.
    pub fn shutdown(&mut self) {
        {
            // set under the queue lock so no worker sits between its check and its wait
            let _queues = self.shared.queues.lock();
            if self.shared.shutdown.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("a job worker panicked");
            }
        }
        let dropped = self.shared.queues.lock().len() + self.local.len();
        if dropped > 0 {
            log::warn!("{dropped} queued jobs dropped at shutdown");
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_masks(worker_count: usize, multithreaded_backend: bool) -> Vec<JobType> {
    let mut masks = vec![JobType::GENERAL; worker_count];
    if worker_count == 1 {
        masks[0] |= JobType::RESOURCE_LOAD;
        if multithreaded_backend {
            masks[0] |= JobType::GPU_RESOURCE;
        }
        return masks;
    }
    if multithreaded_backend {
        masks[0] |= JobType::GPU_RESOURCE;
    }
    masks[1] |= JobType::RESOURCE_LOAD;
    masks
}

fn worker_loop(index: usize, mask: JobType, shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queues = shared.queues.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    log::trace!("job worker {index} exiting");
                    return;
                }
                if let Some(job) = queues.pop_matching(mask) {
                    break job;
                }
                shared.available.wait(&mut queues);
            }
        };
        let outcome = (job.work)();
        shared.push_result(JobResult {
            id: job.id,
            outcome,
        });
    }
}
