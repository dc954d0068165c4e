// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! BatchEngine: priority queue, adaptive concurrency, progress events, and
//! partial-failure handling over a [`WorkerPool`].

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::extract::LlmTransport;
use crate::pipeline::{IngestInput, ProcessOptions};
use crate::pool::{FromExecutor, ProcessorFactory, ToExecutor, WorkerPool};
use crate::resource::ResourceMonitor;
use crate::store::{BatchItem, BatchItemBody, JobKind, JobState, ProcessingJob};

/// Per-batch tuning, all defaulted per §4.9.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_concurrency: usize,
    pub continue_on_error: bool,
    pub prioritize_items: bool,
    pub dynamic_concurrency: bool,
    pub worker_memory_limit_mb: u64,
    pub process: ProcessOptions,
}

impl BatchOptions {
    pub fn with_cores(cores: usize) -> Self {
        Self {
            max_concurrency: cores.saturating_sub(1).max(1),
            continue_on_error: true,
            prioritize_items: true,
            dynamic_concurrency: true,
            worker_memory_limit_mb: 512,
            process: ProcessOptions::default(),
        }
    }
}

/// Wraps a [`BatchItem`] for the priority queue: higher `priority` pops
/// first; ties broken by insertion order (lower `seq` first) to keep FIFO
/// fairness among equal-priority items.
struct PrioritizedItem {
    item: BatchItem,
    seq: u64,
}

impl PartialEq for PrioritizedItem {
    fn eq(&self, other: &Self) -> bool {
        self.item.priority == other.item.priority && self.seq == other.seq
    }
}
impl Eq for PrioritizedItem {}

impl PartialOrd for PrioritizedItem {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedItem {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.item
            .priority
            .cmp(&other.item.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One fan-out event. Published through the [`EventBus`].
#[derive(Debug, Clone)]
pub enum BatchEvent {
    JobStarted { job_id: String },
    JobProgress { job_id: String, percent: u8 },
    JobCompleted { job_id: String },
    JobFailed { job_id: String, error: String },
    JobCanceled { job_id: String },
    Resources { cpu_percent: f64, free_memory_mb: u64 },
    ItemStarted { job_id: String, item_id: String },
    ItemCompleted { job_id: String, item_id: String, content_id: String },
    ItemFailed { job_id: String, item_id: String, error: String },
    EntityCreated { job_id: String, entity_id: String },
}

/// Synchronous in-process publisher with bounded per-subscriber queues. A
/// slow subscriber drops events on `Full` rather than stalling the batch.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<SyncSender<BatchEvent>>,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self { subscribers: Vec::new() }
    }

    /// Register a new subscriber, returning the receiving end.
    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<BatchEvent> {
        let (tx, rx) = sync_channel(Self::DEFAULT_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&self, event: BatchEvent) {
        for sub in &self.subscribers {
            match sub.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    // Slow subscriber; drop rather than block the batch.
                }
            }
        }
    }
}

/// Aggregate outcome of [`BatchEngine::run`].
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub job: ProcessingJob,
    pub item_results: HashMap<String, ItemOutcome>,
}

#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Completed { content_id: String, entity_ids: Vec<String> },
    Failed { error: String },
    NotStarted,
}

/// Owns the `WorkerPool`, priority queue, and `ProcessingJob` state for one
/// batch run.
pub struct BatchEngine<T: LlmTransport + 'static> {
    pool: WorkerPool<T>,
    monitor: ResourceMonitor,
    events: EventBus,
    cancel: Arc<AtomicBool>,
}

impl<T: LlmTransport + 'static> BatchEngine<T> {
    pub fn new(factory: ProcessorFactory<T>, opts: &BatchOptions) -> Self {
        Self {
            pool: WorkerPool::new(opts.max_concurrency, factory),
            monitor: ResourceMonitor::new(),
            events: EventBus::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    /// Shared flag a caller can set (from another thread) to cancel the
    /// batch cooperatively.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn run(&mut self, items: Vec<BatchItem>, opts: &BatchOptions) -> BatchResult {
        let job_id = crate::store::new_id();
        let started_at = Utc::now();
        let items_total = items.len();

        let mut job = ProcessingJob {
            job_id: job_id.clone(),
            kind: JobKind::Batch,
            state: JobState::Processing,
            progress: 0,
            started_at,
            ended_at: None,
            items_total,
            items_successful: 0,
            items_failed: 0,
            error_summary: None,
        };
        self.events.publish(BatchEvent::JobStarted { job_id: job_id.clone() });

        let mut queue = BinaryHeap::new();
        let ordered = if opts.prioritize_items {
            let mut v = items;
            v.sort_by(|a, b| b.priority.cmp(&a.priority));
            v
        } else {
            items
        };
        for (seq, item) in ordered.into_iter().enumerate() {
            queue.push(PrioritizedItem { item, seq: seq as u64 });
        }

        let mut results: HashMap<String, ItemOutcome> = HashMap::new();
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut created_entities: HashSet<String> = HashSet::new();
        let mut processed_count = 0usize;
        let mut hard_failure = false;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                for item in queue.drain() {
                    results.insert(item.item.id.clone(), ItemOutcome::NotStarted);
                }
                self.pool.cancel_all();
                self.pool.terminate_all();
                job.state = JobState::Canceled;
                job.ended_at = Some(Utc::now());
                self.events.publish(BatchEvent::JobCanceled { job_id: job_id.clone() });
                return BatchResult { job, item_results: results };
            }

            if queue.is_empty() && in_flight.is_empty() {
                break;
            }

            if opts.dynamic_concurrency && self.monitor.should_resample() {
                let snapshot = self.monitor.sample();
                self.events.publish(BatchEvent::Resources {
                    cpu_percent: snapshot.cpu_percent,
                    free_memory_mb: snapshot.free_memory_mb,
                });
                let target = self.monitor.advise(&snapshot, opts.max_concurrency, opts.worker_memory_limit_mb);
                if target > self.pool.size() {
                    self.pool.grow_to(target);
                } else if target < self.pool.size() {
                    self.pool.shrink_to(target);
                }
            }

            while self.pool.idle_count() > 0 {
                let Some(next) = queue.pop() else { break };
                let item_id = next.item.id.clone();
                let body = to_ingest_input(next.item.body);
                let mut process_opts = opts.process.clone();

                let assigned = self.pool.assign(ToExecutor::Task {
                    item_id: item_id.clone(),
                    body,
                    kind: next.item.kind,
                    options: Box::new(std::mem::take(&mut process_opts)),
                });
                if assigned {
                    in_flight.insert(item_id);
                } else {
                    queue.push(next);
                    break;
                }
            }

            if let Some(msg) = self.pool.recv_timeout(Duration::from_millis(100)) {
                match msg {
                    FromExecutor::Started { item_id } => {
                        self.events.publish(BatchEvent::ItemStarted { job_id: job_id.clone(), item_id });
                    }
                    FromExecutor::Progress { .. } | FromExecutor::Log { .. } => {}
                    FromExecutor::Completed { item_id, content_id, chunks: _, entity_ids } => {
                        in_flight.remove(&item_id);
                        processed_count += 1;
                        job.items_successful += 1;
                        for entity_id in &entity_ids {
                            if created_entities.insert(entity_id.clone()) {
                                self.events.publish(BatchEvent::EntityCreated {
                                    job_id: job_id.clone(),
                                    entity_id: entity_id.clone(),
                                });
                            }
                        }
                        self.events.publish(BatchEvent::ItemCompleted {
                            job_id: job_id.clone(),
                            item_id: item_id.clone(),
                            content_id: content_id.clone(),
                        });
                        results.insert(item_id, ItemOutcome::Completed { content_id, entity_ids });
                    }
                    FromExecutor::Failed { item_id, error } => {
                        in_flight.remove(&item_id);
                        processed_count += 1;
                        job.items_failed += 1;
                        self.events.publish(BatchEvent::ItemFailed {
                            job_id: job_id.clone(),
                            item_id: item_id.clone(),
                            error: error.clone(),
                        });
                        results.insert(item_id, ItemOutcome::Failed { error });
                        if !opts.continue_on_error {
                            hard_failure = true;
                        }
                    }
                }

                job.progress = ((processed_count as f64 / items_total.max(1) as f64) * 100.0) as u8;
                self.events.publish(BatchEvent::JobProgress { job_id: job_id.clone(), percent: job.progress });
            }

            if hard_failure {
                for item in queue.drain() {
                    results.insert(item.item.id.clone(), ItemOutcome::NotStarted);
                }
                break;
            }
        }

        job.ended_at = Some(Utc::now());
        if hard_failure {
            job.state = JobState::Failed;
            job.error_summary = Some(format!("{} item(s) failed with continue_on_error=false", job.items_failed));
            self.events.publish(BatchEvent::JobFailed { job_id: job_id.clone(), error: job.error_summary.clone().unwrap() });
        } else {
            job.state = JobState::Completed;
            self.events.publish(BatchEvent::JobCompleted { job_id: job_id.clone() });
        }

        BatchResult { job, item_results: results }
    }
}

fn to_ingest_input(body: BatchItemBody) -> IngestInput {
    match body {
        BatchItemBody::Text(s) => IngestInput::Text(s),
        BatchItemBody::Bytes(b) => IngestInput::Bytes(b),
        BatchItemBody::Path(p) => IngestInput::Path(p),
    }
}
