// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! WorkerPool: a dynamic set of executor threads, each running its own
//! `ContentProcessor` and `Store` connection. No shared mutable state
//! between executors — work and results cross the boundary as owned
//! messages over `std::sync::mpsc`.

pub mod message;

use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::extract::LlmTransport;
use crate::pipeline::ContentProcessor;

pub use message::{FromExecutor, ToExecutor};

/// Builds a fresh `ContentProcessor` for a new or replacement executor
/// thread. Boxed so `WorkerPool` doesn't need to be generic over a
/// particular `Store`/`Extractor` construction path.
pub type ProcessorFactory<T> = Arc<dyn Fn() -> ContentProcessor<T> + Send + Sync>;

struct ExecutorHandle {
    id: usize,
    to_executor: Sender<ToExecutor>,
    join: Option<JoinHandle<()>>,
    busy: bool,
}

/// Owns the executor threads. `assign`/`results`/`terminate` are the only
/// entry points the BatchEngine main loop uses.
pub struct WorkerPool<T: LlmTransport + 'static> {
    executors: Vec<ExecutorHandle>,
    from_executor_tx: Sender<FromExecutor>,
    from_executor_rx: Receiver<FromExecutor>,
    factory: ProcessorFactory<T>,
    next_id: usize,
}

impl<T: LlmTransport + 'static> WorkerPool<T> {
    pub fn new(initial_size: usize, factory: ProcessorFactory<T>) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut pool = Self {
            executors: Vec::new(),
            from_executor_tx: tx,
            from_executor_rx: rx,
            factory,
            next_id: 0,
        };
        for _ in 0..initial_size {
            pool.spawn_one();
        }
        pool
    }

    pub fn size(&self) -> usize {
        self.executors.len()
    }

    pub fn idle_count(&self) -> usize {
        self.executors.iter().filter(|e| !e.busy).count()
    }

    /// Thread names assigned to the current executors, for diagnostics.
    pub fn executor_ids(&self) -> Vec<usize> {
        self.executors.iter().map(|e| e.id).collect()
    }

    fn spawn_one(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let (to_tx, to_rx) = mpsc::channel();
        let from_tx = self.from_executor_tx.clone();
        let processor = (self.factory)();

        let join = std::thread::Builder::new()
            .name(format!("ingest-executor-{id}"))
            .spawn(move || run_executor(processor, to_rx, from_tx))
            .expect("failed to spawn executor thread");

        self.executors.push(ExecutorHandle {
            id,
            to_executor: to_tx,
            join: Some(join),
            busy: false,
        });
    }

    /// Grow the pool to `target` executors by spawning idle ones.
    pub fn grow_to(&mut self, target: usize) {
        while self.executors.len() < target {
            self.spawn_one();
        }
    }

    /// Shrink the pool to `target` by terminating idle executors first.
    /// Busy executors are left to finish their current item.
    pub fn shrink_to(&mut self, target: usize) {
        let mut removable: Vec<usize> = self
            .executors
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.busy)
            .map(|(i, _)| i)
            .collect();

        while self.executors.len() > target {
            let Some(idx) = removable.pop() else { break };
            let mut handle = self.executors.remove(idx);
            let _ = handle.to_executor.send(ToExecutor::Shutdown);
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
    }

    /// Dispatch `task` to the first idle executor, if any. Returns `false`
    /// if the pool has no idle capacity right now.
    pub fn assign(&mut self, task: ToExecutor) -> bool {
        if let Some(handle) = self.executors.iter_mut().find(|e| !e.busy) {
            handle.busy = true;
            let _ = handle.to_executor.send(task);
            true
        } else {
            false
        }
    }

    /// Drain any outstanding results without blocking.
    pub fn try_recv(&mut self) -> Option<FromExecutor> {
        let result = self.from_executor_rx.try_recv().ok();
        if let Some(msg) = &result {
            self.mark_idle_if_terminal(msg);
        }
        result
    }

    /// Block up to `timeout` for the next result, matching the BatchEngine
    /// main loop's 100 ms suspension point.
    pub fn recv_timeout(&mut self, timeout: std::time::Duration) -> Option<FromExecutor> {
        let result = self.from_executor_rx.recv_timeout(timeout).ok();
        if let Some(msg) = &result {
            self.mark_idle_if_terminal(msg);
        }
        result
    }

    /// Messages carry `item_id`, not executor id; since dispatch always
    /// hands work to the first idle executor, the first busy executor in
    /// iteration order is always the one whose task just finished.
    fn mark_idle_if_terminal(&mut self, msg: &FromExecutor) {
        if matches!(msg, FromExecutor::Completed { .. } | FromExecutor::Failed { .. }) {
            if let Some(handle) = self.executors.iter_mut().find(|e| e.busy) {
                handle.busy = false;
            }
        }
    }

    pub fn cancel_all(&mut self) {
        for handle in &self.executors {
            let _ = handle.to_executor.send(ToExecutor::Cancel);
        }
    }

    pub fn terminate_all(&mut self) {
        for handle in &mut self.executors {
            let _ = handle.to_executor.send(ToExecutor::Shutdown);
        }
        for handle in &mut self.executors {
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
        self.executors.clear();
    }
}

impl<T: LlmTransport + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

/// The executor's run loop. Wraps each task in `catch_unwind` so a
/// panicking extraction surfaces as a `Failed` message rather than
/// poisoning the whole thread silently, matching §4.7's crash-recovery
/// requirement (the pool itself is responsible for respawning after
/// `JoinHandle::join()` observes the thread having exited).
fn run_executor<T: LlmTransport + 'static>(
    mut processor: ContentProcessor<T>,
    rx: Receiver<ToExecutor>,
    tx: Sender<FromExecutor>,
) {
    let cancel = Arc::new(AtomicBool::new(false));

    while let Ok(msg) = rx.recv() {
        match msg {
            ToExecutor::Shutdown => break,
            ToExecutor::Cancel => {
                cancel.store(true, Ordering::SeqCst);
            }
            ToExecutor::Task { item_id, body, kind, options } => {
                let _ = tx.send(FromExecutor::Started { item_id: item_id.clone() });

                let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                    processor.process(body, kind, &options)
                }));

                let message = match outcome {
                    Ok(result) if result.success => FromExecutor::Completed {
                        item_id: item_id.clone(),
                        content_id: result.content_id,
                        chunks: result.chunks,
                        entity_ids: result.entity_ids,
                    },
                    Ok(result) => FromExecutor::Failed {
                        item_id: item_id.clone(),
                        error: result.error.unwrap_or_else(|| "unknown processing failure".to_string()),
                    },
                    Err(panic_payload) => FromExecutor::Failed {
                        item_id: item_id.clone(),
                        error: panic_message(panic_payload),
                    },
                };

                let _ = tx.send(message);
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("executor panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("executor panicked: {s}")
    } else {
        "executor panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extractor, ExtractOptions};
    use crate::extract::llm::MockLlmTransport;
    use crate::pipeline::{IngestInput, ProcessOptions};
    use crate::store::Store;

    fn factory() -> ProcessorFactory<MockLlmTransport> {
        Arc::new(|| {
            let store = Store::open_in_memory().unwrap();
            let extractor = Extractor::new(None, ExtractOptions::default());
            ContentProcessor::new(store, extractor)
        })
    }

    #[test]
    fn test_pool_processes_a_task() {
        let mut pool = WorkerPool::new(1, factory());
        assert_eq!(pool.idle_count(), 1);

        let assigned = pool.assign(ToExecutor::Task {
            item_id: "item-1".to_string(),
            body: IngestInput::Text("Acme Corp was founded on 2020-01-01.".to_string()),
            kind: None,
            options: Box::new(ProcessOptions::default()),
        });
        assert!(assigned);

        let started = pool.recv_timeout(std::time::Duration::from_secs(2));
        assert!(matches!(started, Some(FromExecutor::Started { .. })));

        let completed = pool.recv_timeout(std::time::Duration::from_secs(2));
        assert!(matches!(completed, Some(FromExecutor::Completed { .. })));
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_pool_grow_and_shrink() {
        let mut pool = WorkerPool::new(1, factory());
        pool.grow_to(3);
        assert_eq!(pool.size(), 3);
        pool.shrink_to(1);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_assign_fails_when_no_idle_executor() {
        let mut pool = WorkerPool::new(1, factory());
        let first = pool.assign(ToExecutor::Task {
            item_id: "item-1".to_string(),
            body: IngestInput::Text("x".to_string()),
            kind: None,
            options: Box::new(ProcessOptions::default()),
        });
        assert!(first);
        let second = pool.assign(ToExecutor::Task {
            item_id: "item-2".to_string(),
            body: IngestInput::Text("y".to_string()),
            kind: None,
            options: Box::new(ProcessOptions::default()),
        });
        assert!(!second);
    }
}
