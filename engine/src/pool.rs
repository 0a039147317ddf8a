use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

/// Shared stop flag. Workers check it before claiming the next task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::Release); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }
}

/// A phase stopped early. Partial output is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub completed: usize,
    pub total: usize,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cancelled after {}/{} tasks", self.completed, self.total)
    }
}

impl std::error::Error for Cancelled {}

/// Split `0..len` into `parts` contiguous ranges whose sizes differ by at most one.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let base = len / parts;
    let extra = len % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for p in 0..parts {
        let size = base + usize::from(p < extra);
        out.push(start..start + size);
        start += size;
    }
    out
}

/// Fixed-size pool of scoped threads. Every call is a barrier: it returns only
/// after all of its workers have been joined.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    cancel: CancelToken,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1), cancel: CancelToken::new() }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workers(&self) -> usize { self.workers }

    fn check_cancelled(&self, completed: usize, total: usize) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled { completed, total }.into());
        }
        Ok(())
    }

    /// Static partition: one thread per contiguous block of `items`.
    /// Results come back in block order, whatever order the threads finish in.
    pub fn map_blocks<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> R + Sync,
    {
        let blocks = partition(items.len(), self.workers);
        self.check_cancelled(0, blocks.len())?;
        let f = &f;
        let joined: Vec<thread::Result<R>> = thread::scope(|s| {
            let handles: Vec<_> = blocks
                .iter()
                .map(|range| {
                    let block = &items[range.clone()];
                    s.spawn(move || f(block))
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut out = Vec::with_capacity(joined.len());
        for r in joined {
            out.push(r.map_err(|_| anyhow!("worker thread panicked"))?);
        }
        self.check_cancelled(out.len(), blocks.len())?;
        Ok(out)
    }

    /// Task queue: every key is queued once and claimed by exactly one worker,
    /// so no two workers ever insert the same key into the output map.
    pub fn map_keys<K, V, F>(&self, keys: Vec<K>, f: F) -> Result<HashMap<K, V>>
    where
        K: Copy + Eq + Hash + Send,
        V: Send,
        F: Fn(K) -> V + Sync,
    {
        let total = keys.len();
        let (tx, rx) = sync_channel::<K>(total.max(1));
        for k in keys {
            // Capacity covers every task and the receiver is alive, so this never blocks or fails.
            if tx.send(k).is_err() {
                return Err(anyhow!("task queue closed early"));
            }
        }
        drop(tx);

        let rx = Mutex::new(rx);
        let out: Mutex<HashMap<K, V>> = Mutex::new(HashMap::with_capacity(total));
        let (rx, out, f, cancel) = (&rx, &out, &f, &self.cancel);

        let panicked = thread::scope(|s| {
            let handles: Vec<_> = (0..self.workers)
                .map(|_| {
                    s.spawn(move || loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let next = rx.lock().recv();
                        let Ok(key) = next else { break };
                        let value = f(key);
                        out.lock().insert(key, value);
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).filter(|r| r.is_err()).count()
        });

        if panicked > 0 {
            return Err(anyhow!("{panicked} worker thread(s) panicked"));
        }
        let out = std::mem::take(&mut *out.lock());
        self.check_cancelled(out.len(), total)?;
        tracing::debug!(tasks = total, workers = self.workers, "task queue drained");
        Ok(out)
    }
}
