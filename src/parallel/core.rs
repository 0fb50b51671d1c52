use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Progress callback: (completed, total, worker_id)
pub type ProgressFn<'a> = dyn Fn(usize, usize, usize) + Send + Sync + 'a;

/// Bounded worker pool over crossbeam channels
///
/// Every work item is tagged with its dispatch index; results are re-sorted
/// by that index before they are returned, so callers always see results in
/// input order no matter which worker finished first.
pub struct ParallelExecutor {
    max_workers: usize,
    buffer_size: usize,
}

/// Context for worker threads to avoid too many function parameters
struct WorkerContext<'a, T, R, F> {
    worker_id: usize,
    work_rx: Receiver<(usize, T)>,
    result_tx: Sender<(usize, R)>,
    progress_counter: Arc<AtomicUsize>,
    total_items: usize,
    processor: &'a F,
    progress: Option<&'a ProgressFn<'a>>,
}

impl ParallelExecutor {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            buffer_size: max_workers * 2,
        }
    }

    pub fn execute<T, R, F>(&self, work_items: Vec<T>, processor: F, progress: Option<&ProgressFn>) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(usize, &T, usize) -> R + Send + Sync, // (index, item, worker_id)
    {
        if work_items.is_empty() {
            return Ok(Vec::new());
        }

        let actual_workers = std::cmp::min(self.max_workers, work_items.len());
        let (work_tx, work_rx) = bounded::<(usize, T)>(self.buffer_size);
        let (result_tx, result_rx) = bounded::<(usize, R)>(self.buffer_size * 2);

        let progress_counter = Arc::new(AtomicUsize::new(0));
        let total_items = work_items.len();
        let processor = &processor;

        let mut indexed = crossbeam::thread::scope(|s| {
            for worker_id in 0..actual_workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    progress_counter: progress_counter.clone(),
                    total_items,
                    processor,
                    progress,
                };
                s.spawn(move |_| worker_thread(ctx));
            }

            // Producer: dispatch in input order
            s.spawn(move |_| {
                for item in work_items.into_iter().enumerate() {
                    if work_tx.send(item).is_err() {
                        break; // Workers dropped
                    }
                }
            });

            // Drop our copies so the collector sees the channel close
            drop(work_rx);
            drop(result_tx);

            collect_results(result_rx, total_items)
        })
        .map_err(|_| anyhow::anyhow!("Thread panic occurred during parallel execution"))?;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }
}

fn worker_thread<T, R, F>(ctx: WorkerContext<'_, T, R, F>)
where
    F: Fn(usize, &T, usize) -> R,
{
    while let Ok((index, item)) = ctx.work_rx.recv() {
        let result = (ctx.processor)(index, &item, ctx.worker_id);

        if ctx.result_tx.send((index, result)).is_err() {
            break; // Receiver dropped
        }

        let current = ctx.progress_counter.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(report) = ctx.progress {
            report(current, ctx.total_items, ctx.worker_id);
        }
    }
}

fn collect_results<R>(result_rx: Receiver<(usize, R)>, total_items: usize) -> Vec<(usize, R)> {
    let mut results = Vec::with_capacity(total_items);
    while let Ok(result) = result_rx.recv() {
        results.push(result);
        if results.len() >= total_items {
            break;
        }
    }
    results
}

/// Sequential execution strategy for small workloads and `workers = 1`
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn execute<T, R, F>(work_items: Vec<T>, processor: F, progress: Option<&ProgressFn>) -> Vec<R>
    where
        F: Fn(usize, &T, usize) -> R,
    {
        let total_items = work_items.len();
        work_items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let result = processor(index, item, 0);
                if let Some(report) = progress {
                    report(index + 1, total_items, 0);
                }
                result
            })
            .collect()
    }
}

/// Execution strategy enum for choosing between parallel and sequential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    pub fn execute<T, R, F>(&self, work_items: Vec<T>, processor: F, progress: Option<&ProgressFn>) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(usize, &T, usize) -> R + Send + Sync,
    {
        match self {
            ExecutionStrategy::Sequential => Ok(SequentialExecutor::execute(work_items, processor, progress)),
            ExecutionStrategy::Parallel { workers } => {
                ParallelExecutor::new(*workers).execute(work_items, processor, progress)
            }
        }
    }

    /// Threshold decision between sequential and parallel execution
    ///
    /// ```text
    /// workers <= 1 or items < min_items_for_parallel  → Sequential
    /// otherwise                                       → Parallel { workers }
    /// ```
    pub fn auto(work_items_count: usize, min_items_for_parallel: usize, optimal_workers: usize) -> Self {
        if optimal_workers > 1 && work_items_count >= min_items_for_parallel {
            ExecutionStrategy::Parallel {
                workers: optimal_workers,
            }
        } else {
            ExecutionStrategy::Sequential
        }
    }

    /// Worker count from configuration and available cores
    ///
    /// `configured = 0` means "auto": `thread_percentage` percent of the
    /// detected cores. A non-zero value is used as given. The result is at
    /// least 1.
    pub fn calculate_optimal_workers(configured: usize, thread_percentage: u8) -> usize {
        if configured > 0 {
            return configured;
        }
        let cpu_cores = num_cpus::get();
        std::cmp::max(1, cpu_cores * thread_percentage as usize / 100)
    }
}
