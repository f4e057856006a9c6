use crate::SimError;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::thread;

pub const PARALLEL_THRESHOLD: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workers {
    Serial,
    Fixed(usize),
    Available,
}

impl Workers {
    pub fn from_n_jobs(n_jobs: i64) -> Self {
        match n_jobs {
            n if n < 0 => Self::Available,
            0 => Self::Serial,
            n => Self::Fixed(n as usize),
        }
    }

    pub fn count(self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Fixed(n) => n.max(1),
            Self::Available => thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Calls `func(index, &mut items[index])` for every item.
pub fn for_each_indexed<T, F>(
    items: &mut [T],
    workers: Workers,
    threshold: usize,
    func: F,
) -> Result<(), SimError>
where
    T: Send,
    F: Fn(usize, &mut T) + Sync,
{
    let threads = workers.count().min(items.len());
    if threads <= 1 || items.len() <= threshold {
        for (idx, item) in items.iter_mut().enumerate() {
            func(idx, item);
        }
        return Ok(());
    }

    let chunk_len = items.len().div_ceil(threads);
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|idx| format!("percwalk-worker-{idx}"))
        .build()
        .map_err(|e| SimError::ThreadPool(e.to_string()))?;
    pool.install(|| {
        items
            .par_chunks_mut(chunk_len)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let offset = chunk_idx * chunk_len;
                for (k, item) in chunk.iter_mut().enumerate() {
                    func(offset + k, item);
                }
            });
    });
    Ok(())
}
