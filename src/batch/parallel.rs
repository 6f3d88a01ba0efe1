//! Parallel execution of per-file extraction jobs.
//!
//! Every job owns its own `Recording`, so jobs share nothing but the read-only
//! extractor. Results come back in input order.

use crate::{FeatureError, FeatureResult};
use rayon::prelude::*;

/// Runs `job` over `items` on a rayon pool.
///
/// # Arguments
/// * `items` - Inputs, one per job
/// * `thread_count` - Number of threads to use (None for rayon's global pool)
/// * `job` - Work applied to each item
///
/// # Returns
/// One result per item, in input order, or an error if the pool cannot be built
pub(crate) fn process_parallel<T, R, F>(
    items: &[T],
    thread_count: Option<usize>,
    job: F,
) -> FeatureResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    let run = || items.par_iter().map(&job).collect::<Vec<_>>();

    match thread_count {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| {
                    FeatureError::InvalidParameter(format!("Thread pool creation failed: {e}"))
                })?;
            Ok(pool.install(run))
        }
        None => Ok(run()),
    }
}
