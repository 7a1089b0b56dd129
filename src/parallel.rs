//! Parallel processing configuration
//!
//! Yearly ALT blocks are independent and run on Rayon's global thread pool.
//! This module configures that pool.

use crate::errors::{FtuError, Result};
use rayon::ThreadPoolBuilder;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Use all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Set up the global Rayon thread pool.
    ///
    /// Without an explicit thread count Rayon's default pool is left in place.
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(0) => Err(FtuError::ThreadPoolError(
                "thread count must be positive".to_string(),
            )),
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build_global()
                    .map_err(|e| {
                        FtuError::ThreadPoolError(format!(
                            "Failed to initialize thread pool with {} threads: {}",
                            num_threads, e
                        ))
                    })?;
                log::info!("Configured parallel processing with {} threads", num_threads);
                Ok(())
            }
            None => {
                log::debug!(
                    "Using default thread pool ({} threads)",
                    rayon::current_num_threads()
                );
                Ok(())
            }
        }
    }

    /// Number of threads in the current pool
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(ParallelConfig::default().num_threads, None);
        assert_eq!(ParallelConfig::with_threads(4).num_threads, Some(4));
        assert!(ParallelConfig::all_cores().num_threads.unwrap() > 0);
        assert!(ParallelConfig::new(None).current_threads() > 0);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(matches!(
            ParallelConfig::with_threads(0).setup_global_pool(),
            Err(FtuError::ThreadPoolError(_))
        ));
    }
}
