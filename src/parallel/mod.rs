//! Generic parallel execution framework
//!
//! The parallel module only manages system resources and execution strategy:
//! worker counts, crossbeam channels and result ordering. It does not know
//! what a work item is; the pipeline decides how many files justify a pool.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   Client        │    │   Parallel       │    │   System        │
//! │   (Pipeline)    │───▶│   Module         │───▶│   Resources     │
//! │                 │    │                  │    │                 │
//! │ • File counts   │    │ • CPU cores      │    │ • Hardware      │
//! │ • Per-file work │    │ • Thread mgmt    │    │ • OS limits     │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use fileintel::parallel::ExecutionStrategy;
//!
//! // 0 = auto: 75% of the detected cores
//! let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
//! let strategy = ExecutionStrategy::auto(100, 16, workers);
//!
//! let doubled = strategy.execute(vec![1, 2, 3], |_, x, _| x * 2, None).unwrap();
//! assert_eq!(doubled, vec![2, 4, 6]);
//! ```

pub mod core;

pub use self::core::{ExecutionStrategy, ParallelExecutor, ProgressFn, SequentialExecutor};
