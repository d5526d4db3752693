//! Query execution and result normalization.
//!
//! Submissions are executed out of process (see [`executor`]) and their raw
//! outcomes reduced to comparable values (see [`outcome`]).

pub mod executor;
mod mock;
pub mod outcome;
pub mod worker;

pub use executor::{IsolatedExecutor, QueryRunner, WorkerCommand};
pub use mock::MockQueryRunner;
pub use outcome::{normalize, NormalizedOutcome, QueryOutcome};
pub use worker::{execute_local, run_worker, WorkerReply, WORKER_SUBCOMMAND};
