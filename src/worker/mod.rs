//! Job bodies run by the tracker on the worker pool.
//!
//! - [`JobLauncher`]: what the tracker spawns for every scheduled job
//! - [`JobExecutor`]: launcher that runs the job's command line through a shell
//!
//! # Execution Flow
//!
//! 1. [`JobTracker::schedule`](crate::tracker::JobTracker::schedule) builds a [`LaunchSpec`]
//! 2. [`JobExecutor`] spawns `sh -c "<executable> <args>"` with the job environment
//! 3. Captures stdout/stderr and exit status into a [`LaunchResult`]
//!
//! Dropping the launch future kills the child process, which is how
//! cancellation reaches a running command.

pub mod executor;
pub mod launcher;

pub use executor::JobExecutor;
pub use launcher::{JobLauncher, LaunchResult, LaunchSpec};
