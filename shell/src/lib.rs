//! Pipeline execution for a small interactive shell.
//!
//! A parsed [`types::Pipeline`] goes through [`eval::eval`], which forks one
//! process per stage, links neighbours with pipes, applies the pipeline's
//! redirections and then either waits for the job or reports its pids.

pub mod config;
pub mod eval;
pub mod job;
pub mod logging;
pub mod parser;
pub mod redirect;
pub mod spawn;
pub mod types;
