//! Task scheduling and outcome handling.
//!
//! This module owns how a set of built tasks is executed (sequentially or
//! under the bounded worker pool with per-task timeouts) and what happens to
//! each outcome afterwards (persistence, logging, progress events). CLI layers
//! call into this module and only deal with the resulting reports.

mod controller;
mod post_process;

pub(crate) use controller::Orchestrator;
