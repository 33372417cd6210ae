// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`action`] defines the [`TaskAction`] trait every task vertex carries.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `TokioExecutorBackend` the runtime uses in production, and which tests
//!   can replace with a fake implementation.
//! - [`task_runner`] runs one scheduled task: attempts, timeouts, retries,
//!   cancellation, and reporting the outcome back to the runtime.

pub mod action;
pub mod backend;
pub mod task_runner;

pub use action::{ActionContext, BoxFuture, FnAction, TaskAction, action_fn};
pub use backend::{ExecutorBackend, TokioExecutorBackend};
