// src/dag/mod.rs

//! Workflow definition, validation and scheduling.
//!
//! - [`graph`] holds the validated dependency graph of tasks and groups.
//! - [`chain`] expands chains of stages into dependency edges.
//! - [`node`] defines tasks and groups.
//! - [`builder`] assembles a [`Workflow`] from tasks, groups and chains.
//! - [`state`] is the per-run state table.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run, and when dependents can be dispatched.
//! - [`scheduled`] and [`scheduler_step`] define what the scheduler hands
//!   back to its driver.

pub mod builder;
pub mod chain;
pub mod graph;
pub mod node;
pub mod scheduled;
pub mod scheduler;
pub mod scheduler_step;
pub mod state;
pub mod workflow;

/// Canonical vertex id type used throughout the crate.
pub type VertexId = String;

pub use builder::WorkflowBuilder;
pub use chain::{Edge, Stage, chain_edges};
pub use graph::{DependencyGraph, VertexKind};
pub use node::{GroupMembers, MemberFactory, TaskDefaults, TaskGroup, TaskNode, member_id};
pub use scheduled::ScheduledTask;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use state::RunStateTable;
pub use workflow::Workflow;
