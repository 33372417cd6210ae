// src/dag/scheduler.rs

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::VertexId;
use crate::dag::Workflow;
use crate::dag::scheduled::ScheduledTask;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state::RunStateTable;
use crate::engine::{RunOptions, TaskOutcome};
use crate::errors::ActionError;
use crate::report::RunReport;
use crate::types::VertexState;

/// Scheduler holds the immutable workflow plus the mutable state of one run.
///
/// It is responsible for:
/// - promoting `Pending` tasks whose upstreams are satisfied to `Queued`
/// - dispatching `Queued` tasks (→ `Running`) while concurrency slots are free
/// - recording completions and blocking dependents of failed tasks
/// - sweeping unstarted tasks to `Skipped` on cancellation
///
/// It performs no IO; the engine feeds it events and executes what it hands
/// back. Being the sole owner of the [`RunStateTable`], it is the only place
/// any state transition happens.
#[derive(Debug)]
pub struct Scheduler {
    workflow: Arc<Workflow>,
    table: RunStateTable,
    /// `Queued` tasks in promotion order.
    queue: VecDeque<VertexId>,
    running: usize,
    max_concurrency: usize,
    run_id: u64,
    cancelled: bool,
}

impl Scheduler {
    pub fn new(workflow: Arc<Workflow>, options: &RunOptions, run_id: u64) -> Self {
        let table = RunStateTable::new(workflow.graph());
        Self {
            workflow,
            table,
            queue: VecDeque::new(),
            running: 0,
            max_concurrency: options.max_concurrency.max(1),
            run_id,
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    pub fn table(&self) -> &RunStateTable {
        &self.table
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Every task is terminal.
    pub fn is_finished(&self) -> bool {
        self.table.all_terminal()
    }

    pub fn running_count(&self) -> usize {
        self.running
    }

    /// `Queued` tasks waiting for a slot, in dispatch order.
    pub fn queued(&self) -> Vec<&str> {
        self.queue.iter().map(String::as_str).collect()
    }

    /// Effective state of any vertex (groups aggregated).
    pub fn state_of(&self, id: &str) -> Option<VertexState> {
        self.table.effective_state(self.workflow.graph(), id)
    }

    /// Whether every upstream of `id` is currently satisfied.
    ///
    /// Returns `None` if the vertex is unknown.
    pub fn deps_satisfied(&self, id: &str) -> Option<bool> {
        let graph = self.workflow.graph();
        if !graph.contains(id) {
            return None;
        }
        Some(
            graph
                .upstreams_of(id)
                .iter()
                .all(|up| self.table.is_satisfied(graph, up)),
        )
    }

    /// Start the run: dispatch everything that is ready.
    pub fn step_start(&mut self) -> SchedulerStep {
        info!(
            run_id = self.run_id,
            workflow = %self.workflow.name(),
            vertices = self.workflow.graph().len(),
            max_concurrency = self.max_concurrency,
            "scheduler: starting run"
        );
        let newly_scheduled = self.advance();
        SchedulerStep {
            newly_scheduled,
            run_just_finished: self.is_finished(),
            ..SchedulerStep::default()
        }
    }

    /// Record the outcome of a dispatched task and dispatch whatever that
    /// unblocked.
    pub fn step_completion(
        &mut self,
        task: &str,
        outcome: TaskOutcome,
        attempts: u32,
    ) -> SchedulerStep {
        match self.table.state_of(task) {
            Some(VertexState::Running) => {}
            Some(state) => {
                warn!(
                    task = %task,
                    run_id = self.run_id,
                    state = %state,
                    "completion for task that is not running; ignoring"
                );
                return SchedulerStep::default();
            }
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
                return SchedulerStep::default();
            }
        }

        self.running = self.running.saturating_sub(1);
        self.table.record_attempts(task, attempts);

        let mut newly_failed = Vec::new();
        match outcome {
            TaskOutcome::Success => {
                self.table.transition(task, VertexState::Success);
                info!(task = %task, run_id = self.run_id, attempts, "task succeeded");
            }
            TaskOutcome::Failed(error) => {
                newly_failed = self.fail(task, error);
            }
        }

        let newly_scheduled = self.advance();
        let run_just_finished = self.is_finished();
        if run_just_finished {
            info!(run_id = self.run_id, "scheduler: all tasks terminal");
        }

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            newly_skipped: Vec::new(),
            run_just_finished,
        }
    }

    /// Cancel the run: nothing new is dispatched, every `Pending`/`Queued`
    /// task becomes `Skipped`. `Running` tasks are left to report their own
    /// outcome.
    pub fn step_cancel(&mut self) -> SchedulerStep {
        if self.cancelled {
            return SchedulerStep {
                run_just_finished: self.is_finished(),
                ..SchedulerStep::default()
            };
        }
        self.cancelled = true;
        self.queue.clear();
        let newly_skipped = self.table.skip_unstarted();

        warn!(
            run_id = self.run_id,
            skipped = newly_skipped.len(),
            running = self.running,
            "run cancelled; unstarted tasks skipped"
        );

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_failed: Vec::new(),
            newly_skipped,
            run_just_finished: self.is_finished(),
        }
    }

    /// Final (or current) per-vertex report.
    pub fn report(&self) -> RunReport {
        RunReport::from_table(self.run_id, &self.workflow, &self.table, self.cancelled)
    }

    /// Mark `task` failed and block everything downstream of it.
    fn fail(&mut self, task: &str, error: ActionError) -> Vec<VertexId> {
        self.table.transition(task, VertexState::Failed);
        warn!(
            task = %task,
            run_id = self.run_id,
            error = %error,
            "task failed; blocking dependents in this run"
        );
        self.table.record_error(task, error);

        let mut failed = vec![task.to_string()];
        failed.extend(
            self.table
                .mark_dependents_upstream_failed(self.workflow.graph(), task),
        );
        failed
    }

    /// Promote ready tasks and dispatch as many queued tasks as slots allow.
    fn advance(&mut self) -> Vec<ScheduledTask> {
        if self.cancelled {
            return Vec::new();
        }

        let ready: Vec<VertexId> = self
            .workflow
            .graph()
            .ready_vertices(&self.table)
            .map(str::to_string)
            .collect();
        for id in ready {
            if self.table.transition(&id, VertexState::Queued) {
                debug!(task = %id, run_id = self.run_id, "upstreams satisfied; queued");
                self.queue.push_back(id);
            }
        }

        let mut scheduled = Vec::new();
        while self.running < self.max_concurrency {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            let Some(node) = self.workflow.task(&id).cloned() else {
                warn!(task = %id, "queued task has no definition");
                self.table.transition(&id, VertexState::Running);
                self.fail(&id, ActionError::Failed("no action registered".to_string()));
                continue;
            };
            if !self.table.transition(&id, VertexState::Running) {
                continue;
            }
            self.running += 1;
            info!(task = %id, run_id = self.run_id, "dispatching task");
            scheduled.push(ScheduledTask::new(node, self.run_id));
        }

        scheduled
    }
}
