//! Batch engine - runs every input through the pipeline on a bounded pool

use crate::{
    core::{InputVolume, RunSettings, Stage, VolumeOutcome, VolumeState},
    execution::VolumeExecutor,
    report::BatchSummary,
    tools::ToolRunner,
};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during a batch run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    BatchStarted {
        run_id: Uuid,
        total: usize,
    },
    VolumeStarted {
        stem: String,
        input: PathBuf,
    },
    StageCompleted {
        stem: String,
        stage: Stage,
        state: VolumeState,
    },
    VolumeCompleted {
        stem: String,
        output: Option<PathBuf>,
    },
    VolumeFailed {
        stem: String,
        stage: Stage,
        error: String,
    },
    BatchCompleted {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Emit an event to all handlers
fn dispatch(handlers: &[EventHandler], event: ExecutionEvent) {
    for handler in handlers {
        handler(event.clone());
    }
}

/// Main batch execution engine
pub struct BatchEngine<R> {
    executor: Arc<VolumeExecutor<R>>,
    jobs: usize,
    event_handlers: Vec<EventHandler>,
}

impl<R: ToolRunner + 'static> BatchEngine<R> {
    pub fn new(runner: Arc<R>, settings: &RunSettings) -> Self {
        Self {
            executor: Arc::new(VolumeExecutor::new(runner, settings)),
            jobs: settings.jobs.max(1),
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Run every input and summarize the batch
    ///
    /// At most `jobs` volumes are in flight. A failed or panicking volume is
    /// recorded and never stops the others. An input whose stem repeats an
    /// earlier input's fails at `Discovery` without running. Outcomes keep
    /// input order.
    pub async fn run<I>(&self, inputs: I) -> BatchSummary
    where
        I: IntoIterator<Item = InputVolume>,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let inputs: Vec<InputVolume> = inputs.into_iter().collect();
        let handlers: Arc<[EventHandler]> = self.event_handlers.clone().into();

        info!(
            "Starting batch {} with {} input(s), {} job(s)",
            run_id,
            inputs.len(),
            self.jobs
        );
        dispatch(
            &handlers,
            ExecutionEvent::BatchStarted {
                run_id,
                total: inputs.len(),
            },
        );

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<VolumeOutcome>> = vec![None; inputs.len()];

        // Working and final names derive from the stem, so one stem is one volume
        let mut claimed: HashMap<&str, &Path> = HashMap::new();

        for (index, input) in inputs.iter().enumerate() {
            if let Some(first) = claimed.get(input.stem()) {
                let outcome = failed_outcome(
                    input,
                    Stage::Discovery,
                    Utc::now(),
                    format!(
                        "duplicate stem {}: already processed from {}",
                        input.stem(),
                        first.display()
                    ),
                );
                report_outcome(&handlers, &outcome);
                slots[index] = Some(outcome);
                continue;
            }
            claimed.insert(input.stem(), input.path());

            // Only `jobs` volumes exist as tasks at any time
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker pool closed: {}", e);
                    break;
                }
            };

            let input = input.clone();
            let executor = self.executor.clone();
            let handlers = handlers.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let started_at = Utc::now();

                let task_input = input.clone();
                let task_executor = executor.clone();
                let task_handlers = handlers.clone();
                // Inner task isolates panics from the volume's pipeline
                let pipeline = tokio::spawn(async move {
                    let emit = move |event| dispatch(&task_handlers, event);
                    task_executor.process(&task_input, &emit).await
                });

                let outcome = match pipeline.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let reason = if e.is_panic() {
                            panic_message(e.into_panic())
                        } else {
                            e.to_string()
                        };
                        executor.discard_outputs(&input);
                        failed_outcome(&input, Stage::Fault, started_at, reason)
                    }
                };

                report_outcome(&handlers, &outcome);
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!("Volume task failed: {}", e),
            }
        }

        let outcomes: Vec<VolumeOutcome> = slots
            .into_iter()
            .zip(&inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| {
                    failed_outcome(
                        input,
                        Stage::Fault,
                        started_at,
                        "volume task did not complete".to_string(),
                    )
                })
            })
            .collect();

        let summary = BatchSummary::from_outcomes(run_id, started_at, outcomes);
        info!(
            "Batch {} finished: {} succeeded, {} failed",
            run_id, summary.succeeded, summary.failed
        );
        dispatch(
            &handlers,
            ExecutionEvent::BatchCompleted {
                run_id,
                succeeded: summary.succeeded,
                failed: summary.failed,
            },
        );
        summary
    }
}

fn report_outcome(handlers: &[EventHandler], outcome: &VolumeOutcome) {
    let event = match outcome.failure() {
        Some((stage, error)) => ExecutionEvent::VolumeFailed {
            stem: outcome.stem.clone(),
            stage,
            error: error.to_string(),
        },
        None => ExecutionEvent::VolumeCompleted {
            stem: outcome.stem.clone(),
            output: outcome.output.clone(),
        },
    };
    dispatch(handlers, event);
}

/// Outcome for a volume that failed outside its own pipeline
fn failed_outcome(
    input: &InputVolume,
    stage: Stage,
    started_at: DateTime<Utc>,
    reason: String,
) -> VolumeOutcome {
    error!("{} failed at {}: {}", input.stem(), stage, reason);
    VolumeOutcome {
        input: input.path().to_path_buf(),
        stem: input.stem().to_string(),
        state: VolumeState::Failed {
            stage,
            error: reason,
        },
        output: None,
        matrix: None,
        mask: None,
        started_at,
        finished_at: Utc::now(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
