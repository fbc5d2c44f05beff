use std::{sync::Arc, time::Instant};

use ceq_exec::ExecutorRef;
use ceq_model::{Event, EventKind, Plan, RunId, StepInfo, StepStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::CoreError,
    events::{Bus, Subscribe},
    plan,
    router::RunnerRouter,
    state::RunState,
    step::{StepContext, StepOutcome},
};

/// Final record of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunId,
    pub plan: String,
    pub steps: Vec<StepInfo>,
}

impl RunReport {
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

/// Sequential, fail-fast executor of plans.
pub struct Pipeline {
    router: RunnerRouter,
    executor: ExecutorRef,
    bus: Bus,
    state: RunState,
    probes: bool,
    verify: bool,
}

impl Pipeline {
    pub fn new(router: RunnerRouter, executor: ExecutorRef) -> Self {
        Self {
            router,
            executor,
            bus: Bus::default(),
            state: RunState::new(),
            probes: true,
            verify: true,
        }
    }

    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        for s in subscribers {
            self.bus.push(s);
        }
        self
    }

    /// Always apply, never probe.
    pub fn without_probes(mut self) -> Self {
        self.probes = false;
        self
    }

    /// Commands are only recorded, so probes and post-install checks would see nothing.
    pub fn dry_run(mut self) -> Self {
        self.probes = false;
        self.verify = false;
        self
    }

    pub fn state(&self) -> RunState {
        self.state.clone()
    }

    /// Validate, build and run `plan`.
    ///
    /// Nothing executes unless every step builds. The first failing step stops the run; steps after
    /// it stay pending.
    #[instrument(level = "debug", skip_all, fields(plan = %plan.name))]
    pub async fn run(&self, plan: &Plan, cancel: CancellationToken) -> Result<RunReport, CoreError> {
        plan::validate(plan)?;
        let steps = self.router.build_plan(plan)?;

        let run = RunId::from(uuid::Uuid::new_v4().to_string());
        self.state.begin(run.clone(), plan.name.clone());
        for (step, kind) in &steps {
            self.state.add_step(step.name(), *kind);
        }

        let started = Instant::now();
        info!(target: "ceq.core.pipeline", run = %run, plan = %plan.name, steps = steps.len(), "plan started");
        self.emit(Event::new(EventKind::PlanStarted, run.clone()).with_plan(&plan.name))
            .await;

        let ctx = StepContext::new(Arc::clone(&self.executor), cancel.clone()).with_verify(self.verify);

        for (index, (step, _)) in steps.iter().enumerate() {
            let name = step.name().to_string();
            if cancel.is_cancelled() {
                return Err(self.abort_canceled(&run, plan, index, &name).await);
            }

            self.state.update_status(index, StepStatus::Running, None);
            self.emit(
                Event::new(EventKind::StepStarting, run.clone())
                    .with_plan(&plan.name)
                    .with_step(index, &name),
            )
            .await;

            let step_started = Instant::now();
            let result = step.execute(&ctx, self.probes).await;
            let elapsed = elapsed_ms(step_started);

            match result {
                Ok(StepOutcome::AlreadySatisfied) => {
                    debug!(target: "ceq.core.pipeline", step = %name, "probe satisfied, skipped");
                    self.state.update_status(index, StepStatus::Skipped, None);
                    self.emit(
                        Event::new(EventKind::StepSkipped, run.clone())
                            .with_plan(&plan.name)
                            .with_step(index, &name)
                            .with_elapsed_ms(elapsed),
                    )
                    .await;
                }
                Ok(StepOutcome::Applied) => {
                    self.state.update_status(index, StepStatus::Succeeded, None);
                    self.emit(
                        Event::new(EventKind::StepSucceeded, run.clone())
                            .with_plan(&plan.name)
                            .with_step(index, &name)
                            .with_elapsed_ms(elapsed),
                    )
                    .await;
                }
                Err(CoreError::Canceled) => {
                    return Err(self.abort_canceled(&run, plan, index, &name).await);
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(target: "ceq.core.pipeline", step = %name, %reason, "step failed, aborting plan");
                    self.state
                        .update_status(index, StepStatus::Failed, Some(reason.clone()));
                    self.emit(
                        Event::new(EventKind::StepFailed, run.clone())
                            .with_plan(&plan.name)
                            .with_step(index, &name)
                            .with_reason(&reason)
                            .with_elapsed_ms(elapsed),
                    )
                    .await;
                    self.emit(
                        Event::new(EventKind::PlanAborted, run.clone())
                            .with_plan(&plan.name)
                            .with_step(index, &name)
                            .with_reason(&reason),
                    )
                    .await;
                    return Err(CoreError::StepFailed {
                        index,
                        step: name,
                        reason,
                    });
                }
            }
        }

        self.emit(
            Event::new(EventKind::PlanFinished, run.clone())
                .with_plan(&plan.name)
                .with_elapsed_ms(elapsed_ms(started)),
        )
        .await;
        info!(target: "ceq.core.pipeline", run = %run, plan = %plan.name, "plan finished");

        Ok(RunReport {
            run,
            plan: plan.name.clone(),
            steps: self.state.list_all(),
        })
    }

    async fn abort_canceled(&self, run: &RunId, plan: &Plan, index: usize, name: &str) -> CoreError {
        warn!(target: "ceq.core.pipeline", step = %name, "canceled");
        self.state.update_status(index, StepStatus::Canceled, None);
        self.emit(
            Event::new(EventKind::StepCanceled, run.clone())
                .with_plan(&plan.name)
                .with_step(index, name),
        )
        .await;
        self.emit(
            Event::new(EventKind::PlanAborted, run.clone())
                .with_plan(&plan.name)
                .with_step(index, name)
                .with_reason("canceled"),
        )
        .await;
        CoreError::Canceled
    }

    async fn emit(&self, event: Event) {
        self.bus.emit(event).await;
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
