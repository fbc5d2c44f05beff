use std::sync::Arc;

use ceq_model::{Plan, StepSpec};
use tracing::{instrument, trace};

use crate::{
    error::CoreError,
    runner::{BuildContext, CollectRunner, InstallRunner, ProvisionRunner, Runner, SubmitRunner},
    step::StepRef,
};

#[derive(Default)]
pub struct RunnerRouter {
    runners: Vec<Arc<dyn Runner>>,
    ctx: BuildContext,
}

impl RunnerRouter {
    #[inline]
    pub fn new() -> Self {
        Self {
            runners: Vec::new(),
            ctx: BuildContext::default(),
        }
    }

    /// Router with every built-in runner registered.
    pub fn with_defaults() -> Self {
        let mut router = Self::new();
        router.register(Arc::new(ProvisionRunner::new()));
        router.register(Arc::new(InstallRunner::new()));
        router.register(Arc::new(SubmitRunner::new()));
        router.register(Arc::new(CollectRunner::new()));
        router
    }

    #[inline]
    pub fn with_context(mut self, ctx: BuildContext) -> Self {
        self.ctx = ctx;
        self
    }

    #[inline]
    pub fn register(&mut self, runner: Arc<dyn Runner>) {
        self.runners.push(runner);
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn pick(&self, spec: &StepSpec) -> Option<&Arc<dyn Runner>> {
        self.runners.iter().find(|r| r.supports(spec))
    }

    #[instrument(level = "trace", skip(self, spec), fields(kind = spec.kind()))]
    pub fn build(&self, spec: &StepSpec) -> Result<StepRef, CoreError> {
        self.build_with(spec, &self.ctx)
    }

    fn build_with(&self, spec: &StepSpec, ctx: &BuildContext) -> Result<StepRef, CoreError> {
        let r = self
            .pick(spec)
            .ok_or_else(|| CoreError::NoRunner(spec.kind().to_string()))?;

        let step = r.build_step(spec, ctx)?;
        trace!(runner = r.name(), step = step.name(), "runner built step successfully");
        Ok(step)
    }

    /// Build every step of `plan` in order.
    ///
    /// Variables exported by a step are visible to the steps after it.
    #[instrument(level = "debug", skip(self, plan), fields(plan = %plan.name, steps = plan.len()))]
    pub fn build_plan(&self, plan: &Plan) -> Result<Vec<(StepRef, &'static str)>, CoreError> {
        let mut ctx = self.ctx.clone();
        let mut steps = Vec::with_capacity(plan.len());
        for spec in &plan.steps {
            let step = self.build_with(spec, &ctx)?;
            if let Some(r) = self.pick(spec) {
                let exported = r.exports(spec, &ctx);
                if !exported.is_empty() {
                    ctx.env = ctx.env.merged(&exported);
                }
            }
            steps.push((step, spec.kind()));
        }
        Ok(steps)
    }
}
