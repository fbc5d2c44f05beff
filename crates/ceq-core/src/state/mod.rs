use std::{
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use ceq_model::{RunId, StepIndex, StepInfo, StepStatus};

/// In-memory record of the current run.
///
/// Cloning shares the same storage, so the CLI can keep a handle while the pipeline writes to it.
#[derive(Clone, Default)]
pub struct RunState {
    inner: Arc<RwLock<RunStateInner>>,
}

#[derive(Default)]
struct RunStateInner {
    run: Option<RunId>,
    plan: Option<String>,
    /// Steps indexed by their position in the plan.
    steps: Vec<StepInfo>,
}

/// Per-status counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RunStateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunStateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the previous run and start recording `run`.
    pub fn begin(&self, run: RunId, plan: impl Into<String>) {
        let mut inner = self.write();
        inner.run = Some(run);
        inner.plan = Some(plan.into());
        inner.steps.clear();
    }

    /// Register a step as pending; steps must be added in plan order.
    pub fn add_step(&self, name: impl Into<String>, kind: impl Into<String>) -> StepIndex {
        let mut inner = self.write();
        let now = SystemTime::now();
        let index = inner.steps.len();
        inner.steps.push(StepInfo {
            index,
            name: name.into(),
            kind: kind.into(),
            status: StepStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
        });
        index
    }

    pub fn update_status(&self, index: StepIndex, status: StepStatus, error: Option<String>) {
        let mut inner = self.write();
        if let Some(info) = inner.steps.get_mut(index) {
            info.status = status;
            info.updated_at = SystemTime::now();
            if let Some(err) = error {
                info.error = Some(err);
            }
        }
    }

    pub fn run(&self) -> Option<RunId> {
        self.read().run.clone()
    }

    pub fn plan(&self) -> Option<String> {
        self.read().plan.clone()
    }

    pub fn get(&self, index: StepIndex) -> Option<StepInfo> {
        self.read().steps.get(index).cloned()
    }

    /// All steps in plan order.
    pub fn list_all(&self) -> Vec<StepInfo> {
        self.read().steps.clone()
    }

    pub fn list_by_status(&self, status: StepStatus) -> Vec<StepInfo> {
        self.read()
            .steps
            .iter()
            .filter(|info| info.status == status)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> Summary {
        self.read()
            .steps
            .iter()
            .fold(Summary::default(), |mut acc, info| {
                match info.status {
                    StepStatus::Pending => acc.pending += 1,
                    StepStatus::Running => acc.running += 1,
                    StepStatus::Succeeded => acc.succeeded += 1,
                    StepStatus::Skipped => acc.skipped += 1,
                    StepStatus::Failed => acc.failed += 1,
                    StepStatus::Canceled => acc.canceled += 1,
                }
                acc
            })
    }
}
