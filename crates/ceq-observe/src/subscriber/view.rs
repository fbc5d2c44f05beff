use std::borrow::Borrow;

use ceq_model::{Event, EventKind};
use tracing::{debug, error, info, warn};

pub trait View {
    fn as_run(&self) -> &str;
    fn as_plan(&self) -> &str;
    fn as_step(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn index(&self) -> usize;
    fn elapsed_ms(&self) -> u64;
    fn kind(&self) -> EventKind;
}

impl<T> View for T
where
    T: Borrow<Event>,
{
    #[inline]
    fn as_run(&self) -> &str {
        self.borrow().run.as_str()
    }
    #[inline]
    fn as_plan(&self) -> &str {
        self.borrow().plan.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_step(&self) -> &str {
        self.borrow().step.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn index(&self) -> usize {
        self.borrow().index.unwrap_or(0)
    }
    #[inline]
    fn elapsed_ms(&self) -> u64 {
        self.borrow().elapsed_ms.unwrap_or(0)
    }
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // plan
        EventKind::PlanStarted => "plan started",
        EventKind::PlanFinished => "plan finished, every step succeeded or was already satisfied",
        EventKind::PlanAborted => "plan aborted, remaining steps not executed",

        // step
        EventKind::StepStarting => "step is starting",
        EventKind::StepSkipped => "step already satisfied (probe)",
        EventKind::StepSucceeded => "step applied",
        EventKind::StepFailed => "step failed",
        EventKind::StepCanceled => "step canceled",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        // plan
        EventKind::PlanStarted => debug!(run = e.as_run(), plan = e.as_plan(), "{msg}"),
        EventKind::PlanFinished => info!(
            run = e.as_run(),
            plan = e.as_plan(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),
        EventKind::PlanAborted => error!(
            run = e.as_run(),
            plan = e.as_plan(),
            step = e.as_step(),
            reason = e.as_reason(),
            "{msg}"
        ),

        // step
        EventKind::StepStarting => info!(index = e.index(), step = e.as_step(), "{msg}"),
        EventKind::StepSkipped => info!(index = e.index(), step = e.as_step(), "{msg}"),
        EventKind::StepSucceeded => info!(
            index = e.index(),
            step = e.as_step(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),
        EventKind::StepFailed => error!(
            index = e.index(),
            step = e.as_step(),
            reason = e.as_reason(),
            "{msg}"
        ),
        EventKind::StepCanceled => warn!(index = e.index(), step = e.as_step(), "{msg}"),
    }
}

#[cfg(test)]
mod tests {
    use ceq_model::RunId;

    use super::*;

    #[test]
    fn view_defaults_for_missing_fields() {
        let e = Event::new(EventKind::PlanStarted, RunId::from("run-7"));
        assert_eq!(e.as_run(), "run-7");
        assert_eq!(e.as_step(), "unknown");
        assert_eq!(e.index(), 0);
        assert_eq!(e.elapsed_ms(), 0);
    }

    #[test]
    fn view_reads_step_fields() {
        let e = Event::new(EventKind::StepSucceeded, RunId::from("r"))
            .with_plan("setup")
            .with_step(3, "manifest .venv")
            .with_elapsed_ms(1200);
        assert_eq!(e.as_plan(), "setup");
        assert_eq!(e.as_step(), "manifest .venv");
        assert_eq!(e.index(), 3);
        assert_eq!(e.elapsed_ms(), 1200);
    }

    #[test]
    fn skipped_message_mentions_probe() {
        assert!(message_for(EventKind::StepSkipped).contains("probe"));
    }
}
