mod kv;
pub use kv::KeyValue;

mod env;
pub use env::Env;

mod run_id;
pub use run_id::RunId;

mod step_info;
pub use step_info::StepInfo;

mod step_status;
pub use step_status::StepStatus;

mod event;
pub use event::{Event, EventKind};

/// Position of a step inside a plan (zero-based).
pub type StepIndex = usize;

/// Timeout or duration value in milliseconds.
pub type DurationMs = u64;
