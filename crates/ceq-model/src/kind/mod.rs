mod step;
pub use step::{Plan, StepSpec};
