mod error;
pub use error::{ExecError, ExecResult};

mod command;
pub use command::{CommandOutput, CommandSpec};

mod executor;
pub use executor::{Executor, ExecutorRef};

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::ProcExecutor;

mod record;
pub use record::RecordingExecutor;

pub mod util;
