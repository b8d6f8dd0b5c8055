/// Runs plans step by step
mod executor;
pub use executor::{Executor, PreparedStep, RunReport, RunState, StepState};

/// The boundary to external tools
mod invoker;
pub use invoker::{Invocation, ScriptInvoker, ToolInvoker};

/// Run a subprocess
mod run_cmd;

/// Command lines and step.sh files
mod script;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The plan can't be run as written; nothing was executed.
    #[error(transparent)]
    Invalid(#[from] recipe::Error),
    #[error(transparent)]
    StepExecution(#[from] StepExecutionError),
}

/// A step failed partway through a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Step \"{failed}\" failed after {} completed step(s); {} step(s) not attempted", .completed.len(), .remaining.len())]
pub struct StepExecutionError {
    /// Steps that finished successfully, in order
    pub completed: Vec<String>,
    /// The step that failed
    pub failed: String,
    /// Steps that were never attempted, in order
    pub remaining: Vec<String>,
    /// Whatever the tool reported, if anything
    pub diagnostics: Option<String>,
}
