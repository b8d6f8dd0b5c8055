mod id;
pub use id::TaskId;

mod value;
pub use value::{create_value, interpolate, Error as ValueError, Globals, ParamValue, PathRef};

mod task;
pub use task::Task;

mod registry;
pub use registry::TaskRegistry;

mod resolver;
pub use resolver::{PathResolver, Roots, RunConfig};

mod plan;
pub use plan::{Phase, RunPlan, Snapshot};

mod recipe;
pub use recipe::{Recipe, RootDirs};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Task \"{0}\" is already registered")]
    DuplicateTask(String),
    #[error("Task \"{0}\" is not defined in the recipe")]
    UnknownTask(String),
    #[error("Path reference \"{0}:{1}\" names an unknown root (expected input, output or msdir)")]
    UnresolvableRole(String, String),
    #[error("{0} defined more than once: '{1}'")]
    Redefined(&'static str, String),
    #[error("{0} does not exist: '{1}'")]
    ItemNotFound(&'static str, String),
    #[error("Plan is empty: '{0}'")]
    EmptyPlan(String),
    #[error("Snapshot must be the last entry of plan '{0}'")]
    MisplacedSnapshot(String),
    #[error("Snapshot name \"{0}\" must be a path inside the msdir")]
    InvalidSnapshotName(String),
    #[error("Unknown root directory '{0}' (expected input, output or msdir)")]
    UnknownRoot(String),
}
