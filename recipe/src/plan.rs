use std::path::{Component, Path};

use anyhow::Result;

use syntax::ast;

use crate::value::{create_value, Globals, ParamValue};
use crate::Error;

/// An ordered list of task names to run in one go.
///
/// Names are not checked against a registry until the plan is run,
/// and the same name may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Plan name (used for logging and log directory names).
    pub name: String,
    /// Task names, in execution order.
    pub steps: Vec<String>,
}

impl RunPlan {
    pub fn new<S: AsRef<str>>(name: &str, steps: &[S]) -> Self {
        Self {
            name: name.to_owned(),
            steps: steps.iter().map(|s| s.as_ref().to_owned()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Copy of a dataset in the msdir, taken after a phase completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Dataset to copy, relative to the msdir.
    pub src: String,
    /// Name of the copy, relative to the msdir.
    pub dst: String,
}

/// A [`RunPlan`] plus what to do after it succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub plan: RunPlan,
    pub snapshot: Option<Snapshot>,
}

impl Phase {
    /// Create a phase from its ast representation.
    pub fn create(ast_plan: &ast::Plan, globals: &Globals) -> Result<Self> {
        let mut steps = Vec::with_capacity(ast_plan.entries.len());
        let mut snapshot = None;

        for entry in &ast_plan.entries {
            if snapshot.is_some() {
                return Err(Error::MisplacedSnapshot(ast_plan.name.to_owned()).into());
            }
            match entry {
                ast::PlanEntry::Task(name) => steps.push((*name).to_owned()),
                ast::PlanEntry::Snapshot { src, dst } => {
                    snapshot = Some(Snapshot {
                        src: snapshot_name(src, globals)?,
                        dst: snapshot_name(dst, globals)?,
                    });
                }
            }
        }

        if steps.is_empty() {
            return Err(Error::EmptyPlan(ast_plan.name.to_owned()).into());
        }

        Ok(Self {
            plan: RunPlan {
                name: ast_plan.name.to_owned(),
                steps,
            },
            snapshot,
        })
    }
}

fn snapshot_name(rhs: &ast::Rhs, globals: &Globals) -> Result<String> {
    let name = match create_value(rhs, globals)? {
        // "name:msdir" is accepted too, since that's how datasets are usually written:
        ParamValue::Ref(path_ref) if path_ref.role == "msdir" => path_ref.name,
        ParamValue::List(_) => {
            return Err(crate::value::Error::UnexpectedList("snapshot".to_owned()).into())
        }
        val => val.to_string(),
    };
    // snapshots must stay under the msdir:
    let mut components = Path::new(&name).components();
    let stays_inside = components.clone().any(|c| matches!(c, Component::Normal(_)))
        && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !stays_inside {
        return Err(Error::InvalidSnapshotName(name).into());
    }
    Ok(name)
}
