use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;

use recipe::{ParamValue, PathResolver, Roots, RunConfig, RunPlan, TaskRegistry};
use util::Timer;

use crate::run_log::{RunLog, StepResult, StepStatus};

use super::{Error, Invocation, StepExecutionError, ToolInvoker};

/// A step whose task has been looked up and whose params have been resolved,
/// ready to hand to a [`ToolInvoker`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStep {
    /// Position in the plan (zero-based)
    pub index: usize,
    /// Name of the plan this step belongs to
    pub plan: String,
    /// Task name
    pub name: String,
    pub label: String,
    pub tool: String,
    /// Params with every path reference replaced by a concrete path
    pub params: Vec<(String, ParamValue)>,
    /// Roots the params were resolved against
    pub roots: Roots,
    /// Dir the tool runs in
    pub workdir: PathBuf,
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Lifecycle of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Queued,
    Running,
    Done,
    Errored,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub plan: String,
    pub steps: usize,
    pub elapsed: Duration,
}

/// Runs plans one step at a time, stopping at the first failure.
///
/// Before anything is invoked, every name in the plan is looked up and every
/// param is resolved; if any of that fails, no step runs at all.
pub struct Executor<'a, I> {
    registry: &'a TaskRegistry,
    config: &'a RunConfig,
    invoker: I,
    state: RunState,
    step_states: Vec<StepState>,
}

impl<'a, I: ToolInvoker> Executor<'a, I> {
    pub fn new(registry: &'a TaskRegistry, config: &'a RunConfig, invoker: I) -> Self {
        Self {
            registry,
            config,
            invoker,
            state: RunState::Pending,
            step_states: Vec::new(),
        }
    }

    /// State of the most recent (or current) run.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Per-step states of the most recent run, in plan order.
    pub fn step_states(&self) -> &[StepState] {
        &self.step_states
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Look up and resolve every step of `plan`, without running anything.
    pub fn prepare(&self, plan: &RunPlan) -> Result<Vec<PreparedStep>, Error> {
        // all names first, so a misspelled step is reported ahead of a bad path in an earlier one:
        let tasks = plan
            .steps
            .iter()
            .map(|name| self.registry.lookup(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut steps = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            let roots = self.config.roots_for(task);
            let params = PathResolver.resolve_params(&task.params, &roots)?;
            debug_assert!(params.iter().all(|(_, val)| !val.has_refs()));
            steps.push(PreparedStep {
                index,
                plan: plan.name.clone(),
                name: task.name.clone(),
                label: task.short_label().to_owned(),
                tool: task.tool.clone(),
                params,
                roots,
                workdir: self.config.workdir.clone(),
            });
        }
        Ok(steps)
    }

    /// Run every step of `plan` in order, recording each attempt in `log`.
    ///
    /// Stops at the first step that fails; the steps after it are not attempted.
    pub fn run(&mut self, plan: &RunPlan, log: &mut RunLog) -> Result<RunReport, Error> {
        self.state = RunState::Pending;
        self.step_states = vec![StepState::Queued; plan.len()];

        let steps = match self.prepare(plan) {
            Ok(steps) => steps,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(e);
            }
        };

        self.state = RunState::Running;
        let timer = Timer::now();

        for step in &steps {
            self.step_states[step.index] = StepState::Running;
            if step.label == step.name {
                eprintln!("{} {}", "RUN".green(), step.name);
            } else {
                eprintln!("{} {} ({})", "RUN".green(), step.name, step.label);
            }
            log::info!("running step {} of plan {}", step.index + 1, plan.name);

            let step_timer = Timer::now();
            let invocation = match self.invoker.invoke(step) {
                Ok(invocation) => invocation,
                Err(e) => Invocation::failed(format!("{e:#}")),
            };
            let elapsed = step_timer.elapsed();

            log.record(StepResult {
                name: step.name.clone(),
                label: step.label.clone(),
                phase: plan.name.clone(),
                status: if invocation.success {
                    StepStatus::Done
                } else {
                    StepStatus::Errored
                },
                started: step_timer.started(),
                elapsed,
                diagnostics: invocation.diagnostics.clone(),
            });

            if !invocation.success {
                eprintln!("{} {}", "FAILED".red(), step.name);
                self.step_states[step.index] = StepState::Errored;
                self.state = RunState::Failed;
                return Err(StepExecutionError {
                    completed: plan.steps[..step.index].to_vec(),
                    failed: step.name.clone(),
                    remaining: plan.steps[step.index + 1..].to_vec(),
                    diagnostics: invocation.diagnostics,
                }
                .into());
            }

            eprintln!("{} {}", "COMPLETED".green(), step.name);
            self.step_states[step.index] = StepState::Done;
        }

        self.state = RunState::Succeeded;
        Ok(RunReport {
            plan: plan.name.clone(),
            steps: steps.len(),
            elapsed: timer.elapsed(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::{bail, Result};
    use recipe::{Error as RecipeError, Task};
    use std::path::Path;

    /// Records which steps were invoked, failing the ones named in `fail`.
    #[derive(Default)]
    struct MockInvoker {
        fail: Vec<&'static str>,
        broken: Vec<&'static str>,
        invoked: Vec<PreparedStep>,
    }

    impl ToolInvoker for MockInvoker {
        fn invoke(&mut self, step: &PreparedStep) -> Result<Invocation> {
            self.invoked.push(step.clone());
            if self.broken.contains(&step.name.as_str()) {
                bail!("no such executable");
            }
            if self.fail.contains(&step.name.as_str()) {
                Ok(Invocation::failed("tool exploded"))
            } else {
                Ok(Invocation::succeeded())
            }
        }
    }

    impl MockInvoker {
        fn invoked_names(&self) -> Vec<&str> {
            self.invoked.iter().map(|s| s.name.as_str()).collect()
        }
    }

    fn config() -> RunConfig {
        RunConfig::new(
            PathBuf::from("/work"),
            Roots {
                input: PathBuf::from("/work/input"),
                output: PathBuf::from("/work/output"),
                msdir: PathBuf::from("/work/msdir"),
            },
        )
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::default();
        for name in ["A", "B", "C"] {
            registry.register(Task::new(name, "tool")).unwrap();
        }
        registry
            .register(
                Task::new("bandpass", "casa_bandpass")
                    .with_label("bandpass:: First bandpass calibration")
                    .with_output("output_lh")
                    .with_param("vis", ParamValue::from_text("lh.MS:msdir"))
                    .with_param("caltable", ParamValue::from_text("lh.B0:output")),
            )
            .unwrap();
        registry
            .register(
                Task::new("bad_role", "tool")
                    .with_param("table", ParamValue::from_text("x:scratch")),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_runs_in_order() -> Result<()> {
        let (registry, config) = (registry(), config());
        let mut invoker = MockInvoker::default();
        let mut log = RunLog::default();
        let mut executor = Executor::new(&registry, &config, &mut invoker);

        let report = executor.run(&RunPlan::new("p", &["C", "A", "B", "A"]), &mut log)?;
        assert_eq!(4, report.steps);
        assert_eq!(RunState::Succeeded, executor.state());
        assert_eq!(&[StepState::Done; 4], executor.step_states());

        assert_eq!(vec!["C", "A", "B", "A"], invoker.invoked_names());
        assert_eq!(
            vec![1, 3],
            invoker.invoked.iter().filter(|s| s.name == "A").map(|s| s.index).collect::<Vec<_>>()
        );
        assert_eq!(4, log.results().len());
        assert!(log.results().iter().all(|r| r.status == StepStatus::Done && r.phase == "p"));
        Ok(())
    }

    #[test]
    fn test_halts_at_first_failure() {
        let (registry, config) = (registry(), config());
        let mut invoker = MockInvoker {
            fail: vec!["B"],
            ..Default::default()
        };
        let mut log = RunLog::default();
        let mut executor = Executor::new(&registry, &config, &mut invoker);

        let err = executor.run(&RunPlan::new("p", &["A", "B", "C"]), &mut log).unwrap_err();
        let err = match err {
            Error::StepExecution(err) => err,
            other => panic!("expected a step execution error, got {other:?}"),
        };
        assert_eq!(vec!["A".to_owned()], err.completed);
        assert_eq!("B", err.failed);
        assert_eq!(vec!["C".to_owned()], err.remaining);
        assert_eq!(Some("tool exploded".to_owned()), err.diagnostics);

        assert_eq!(RunState::Failed, executor.state());
        assert_eq!(
            &[StepState::Done, StepState::Errored, StepState::Queued],
            executor.step_states()
        );
        assert_eq!(vec!["A", "B"], invoker.invoked_names());

        let statuses: Vec<_> = log.results().iter().map(|r| r.status).collect();
        assert_eq!(vec![StepStatus::Done, StepStatus::Errored], statuses);
        assert_eq!(Some("tool exploded"), log.results()[1].diagnostics.as_deref());
    }

    #[test]
    fn test_invoker_error_is_step_failure() {
        let (registry, config) = (registry(), config());
        let mut invoker = MockInvoker {
            broken: vec!["A"],
            ..Default::default()
        };
        let mut log = RunLog::default();
        let mut executor = Executor::new(&registry, &config, &mut invoker);

        let err = executor.run(&RunPlan::new("p", &["A", "B"]), &mut log).unwrap_err();
        assert!(matches!(
            &err,
            Error::StepExecution(e) if e.completed.is_empty() && e.failed == "A" && e.remaining == ["B"]
        ));
        assert_eq!(vec!["A"], invoker.invoked_names());
    }

    #[test]
    fn test_unknown_task_runs_nothing() {
        let (registry, config) = (registry(), config());
        let mut invoker = MockInvoker::default();
        let mut log = RunLog::default();
        let mut executor = Executor::new(&registry, &config, &mut invoker);

        let err = executor.run(&RunPlan::new("p", &["A", "Z", "B"]), &mut log).unwrap_err();
        assert!(matches!(err, Error::Invalid(RecipeError::UnknownTask(name)) if name == "Z"));
        assert_eq!(RunState::Failed, executor.state());
        assert!(invoker.invoked.is_empty());
        assert!(log.results().is_empty());
    }

    #[test]
    fn test_unresolvable_role_runs_nothing() {
        let (registry, config) = (registry(), config());
        let mut invoker = MockInvoker::default();
        let mut log = RunLog::default();
        let mut executor = Executor::new(&registry, &config, &mut invoker);

        let err = executor.run(&RunPlan::new("p", &["A", "bad_role"]), &mut log).unwrap_err();
        assert!(matches!(
            err,
            Error::Invalid(RecipeError::UnresolvableRole(name, role)) if name == "x" && role == "scratch"
        ));
        assert!(invoker.invoked.is_empty());
    }

    #[test]
    fn test_empty_plan() -> Result<()> {
        let (registry, config) = (registry(), config());
        let mut invoker = MockInvoker::default();
        let mut log = RunLog::default();
        let mut executor = Executor::new(&registry, &config, &mut invoker);

        let report = executor.run(&RunPlan::new::<&str>("p", &[]), &mut log)?;
        assert_eq!(0, report.steps);
        assert_eq!(RunState::Succeeded, executor.state());
        assert!(invoker.invoked.is_empty());
        Ok(())
    }

    #[test]
    fn test_prepare_resolves_params() -> Result<()> {
        let (registry, config) = (registry(), config());
        let executor = Executor::new(&registry, &config, MockInvoker::default());

        let steps = executor.prepare(&RunPlan::new("1gc", &["bandpass"]))?;
        assert_eq!(1, steps.len());
        let step = &steps[0];
        assert_eq!("bandpass", step.label);
        assert_eq!("casa_bandpass", step.tool);
        assert_eq!(Path::new("/work"), step.workdir);
        assert_eq!(
            vec![
                ("vis".to_owned(), ParamValue::Path(PathBuf::from("/work/msdir/lh.MS"))),
                (
                    "caltable".to_owned(),
                    ParamValue::Path(PathBuf::from("/work/output_lh/lh.B0"))
                ),
            ],
            step.params
        );
        assert_eq!(0, executor.invoker().invoked.len());
        Ok(())
    }
}
