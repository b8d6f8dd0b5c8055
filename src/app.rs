use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use recipe::{Phase, Recipe, Roots, RunConfig, RunPlan, Snapshot};
use syntax::{self, ast};
use util::{format_duration, HashSet, PathEncodingError};

use crate::exec::{self, Executor, PreparedStep, ScriptInvoker};
use crate::fs::Fs;
use crate::run_log::RunLog;
use crate::settings::Settings;
use crate::ui::Ui;

const DEFAULT_INPUT: &str = "input";
const DEFAULT_OUTPUT: &str = "output";
const DEFAULT_MSDIR: &str = "msdir";
/// Name given to the plan made of tasks listed on the command line.
const ANONYMOUS_PLAN: &str = "tasks";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Nothing to run: no target specified with --plan or --task")]
    NoTargetSpecified,
    #[error("--plan and --task can't be used together")]
    ConflictingTargets,
    #[error("Snapshot source \"{0}\" does not exist")]
    SnapshotSourceMissing(String),
    #[error("Snapshot destination \"{0}\" already exists")]
    SnapshotExists(String),
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let ui = Ui::new(&settings);
        Self { settings, ui }
    }

    /// Run the app, using settings to determine which plans to run.
    pub fn run(mut self) -> Result<()> {
        let mut strbuf = String::with_capacity(0); // will be resized later.
        self.read_recipe_to_buf(&mut strbuf)?;
        let items = self.parse_recipe(&strbuf)?;
        let recipe = self.load_recipe(items)?;

        if self.settings.list {
            print_listing(&recipe);
            return Ok(());
        }

        let phases = self.get_targets(&recipe)?;
        let config = self.make_run_config(&recipe);
        if self.ui.verbose {
            eprintln!("Using working directory {:?}", config.workdir);
        }

        let mut fs = Fs::new(
            &[&config.workdir, &config.roots.output, &config.roots.msdir],
            self.settings.dry_run,
        );
        let mut pathbuf = PathBuf::with_capacity(256);
        let log_root = fs.log_root(&config.roots.output, &mut pathbuf).to_path_buf();
        let invoker = ScriptInvoker::new(recipe.tools.clone(), fs.clone(), log_root, self.ui.verbose);
        let mut executor = Executor::new(&recipe.registry, &config, invoker);

        // nothing runs unless every phase can be run:
        let prepared = self.prepare_all(&executor, &phases)?;
        self.check_snapshots(&fs, &config, &phases)?;
        // tasks may direct their outputs outside the output root:
        for step in prepared.iter().flatten() {
            fs.allow(&step.roots.output);
        }

        self.print_plan(&phases, &prepared, executor.invoker());
        if self.settings.dry_run {
            eprintln!("{}", "Dry run; nothing was executed.".yellow());
            return Ok(());
        }
        if !self.ui.confirm("Proceed?")? {
            return Ok(());
        }

        self.make_output_dirs(&fs, &config, &prepared)
            .context("while preparing output directories")?;

        eprintln!("\n{}.\n", "Starting run".magenta());
        self.run_phases(&mut executor, &fs, &config, &phases)
    }
}

// LOADING //////////////////
impl App {
    fn read_recipe_to_buf(&mut self, strbuf: &mut String) -> Result<()> {
        self.ui.verbose_progress_debug("Reading recipe file", &self.settings.recipe);
        *strbuf = std::fs::read_to_string(&self.settings.recipe)
            .with_context(|| format!("while reading recipe file {:?}", self.settings.recipe))?;
        self.ui.done();
        Ok(())
    }

    fn parse_recipe<'a>(&mut self, text: &'a str) -> Result<Vec<ast::Item<'a>>> {
        self.ui.verbose_progress("Parsing recipe file");
        self.ui.start_timer();
        let items = syntax::parse(text)
            .with_context(|| format!("while parsing recipe file {:?}", self.settings.recipe))?;
        self.ui.done();
        self.ui.print_elapsed("Parsing recipe file");
        Ok(items)
    }

    fn load_recipe(&mut self, items: Vec<ast::Item>) -> Result<Recipe> {
        self.ui.verbose_progress("Loading recipe");
        self.ui.start_timer();
        let recipe = Recipe::load(items, &self.settings.overrides)
            .with_context(|| format!("while loading recipe file {:?}", self.settings.recipe))?;
        self.ui.done();
        self.ui.print_elapsed("Loading recipe");
        self.ui.verbose_msg(&format!(
            "Loaded {} tasks and {} plans.",
            recipe.registry.len(),
            recipe.phases.len()
        ));
        Ok(recipe)
    }

    /// Roots come from the command line, then the recipe, then the defaults;
    /// relative dirs are relative to the working directory.
    fn make_run_config(&self, recipe: &Recipe) -> RunConfig {
        let root = |cli: &Option<PathBuf>, in_recipe: &Option<String>, default: &str| {
            match (cli, in_recipe) {
                (Some(dir), _) => self.settings.in_workdir(dir),
                (None, Some(dir)) => self.settings.in_workdir(dir),
                (None, None) => self.settings.in_workdir(default),
            }
        };
        let roots = Roots {
            input: root(&self.settings.input, &recipe.roots.input, DEFAULT_INPUT),
            output: root(&self.settings.output, &recipe.roots.output, DEFAULT_OUTPUT),
            msdir: root(&self.settings.msdir, &recipe.roots.msdir, DEFAULT_MSDIR),
        };
        log::debug!("roots: {roots:?}");
        RunConfig::new(self.settings.workdir.clone(), roots)
    }
}

// GETTING TARGETS ////////////
impl App {
    fn get_targets(&self, recipe: &Recipe) -> Result<Vec<Phase>> {
        match (self.settings.plans.is_empty(), self.settings.tasks.is_empty()) {
            (false, false) => Err(Error::ConflictingTargets.into()),
            (false, true) => {
                log::debug!("Using plans '{}'", self.settings.plans.join(", "));
                let mut phases = Vec::with_capacity(self.settings.plans.len());
                for name in &self.settings.plans {
                    phases.push(recipe.phase(name)?.clone());
                }
                Ok(phases)
            }
            (true, false) => {
                log::debug!(
                    "No plan specified; running tasks '{}' specified on command line",
                    self.settings.tasks.join(", "),
                );
                Ok(vec![Phase {
                    plan: RunPlan::new(ANONYMOUS_PLAN, &self.settings.tasks),
                    snapshot: None,
                }])
            }
            (true, true) => Err(Error::NoTargetSpecified.into()),
        }
    }

    fn prepare_all(
        &self,
        executor: &Executor<ScriptInvoker>,
        phases: &[Phase],
    ) -> Result<Vec<Vec<PreparedStep>>> {
        self.ui.verbose_progress("Resolving all steps");
        let mut prepared = Vec::with_capacity(phases.len());
        for phase in phases {
            let steps = executor
                .prepare(&phase.plan)
                .with_context(|| format!("while preparing plan \"{}\"", phase.plan.name))?;
            prepared.push(steps);
        }
        self.ui.done();
        Ok(prepared)
    }

    fn check_snapshots(&self, fs: &Fs, config: &RunConfig, phases: &[Phase]) -> Result<()> {
        let mut seen: HashSet<PathBuf> = HashSet::default();
        for snapshot in phases.iter().filter_map(|phase| phase.snapshot.as_ref()) {
            let dst = config.roots.msdir.join(&snapshot.dst);
            // an earlier phase of this run would have created it:
            if fs.exists(&dst) || !seen.insert(dst.clone()) {
                return Err(Error::SnapshotExists(path_str(&dst)?).into());
            }
        }
        Ok(())
    }
}

// RUNNING /////////////////
impl App {
    fn print_plan(&self, phases: &[Phase], prepared: &[Vec<PreparedStep>], invoker: &ScriptInvoker) {
        let show_commands = self.settings.dry_run || self.ui.verbose;
        for (phase, steps) in phases.iter().zip(prepared) {
            eprintln!("{} {} ({} steps)", "PLAN".magenta(), phase.plan.name, steps.len());
            for step in steps {
                eprintln!(
                    "  {:02} {} [{}] {}",
                    step.index + 1,
                    step.name.bold(),
                    step.tool,
                    step.label
                );
                if show_commands {
                    eprintln!("     {}", invoker.command_line(step));
                }
            }
            if let Some(snapshot) = &phase.snapshot {
                eprintln!("  then snapshot {} -> {}", snapshot.src, snapshot.dst);
            }
        }
    }

    fn make_output_dirs(&self, fs: &Fs, config: &RunConfig, prepared: &[Vec<PreparedStep>]) -> Result<()> {
        let mut dirs: HashSet<&Path> = HashSet::default();
        dirs.insert(&config.roots.output);
        for step in prepared.iter().flatten() {
            dirs.insert(&step.roots.output);
        }
        for dir in dirs {
            fs.ensure_dir_exists(dir, self.ui.verbose)?;
        }
        Ok(())
    }

    fn run_phases(
        &mut self,
        executor: &mut Executor<ScriptInvoker>,
        fs: &Fs,
        config: &RunConfig,
        phases: &[Phase],
    ) -> Result<()> {
        let mut log = RunLog::default();
        for (i, phase) in phases.iter().enumerate() {
            eprintln!("{} {}\n", "PLAN".magenta(), phase.plan.name);
            let report = match executor.run(&phase.plan, &mut log) {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("\n{}\n", log.summary());
                    print_failure(&e, &phases[i + 1..]);
                    return Err(e)
                        .with_context(|| format!("while running plan \"{}\"", phase.plan.name));
                }
            };
            eprintln!(
                "\n{} {} done in {}\n",
                "PLAN".green(),
                report.plan,
                format_duration(report.elapsed)
            );
            log.record_phase(&report.plan, report.elapsed);

            if let Some(snapshot) = &phase.snapshot {
                self.take_snapshot(fs, config, snapshot).with_context(|| {
                    format!("while taking snapshot after plan \"{}\"", phase.plan.name)
                })?;
            }
        }

        eprintln!("{}", log.summary());
        eprintln!("{}", "Completed run.".green());
        Ok(())
    }

    fn take_snapshot(&mut self, fs: &Fs, config: &RunConfig, snapshot: &Snapshot) -> Result<()> {
        let src = config.roots.msdir.join(&snapshot.src);
        let dst = config.roots.msdir.join(&snapshot.dst);
        if !fs.exists(&src) {
            return Err(Error::SnapshotSourceMissing(path_str(&src)?).into());
        }
        self.ui.start_timer();
        self.ui.verbose_progress_debug("Copying", &src);
        fs.copy(&src, &dst)?;
        self.ui.done();
        self.ui.print_elapsed("Snapshot");
        eprintln!("{} {} -> {}\n", "SNAPSHOT".green(), snapshot.src, snapshot.dst);
        Ok(())
    }
}

fn print_failure(err: &exec::Error, not_started: &[Phase]) {
    let exec::Error::StepExecution(failure) = err else {
        return;
    };
    let or_none = |names: &[String]| {
        if names.is_empty() {
            "(none)".to_owned()
        } else {
            names.join(", ")
        }
    };
    eprintln!("{} {}", "COMPLETED:".green(), or_none(&failure.completed));
    eprintln!("{} {}", "FAILED:".red(), failure.failed);
    if let Some(diagnostics) = &failure.diagnostics {
        eprintln!("{diagnostics}");
    }
    eprintln!("{} {}", "NOT ATTEMPTED:".yellow(), or_none(&failure.remaining));

    let plans: Vec<String> = not_started.iter().map(|p| p.plan.name.clone()).collect();
    if !plans.is_empty() {
        eprintln!("{} {}", "PLANS NOT STARTED:".yellow(), plans.join(", "));
    }

    let mut resume = String::new();
    for name in std::iter::once(&failure.failed).chain(&failure.remaining) {
        resume.push_str(" -t ");
        resume.push_str(name);
    }
    eprintln!("\nTo resume, fix the failed step and run with:{resume}");
    if !plans.is_empty() {
        eprintln!("then with: -p {}", plans.join(" -p "));
    }
}

fn print_listing(recipe: &Recipe) {
    println!("{}", "Tasks:".bold());
    let width = recipe.registry.all_names().map(str::len).max().unwrap_or(0);
    for task in recipe.registry.iter() {
        println!("  {:<width$}  [{}] {}", task.name, task.tool, task.short_label());
    }
    println!("{}", "Plans:".bold());
    for phase in &recipe.phases {
        print!("  {}: {}", phase.plan.name, phase.plan.steps.join(", "));
        match &phase.snapshot {
            Some(snapshot) => println!(" (snapshot {} -> {})", snapshot.src, snapshot.dst),
            None => println!(),
        }
    }
}

fn path_str(path: &Path) -> Result<String, PathEncodingError> {
    path.to_str().map(str::to_owned).ok_or(PathEncodingError)
}
