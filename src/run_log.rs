use std::fmt;
use std::time::{Duration, SystemTime};

use colored::Colorize;

use util::{format_duration, Timer};

/// Final status of an attempted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Errored,
}

/// Record of a single step attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub name: String,
    /// Short label, for display
    pub label: String,
    /// Plan the step ran in
    pub phase: String,
    pub status: StepStatus,
    /// Wall-clock start time
    pub started: SystemTime,
    pub elapsed: Duration,
    pub diagnostics: Option<String>,
}

/// Append-only record of everything attempted during a run, across phases.
#[derive(Debug)]
pub struct RunLog {
    results: Vec<StepResult>,
    phases: Vec<(String, Duration)>,
    timer: Timer,
}

impl Default for RunLog {
    fn default() -> Self {
        Self {
            results: Vec::with_capacity(32),
            phases: Vec::new(),
            timer: Timer::now(),
        }
    }
}

impl RunLog {
    pub fn record(&mut self, result: StepResult) {
        log::debug!(
            "{} {} ({:?}) in {}",
            result.phase,
            result.name,
            result.status,
            format_duration(result.elapsed)
        );
        self.results.push(result);
    }

    /// Record that every step of `phase` completed, taking `elapsed` in total.
    pub fn record_phase(&mut self, phase: &str, elapsed: Duration) {
        self.phases.push((phase.to_owned(), elapsed));
    }

    /// All step attempts so far, in the order they ran.
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    /// Phases that ran to completion, in the order they ran.
    pub fn completed_phases(&self) -> impl Iterator<Item = &str> {
        self.phases.iter().map(|(name, _)| name.as_str())
    }

    pub fn summary(&self) -> Summary<'_> {
        Summary {
            log: self,
            total: self.timer.elapsed(),
        }
    }
}

/// Printable overview of a run: every step with its duration, then phase totals.
pub struct Summary<'a> {
    log: &'a RunLog,
    total: Duration,
}

impl Summary<'_> {
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn num_done(&self) -> usize {
        self.log.results.iter().filter(|r| r.status == StepStatus::Done).count()
    }

    pub fn num_errored(&self) -> usize {
        self.log.results.len() - self.num_done()
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "Run summary:".bold())?;
        let name_width = self.log.results.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for result in &self.log.results {
            let status = match result.status {
                StepStatus::Done => "DONE".green(),
                StepStatus::Errored => "ERROR".red(),
            };
            writeln!(
                f,
                "  {status:<5}  {:>12}  {}/{:<name_width$}  {}",
                format_duration(result.elapsed),
                result.phase,
                result.name,
                result.label,
            )?;
        }
        for (phase, elapsed) in &self.log.phases {
            writeln!(f, "  {phase} done in {}", format_duration(*elapsed))?;
        }
        write!(
            f,
            "{} step(s) done, {} failed; total time {}",
            self.num_done(),
            self.num_errored(),
            format_duration(self.total)
        )
    }
}
