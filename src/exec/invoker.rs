use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use colored::Colorize;

use util::HashMap;

use crate::fs::Fs;

use super::run_cmd::run_cmd;
use super::script::{command_line, StepScriptBuilder};
use super::PreparedStep;

/// Max number of stderr lines kept as diagnostics for a failed step.
const DIAGNOSTIC_LINES: usize = 20;

/// Outcome of invoking the tool for a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub success: bool,
    /// Whatever the tool had to say about a failure, if anything.
    pub diagnostics: Option<String>,
}

impl Invocation {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            diagnostics: None,
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: Some(diagnostics.into()),
        }
    }
}

/// The boundary between the executor and the external tools it drives.
///
/// An `Err` means the tool could not be run at all; the executor treats that
/// the same as an unsuccessful [`Invocation`].
pub trait ToolInvoker {
    fn invoke(&mut self, step: &PreparedStep) -> Result<Invocation>;
}

impl<T: ToolInvoker + ?Sized> ToolInvoker for &mut T {
    fn invoke(&mut self, step: &PreparedStep) -> Result<Invocation> {
        (**self).invoke(step)
    }
}

/// Runs each step as a bash command line, recording it in its own log dir.
pub struct ScriptInvoker {
    /// Commands for tool ids that don't map directly to an executable
    tools: HashMap<String, String>,
    /// Filesystem interface
    fs: Fs,
    /// $OUTPUT/logs
    log_root: PathBuf,
    verbose: bool,
    pathbuf: PathBuf,
    strbuf: String,
}

impl ScriptInvoker {
    pub fn new(tools: HashMap<String, String>, fs: Fs, log_root: PathBuf, verbose: bool) -> Self {
        Self {
            tools,
            fs,
            log_root,
            verbose,
            pathbuf: PathBuf::with_capacity(256),
            strbuf: String::with_capacity(1024),
        }
    }

    /// The command that runs `tool`: its declared command, or the tool id itself.
    pub fn program<'a>(&'a self, tool: &'a str) -> &'a str {
        self.tools.get(tool).map(String::as_str).unwrap_or(tool)
    }

    /// Full command line for `step`.
    pub fn command_line(&self, step: &PreparedStep) -> String {
        let mut buf = String::with_capacity(256);
        command_line(self.program(&step.tool), &step.params, &mut buf);
        buf
    }

    fn stderr_tail(&mut self, step_dir: &std::path::Path) -> Result<Option<String>> {
        let stderr = self.fs.stderr(step_dir, &mut self.pathbuf).to_path_buf();
        self.fs
            .read_to_buf(&stderr, &mut self.strbuf)
            .context("reading stderr.txt of failed step")?;
        let lines: Vec<&str> = self.strbuf.lines().collect();
        if lines.iter().all(|line| line.trim().is_empty()) {
            return Ok(None);
        }
        let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
        Ok(Some(lines[start..].join("\n")))
    }
}

impl ToolInvoker for ScriptInvoker {
    fn invoke(&mut self, step: &PreparedStep) -> Result<Invocation> {
        let step_dir = self
            .fs
            .step_dir(&self.log_root, &step.plan, step.index, &step.name, &mut self.pathbuf)
            .to_path_buf();
        self.fs.create_dir(&step_dir).context("creating step log dir")?;

        let command_line = self.command_line(step);
        if self.verbose {
            eprintln!("{} {command_line}", "COMMAND".magenta());
        }

        let mut script = StepScriptBuilder::new(&mut self.strbuf);
        script.write_prefix();
        script.write_cd(&step.workdir);
        script.write_command(&command_line);
        let step_sh = self.fs.step_sh(&step_dir, &mut self.pathbuf).to_path_buf();
        self.fs
            .write_file(&step_sh, &self.strbuf)
            .context("writing step.sh")?;

        // run the recorded script itself, so step.sh is exactly what ran:
        let mut cmd = Command::new("/usr/bin/env");
        cmd.arg("bash").arg(&step_sh);
        cmd.current_dir(&step.workdir);

        let status = run_cmd(&mut cmd, &step_dir, &self.fs, &mut self.pathbuf, self.verbose)?;
        if status.success() {
            return Ok(Invocation::succeeded());
        }

        let diagnostics = match self.stderr_tail(&step_dir)? {
            Some(tail) => format!("{status}; last lines of stderr:\n{tail}"),
            None => status.to_string(),
        };
        Ok(Invocation::failed(diagnostics))
    }
}
