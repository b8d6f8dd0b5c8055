use std::path::PathBuf;

use anyhow::Result;

use syntax::ast;

use crate::value::{self, create_value, Globals, ParamValue};
use crate::Error;

/// A named step that runs one external tool with a fixed set of parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique name within a registry
    pub name: String,
    /// Identifier of the external tool (e.g. "casa_flagdata")
    pub tool: String,
    /// Parameters in declaration order
    pub params: Vec<(String, ParamValue)>,
    /// Input directory for this task, if it differs from the run's input root
    pub input: Option<PathBuf>,
    /// Output directory for this task, if it differs from the run's output root
    pub output: Option<PathBuf>,
    /// Human-readable label, e.g. "quack_flagging:: Quack flagging"
    pub label: String,
}

impl Task {
    /// Create a task with no params, default dirs, and its name as a label.
    pub fn new(name: &str, tool: &str) -> Self {
        Self {
            name: name.to_owned(),
            tool: tool.to_owned(),
            params: Vec::new(),
            input: None,
            output: None,
            label: name.to_owned(),
        }
    }

    pub fn with_param(mut self, key: &str, val: ParamValue) -> Self {
        self.params.push((key.to_owned(), val));
        self
    }

    pub fn with_input(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input = Some(dir.into());
        self
    }

    pub fn with_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    /// The part of the label before "::" (or after it, if nothing comes before).
    pub fn short_label(&self) -> &str {
        match self.label.split_once("::") {
            Some((short, _)) if !short.trim().is_empty() => short.trim(),
            Some((_, long)) => long.trim(),
            None => self.label.trim(),
        }
    }

    /// Create a new task from its ast representation.
    pub fn create(block: &ast::TaskBlock, globals: &Globals) -> Result<Self> {
        let mut task = Self::new(block.name, block.tool);
        task.params.reserve(block.params.len());

        let mut label = None;
        for spec in &block.specs {
            match spec {
                ast::BlockSpec::Label(rhs) => {
                    if label.is_some() {
                        return Err(Error::Redefined("Label", block.name.to_owned()).into());
                    }
                    label = Some(scalar_text(rhs, globals, "label")?);
                }
                ast::BlockSpec::Input(rhs) => {
                    if task.input.is_some() {
                        return Err(Error::Redefined("Input dir", block.name.to_owned()).into());
                    }
                    task.input = Some(scalar_text(rhs, globals, "input dir")?.into());
                }
                ast::BlockSpec::Output(rhs) => {
                    if task.output.is_some() {
                        return Err(Error::Redefined("Output dir", block.name.to_owned()).into());
                    }
                    task.output = Some(scalar_text(rhs, globals, "output dir")?.into());
                }
            }
        }
        if let Some(label) = label {
            task.label = label;
        }

        for (key, rhs) in &block.params {
            if task.params.iter().any(|(k, _)| k == key) {
                return Err(Error::Redefined("Parameter", format!("{}.{key}", block.name)).into());
            }
            let val = create_value(rhs, globals)?;
            task.params.push(((*key).to_owned(), val));
        }

        Ok(task)
    }
}

fn scalar_text(rhs: &ast::Rhs, globals: &Globals, what: &str) -> Result<String> {
    match create_value(rhs, globals)? {
        ParamValue::List(_) => Err(value::Error::UnexpectedList(what.to_owned()).into()),
        val => Ok(val.to_string()),
    }
}
