use anyhow::{Context, Result};

use syntax::ast;
use util::HashMap;

use crate::value::{self, create_value, Globals, ParamValue};
use crate::{Error, Phase, Task, TaskRegistry};

/// Root directories as written in a recipe's `roots` block (not yet joined to a workdir).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RootDirs {
    pub input: Option<String>,
    pub output: Option<String>,
    pub msdir: Option<String>,
}

/// Everything defined in a recipe file.
#[derive(Debug, Default)]
pub struct Recipe {
    /// Global variables, after command-line overrides
    pub globals: Globals,
    /// Root dirs set in the recipe
    pub roots: RootDirs,
    /// Commands for tool ids that don't map directly to an executable
    pub tools: HashMap<String, String>,
    /// All defined tasks
    pub registry: TaskRegistry,
    /// All defined plans, in definition order
    pub phases: Vec<Phase>,
}

impl Recipe {
    /// Build a recipe from parsed items.
    ///
    /// `overrides` replace global variables of the same name at the point they are
    /// defined, so other globals built from them see the new value. Overrides for
    /// names the recipe doesn't define are added as new globals.
    pub fn load(items: Vec<ast::Item>, overrides: &[(String, String)]) -> Result<Self> {
        let mut recipe = Self::default();

        // globals first, so that items can reference them regardless of file order:
        for item in &items {
            if let ast::Item::GlobalConfig(vars) = item {
                recipe.add_globals(vars, overrides)?;
            }
        }
        for (k, v) in overrides {
            if !recipe.globals.contains_key(k) {
                log::debug!("adding global ${k} from command line");
                recipe.globals.insert(k.clone(), ParamValue::from_bare(v));
            }
        }

        for item in items {
            match item {
                ast::Item::GlobalConfig(_) => (),
                ast::Item::Roots(assignments) => recipe.add_roots(&assignments)?,
                ast::Item::Tool(id, rhs) => recipe.add_tool(id, &rhs)?,
                ast::Item::Task(block) => {
                    let task = Task::create(&block, &recipe.globals)
                        .with_context(|| format!("while loading task \"{}\"", block.name))?;
                    recipe.registry.register(task)?;
                }
                ast::Item::Plan(plan) => {
                    if recipe.phases.iter().any(|p| p.plan.name == plan.name) {
                        return Err(Error::Redefined("Plan", plan.name.to_owned()).into());
                    }
                    let phase = Phase::create(&plan, &recipe.globals)
                        .with_context(|| format!("while loading plan \"{}\"", plan.name))?;
                    recipe.phases.push(phase);
                }
            }
        }

        log::debug!(
            "Loaded recipe with {} globals, {} tools, {} tasks and {} plans",
            recipe.globals.len(),
            recipe.tools.len(),
            recipe.registry.len(),
            recipe.phases.len(),
        );

        Ok(recipe)
    }

    /// Get the phase defined by plan `name`.
    pub fn phase(&self, name: &str) -> Result<&Phase, Error> {
        self.phases
            .iter()
            .find(|phase| phase.plan.name == name)
            .ok_or_else(|| Error::ItemNotFound("Plan", name.to_owned()))
    }

    fn add_globals(&mut self, vars: &[(&str, ast::Rhs)], overrides: &[(String, String)]) -> Result<()> {
        for (k, rhs) in vars {
            if self.globals.contains_key(*k) {
                return Err(Error::Redefined("Global variable", (*k).to_owned()).into());
            }
            let val = match overrides.iter().rev().find(|(name, _)| name.as_str() == *k) {
                Some((_, v)) => {
                    log::info!("overriding global ${k} with \"{v}\"");
                    ParamValue::from_bare(v)
                }
                None => create_value(rhs, &self.globals)
                    .with_context(|| format!("while defining global ${k}"))?,
            };
            self.globals.insert((*k).to_owned(), val);
        }
        Ok(())
    }

    fn add_roots(&mut self, assignments: &[(&str, ast::Rhs)]) -> Result<()> {
        for (k, rhs) in assignments {
            let dir = match create_value(rhs, &self.globals)? {
                ParamValue::List(_) => {
                    return Err(value::Error::UnexpectedList(format!("root {k}")).into())
                }
                val => val.to_string(),
            };
            let slot = match *k {
                "input" => &mut self.roots.input,
                "output" => &mut self.roots.output,
                "msdir" => &mut self.roots.msdir,
                other => return Err(Error::UnknownRoot(other.to_owned()).into()),
            };
            if slot.is_some() {
                return Err(Error::Redefined("Root", (*k).to_owned()).into());
            }
            *slot = Some(dir);
        }
        Ok(())
    }

    fn add_tool(&mut self, id: &str, rhs: &ast::Rhs) -> Result<()> {
        if self.tools.contains_key(id) {
            return Err(Error::Redefined("Tool", id.to_owned()).into());
        }
        let cmd = match create_value(rhs, &self.globals)? {
            ParamValue::List(_) => {
                return Err(value::Error::UnexpectedList(format!("tool {id}")).into())
            }
            val => val.to_string(),
        };
        self.tools.insert(id.to_owned(), cmd);
        Ok(())
    }
}
