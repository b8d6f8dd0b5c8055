use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::args::Args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid set flag '{0}' (should be formatted 'key=value')")]
    InvalidSetFlag(String),
    #[error("recipe file \"{0}\" not found")]
    RecipeNotFound(String),
    #[error("working directory \"{0}\" not found")]
    WorkdirNotFound(String),
    #[error("Invalid recipe path has no parent (should not happen)")]
    RecipeHasNoParent,
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    /// canonicalized recipe file path
    pub recipe: PathBuf,
    /// canonicalized working directory
    pub workdir: PathBuf,
    /// root dirs from the command line; relative ones are relative to `workdir`
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub msdir: Option<PathBuf>,
    /// (name, value) pairs from `--set`
    pub overrides: Vec<(String, String)>,
    pub plans: Vec<String>,
    pub tasks: Vec<String>,
    pub list: bool,
    pub yes: bool,
    pub verbose: u8,
    pub dry_run: bool,
}

impl Settings {
    /// Resolve a root dir against the working directory.
    pub fn in_workdir<T: AsRef<Path>>(&self, dir: T) -> PathBuf {
        self.workdir.join(dir)
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let recipe = PathBuf::from(&args.recipe);
        if !recipe.is_file() {
            return Err(Error::RecipeNotFound(args.recipe).into());
        }
        let recipe = recipe.canonicalize().context("locating recipe file")?;

        let workdir = match &args.workdir {
            Some(dir) => PathBuf::from(dir),
            None => recipe.parent().ok_or(Error::RecipeHasNoParent)?.to_path_buf(),
        };
        if !workdir.is_dir() {
            return Err(Error::WorkdirNotFound(workdir.to_string_lossy().into_owned()).into());
        }
        let workdir = workdir.canonicalize().context("locating working directory")?;

        let overrides = args
            .set
            .iter()
            .map(|flag| {
                flag.split_once('=')
                    .filter(|(k, _)| !k.is_empty())
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .ok_or_else(|| Error::InvalidSetFlag(flag.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            recipe,
            workdir,
            input: args.input.map(PathBuf::from),
            output: args.output.map(PathBuf::from),
            msdir: args.msdir.map(PathBuf::from),
            overrides,
            plans: args.plans,
            tasks: args.tasks,
            list: args.list,
            yes: args.yes,
            verbose: args.verbose,
            dry_run: args.dry_run,
        })
    }
}
