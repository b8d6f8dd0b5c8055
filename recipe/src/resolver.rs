use std::path::{Path, PathBuf};

use crate::{Error, ParamValue, PathRef, Task};

/// Root directories that path references are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Directory holding the measurement set(s) being reduced.
    pub msdir: PathBuf,
}

impl Roots {
    /// Get the root directory for `role`, if it is one we know about.
    pub fn get(&self, role: &str) -> Option<&Path> {
        match role {
            "input" => Some(&self.input),
            "output" => Some(&self.output),
            "msdir" => Some(&self.msdir),
            _ => None,
        }
    }
}

/// Immutable configuration for a single run, built once from the command line
/// and the recipe file and then shared by everything that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Directory that relative paths are interpreted against.
    pub workdir: PathBuf,
    /// Roots used by tasks that don't declare their own input/output dirs.
    pub roots: Roots,
}

impl RunConfig {
    pub fn new(workdir: PathBuf, roots: Roots) -> Self {
        Self { workdir, roots }
    }

    /// The run's roots, with `task`'s own input and output dirs (if any) swapped in.
    pub fn roots_for(&self, task: &Task) -> Roots {
        let mut roots = self.roots.clone();
        if let Some(input) = &task.input {
            roots.input = self.workdir.join(input);
        }
        if let Some(output) = &task.output {
            roots.output = self.workdir.join(output);
        }
        roots
    }
}

/// Turns [`PathRef`]s in parameter values into concrete paths.
#[derive(Debug)]
pub struct PathResolver;

impl PathResolver {
    /// Resolve `value` against `roots`.
    ///
    /// References become `root/name`; lists are resolved element by element;
    /// everything else (including empty strings) is returned unchanged.
    pub fn resolve(&self, value: &ParamValue, roots: &Roots) -> Result<ParamValue, Error> {
        match value {
            ParamValue::Ref(path_ref) => self.resolve_ref(path_ref, roots).map(ParamValue::Path),
            ParamValue::List(vals) => vals
                .iter()
                .map(|val| self.resolve(val, roots))
                .collect::<Result<_, _>>()
                .map(ParamValue::List),
            other => Ok(other.clone()),
        }
    }

    /// Resolve every value in a list of (key, value) params, keeping their order.
    pub fn resolve_params(
        &self,
        params: &[(String, ParamValue)],
        roots: &Roots,
    ) -> Result<Vec<(String, ParamValue)>, Error> {
        params
            .iter()
            .map(|(key, val)| self.resolve(val, roots).map(|val| (key.clone(), val)))
            .collect()
    }

    fn resolve_ref(&self, path_ref: &PathRef, roots: &Roots) -> Result<PathBuf, Error> {
        let root = roots.get(&path_ref.role).ok_or_else(|| {
            Error::UnresolvableRole(path_ref.name.clone(), path_ref.role.clone())
        })?;
        Ok(root.join(&path_ref.name))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roots() -> Roots {
        Roots {
            input: PathBuf::from("/data/input"),
            output: PathBuf::from("/data/output"),
            msdir: PathBuf::from("/data/msdir"),
        }
    }

    fn text(s: &str) -> ParamValue {
        ParamValue::from_text(s)
    }

    fn path(s: &str) -> ParamValue {
        ParamValue::Path(PathBuf::from(s))
    }

    #[test]
    fn test_resolve_ref() -> Result<(), Error> {
        let roots = roots();
        assert_eq!(
            path("/data/output/mytable"),
            PathResolver.resolve(&text("mytable:output"), &roots)?
        );
        assert_eq!(
            path("/data/msdir/lh.MS"),
            PathResolver.resolve(&text("lh.MS:msdir"), &roots)?
        );
        assert_eq!(
            path("/data/input/rfi_mask.pickle"),
            PathResolver.resolve(&text("rfi_mask.pickle:input"), &roots)?
        );
        Ok(())
    }

    #[test]
    fn test_passthrough() -> Result<(), Error> {
        let roots = roots();
        for val in [
            text(""),
            text("0:50~206"),
            text("/already/concrete"),
            ParamValue::Int(7),
            ParamValue::Float(0.05),
            ParamValue::Bool(false),
            path("/data/output/x"),
        ] {
            let resolved = PathResolver.resolve(&val, &roots)?;
            assert_eq!(val, resolved);
            // idempotent:
            assert_eq!(resolved, PathResolver.resolve(&resolved, &roots)?);
        }
        Ok(())
    }

    #[test]
    fn test_resolve_lists() -> Result<(), Error> {
        let roots = roots();
        let list = ParamValue::List(vec![text("x:output"), text("y:output")]);
        assert_eq!(
            ParamValue::List(vec![path("/data/output/x"), path("/data/output/y")]),
            PathResolver.resolve(&list, &roots)?
        );

        let nested = ParamValue::List(vec![
            ParamValue::List(vec![text("a.G0:output"), text("")]),
            ParamValue::List(vec![]),
            text("nearest"),
        ]);
        assert_eq!(
            ParamValue::List(vec![
                ParamValue::List(vec![path("/data/output/a.G0"), text("")]),
                ParamValue::List(vec![]),
                text("nearest"),
            ]),
            PathResolver.resolve(&nested, &roots)?
        );
        Ok(())
    }

    #[test]
    fn test_unresolvable_role() {
        let err = PathResolver
            .resolve(&ParamValue::List(vec![text("x:scratch")]), &roots())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvableRole(name, role) if name == "x" && role == "scratch"
        ));
    }

    #[test]
    fn test_roots_for_task() {
        let config = RunConfig::new(PathBuf::from("/work"), roots());
        let task = Task::new("image", "wsclean").with_output("output_lh");
        let task_roots = config.roots_for(&task);
        assert_eq!(PathBuf::from("/work/output_lh"), task_roots.output);
        assert_eq!(PathBuf::from("/data/input"), task_roots.input);

        let task = Task::new("image", "wsclean").with_input("/abs/in");
        assert_eq!(PathBuf::from("/abs/in"), config.roots_for(&task).input);
        assert_eq!(config.roots, config.roots_for(&Task::new("t", "x")));
    }
}
