/// type alias just to make type signatures look more consistent.
pub type Ident<'a> = &'a str;

/// The right-hand side of any value expression.
#[derive(Debug, PartialEq, Eq)]
pub enum Rhs<'a> {
    /// "some quoted value" (always a string, never re-typed)
    Literal { val: &'a str },
    /// unquoted_value_without_spaces (typed later: bool, int, float or string)
    Bare { val: &'a str },
    /// $var
    Variable { name: Ident<'a> },
    /// "foo-$bla-${blee}.MS"
    Interp { text: &'a str, vars: Vec<Ident<'a>> },
    /// [rhs1, rhs2, [rhs3]]
    List(Vec<Rhs<'a>>),
}

// These methods are just to assist with writing more legible tests.
#[cfg(test)]
impl<'a> Rhs<'a> {
    pub fn literal(val: &'a str) -> Self {
        Self::Literal { val }
    }
    pub fn bare(val: &'a str) -> Self {
        Self::Bare { val }
    }
    pub fn variable(name: Ident<'a>) -> Self {
        Self::Variable { name }
    }
    pub fn interp(text: &'a str, vars: Vec<Ident<'a>>) -> Self {
        Self::Interp { text, vars }
    }
}

/// One part of the header of a [`TaskBlock`].
#[derive(Debug, PartialEq, Eq)]
pub enum BlockSpec<'a> {
    /// label "text"
    Label(Rhs<'a>),
    /// < input_dir
    Input(Rhs<'a>),
    /// > output_dir
    Output(Rhs<'a>),
}

/// A task definition:
/// `task name : tool label "..." < in > out { key = value ... }`
#[derive(Debug, PartialEq, Eq)]
pub struct TaskBlock<'a> {
    /// Task name
    pub name: Ident<'a>,
    /// Identifier of the external tool that runs this task
    pub tool: &'a str,
    /// Header components
    pub specs: Vec<BlockSpec<'a>>,
    /// Parameters passed to the tool, in declaration order
    pub params: Vec<(Ident<'a>, Rhs<'a>)>,
}

/// One line of a [`Plan`].
#[derive(Debug, PartialEq, Eq)]
pub enum PlanEntry<'a> {
    /// Name of a task to run.
    Task(Ident<'a>),
    /// `snapshot src dst`: copy a dataset in the msdir after the plan succeeds.
    Snapshot { src: Rhs<'a>, dst: Rhs<'a> },
}

/// A named, ordered list of tasks.
#[derive(Debug, PartialEq, Eq)]
pub struct Plan<'a> {
    /// Plan name
    pub name: &'a str,
    /// Entries in the order they were written
    pub entries: Vec<PlanEntry<'a>>,
}

/// One high-level item in a recipe file.
#[derive(Debug, PartialEq, Eq)]
pub enum Item<'a> {
    /// A block of config variables.
    GlobalConfig(Vec<(Ident<'a>, Rhs<'a>)>),
    /// A block of root directory assignments.
    Roots(Vec<(Ident<'a>, Rhs<'a>)>),
    /// `tool id = "command"`
    Tool(&'a str, Rhs<'a>),
    /// A task definition.
    Task(TaskBlock<'a>),
    /// A [`Plan`].
    Plan(Plan<'a>),
}
