use clap::{ArgAction, Parser};

const CMD_NAME: &str = "cabflow";
const DEFAULT_RECIPE: &str = "recipe.cab";

/// Stores our command-line args format.
#[derive(Parser, Debug, Default)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Recipe file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_RECIPE)]
    #[arg(env = "CABFLOW_RECIPE")]
    pub recipe: String,

    /// Name of plan to run (repeat to run several, in order)
    #[arg(short, long = "plan", value_name = "PLAN")]
    pub plans: Vec<String>,

    /// Name of task to run (repeat to run several, in order)
    #[arg(short, long = "task", value_name = "TASK")]
    pub tasks: Vec<String>,

    /// List tasks and plans defined in the recipe
    #[arg(short, long)]
    pub list: bool,

    /// Working directory (defaults to the recipe's directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    #[arg(env = "CABFLOW_WORKDIR")]
    pub workdir: Option<String>,

    /// Input root directory
    #[arg(long, value_name = "DIR")]
    pub input: Option<String>,

    /// Output root directory
    #[arg(long, value_name = "DIR")]
    pub output: Option<String>,

    /// Measurement set directory
    #[arg(long, value_name = "DIR")]
    pub msdir: Option<String>,

    /// Override a global variable
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Bypass user confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print additional info (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Dry run; print commands but don't run or modify anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
