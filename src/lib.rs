/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Plan execution
mod exec;
/// Filesystem operations
mod fs;
/// Record of step attempts
mod run_log;
/// Combined command-line and recipe file run settings
mod settings;
/// Text UI
mod ui;

pub use app::App;
pub use args::Args;
pub use exec::{
    Error as ExecError, Executor, Invocation, PreparedStep, RunReport, RunState, ScriptInvoker,
    StepExecutionError, StepState, ToolInvoker,
};
pub use run_log::{RunLog, StepResult, StepStatus, Summary};
pub use settings::Settings;

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    // RUN THE THING /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}
