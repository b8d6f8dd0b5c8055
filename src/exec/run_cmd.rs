use std::fs::File;
use std::io::{stderr, stdout, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use colored::Colorize;

use crate::fs::Fs;

/// Run a subprocess, teeing its stdout and stderr to the terminal and to
/// `stdout.txt`/`stderr.txt` in `step_dir`.
/// Based on:
/// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
pub fn run_cmd(
    cmd: &mut Command,
    step_dir: &Path,
    fs: &Fs,
    pathbuf: &mut PathBuf,
    verbose: bool,
) -> Result<ExitStatus> {
    let (out_file, err_file) = make_log_files(fs, step_dir, pathbuf)?;

    if verbose {
        eprintln!("{}", "Running command...".magenta());
    }
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "failed to execute child process {:?} {:?}",
                cmd.get_program(),
                cmd.get_args().collect::<Vec<_>>(),
            )
        })?;

    let child_out = child.stdout.take().ok_or_else(|| anyhow!("Cannot attach to child stdout"))?;
    let child_err = child.stderr.take().ok_or_else(|| anyhow!("Cannot attach to child stderr"))?;

    let thread_out = thread::spawn(move || communicate(child_out, out_file, stdout()));
    let thread_err = thread::spawn(move || communicate(child_err, err_file, stderr()));

    let status = finish(&mut child, thread_out, thread_err)?;

    if verbose {
        eprintln!("\n{} with {status}.", "Process finished".green());
    }
    Ok(status)
}

type Pump = JoinHandle<std::io::Result<()>>;

/// Wait for both stream pumps, then for the child.
/// If a pump fails, the child is killed and reaped before the error is returned.
fn finish(child: &mut Child, thread_out: Pump, thread_err: Pump) -> Result<ExitStatus> {
    let out = join_pump(thread_out, "stdout");
    if out.is_err() {
        // the stderr pump only finishes once the child is gone:
        reap(child);
    }
    let err = join_pump(thread_err, "stderr");
    if out.is_ok() && err.is_err() {
        reap(child);
    }
    out.and(err)?;
    child.wait().context("failed to wait on child process")
}

fn join_pump(pump: Pump, stream: &str) -> Result<()> {
    pump.join()
        .map_err(|_| anyhow!("Error joining {stream} thread"))?
        .with_context(|| format!("error communicating with child {stream}"))
}

fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("couldn't kill child process {}: {e}", child.id());
    }
    if let Err(e) = child.wait() {
        log::warn!("couldn't wait on child process {}: {e}", child.id());
    }
}

fn communicate<R: Read, W: Write>(
    mut stream: R,
    mut file: File,
    mut output: W,
) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        file.write_all(buf)?;
        output.write_all(buf)?;
    }

    Ok(())
}

fn make_log_files(fs: &Fs, step_dir: &Path, pathbuf: &mut PathBuf) -> Result<(File, File)> {
    let out_file = fs
        .create_file(fs.stdout(step_dir, pathbuf))
        .context("creating stdout.txt file")?;

    let err_file = fs
        .create_file(fs.stderr(step_dir, pathbuf))
        .context("creating stderr.txt file")?;

    Ok((out_file, err_file))
}
