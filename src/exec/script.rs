use std::fmt::Write;
use std::path::Path;

use recipe::ParamValue;

/// Utility for building the contents of a `step.sh` script file.
/// Note that it modifies a String reference held internally;
/// read that String to get the script's contents.
#[derive(Debug)]
pub struct StepScriptBuilder<'a> {
    strbuf: &'a mut String,
}

impl<'a> StepScriptBuilder<'a> {
    pub fn new(strbuf: &'a mut String) -> Self {
        Self { strbuf }
    }
}

impl StepScriptBuilder<'_> {
    /// shebang line and bash options
    pub fn write_prefix(&mut self) {
        self.strbuf.clear();
        self.strbuf.push_str("#!/usr/bin/env bash\nset -euo pipefail\n\n");
    }

    /// cd to the dir the step runs in
    pub fn write_cd(&mut self, dir: &Path) {
        self.strbuf.push_str("cd ");
        push_quoted(&dir.to_string_lossy(), self.strbuf);
        self.strbuf.push('\n');
    }

    /// the tool invocation itself
    pub fn write_command(&mut self, command_line: &str) {
        self.strbuf.push_str(command_line);
        self.strbuf.push('\n');
    }
}

/// Render the command line for `program` called with `params`:
/// one `--key=value` argument per param, in order.
///
/// `program` is inserted as-is, so a tool declared as e.g.
/// `"stimela-cab casa_flagdata"` expands to several words.
pub fn command_line(program: &str, params: &[(String, ParamValue)], buf: &mut String) {
    buf.clear();
    buf.push_str(program);
    let mut arg = String::with_capacity(64);
    for (key, val) in params {
        arg.clear();
        // writing to a String can't fail:
        let _ = write!(arg, "--{key}={val}");
        buf.push(' ');
        push_quoted(&arg, buf);
    }
}

/// Push `word` onto `buf`, single-quoting it if bash would otherwise
/// split or expand it.
fn push_quoted(word: &str, buf: &mut String) {
    let is_plain = |c: char| c.is_ascii_alphanumeric() || "-_=./,:+@%~".contains(c);
    if !word.is_empty() && word.chars().all(is_plain) && !word.starts_with('~') {
        buf.push_str(word);
    } else {
        buf.push('\'');
        buf.push_str(&word.replace('\'', r"'\''"));
        buf.push('\'');
    }
}
