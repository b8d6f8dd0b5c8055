use std::path::{Path, PathBuf};

use super::Fs;

/// Utility fns for making the paths used to record step execution.
///
/// Layout: `$OUTPUT/logs/<plan>/<NN>-<task>/{step.sh,stdout.txt,stderr.txt}`
impl Fs {
    /// $OUTPUT/logs
    pub fn log_root<'a>(&self, output: &Path, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(output, "logs", buf)
    }

    /// $OUTPUT/logs/plan/NN-task
    ///
    /// `index` is the step's zero-based position in its plan, so steps that
    /// run the same task more than once each get their own dir.
    pub fn step_dir<'a>(
        &self,
        log_root: &Path,
        plan: &str,
        index: usize,
        task: &str,
        buf: &'a mut PathBuf,
    ) -> &'a Path {
        self.parts3(log_root, plan, format!("{:02}-{task}", index + 1), buf)
    }

    /// $OUTPUT/logs/plan/NN-task/stdout.txt
    pub fn stdout<'a>(&self, step_dir: &Path, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(step_dir, "stdout.txt", buf)
    }

    /// $OUTPUT/logs/plan/NN-task/stderr.txt
    pub fn stderr<'a>(&self, step_dir: &Path, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(step_dir, "stderr.txt", buf)
    }

    /// $OUTPUT/logs/plan/NN-task/step.sh
    pub fn step_sh<'a>(&self, step_dir: &Path, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(step_dir, "step.sh", buf)
    }

    fn parts2<'a, T, U>(&self, p1: T, p2: U, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        &*buf
    }

    fn parts3<'a, T, U, V>(&self, p1: T, p2: U, p3: V, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
        V: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        buf.push(p3);
        &*buf
    }
}
