use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Recursive copies
mod ops;

/// Defines fns for creating common paths in the log directory
mod paths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path is neither file nor dir: {0}")]
    UnknownPathType(String),
    #[error("Specified directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
    #[error("Copy destination \"{0}\" already exists")]
    AlreadyExists(String),
}

/// All file operations in the crate should go through this struct.
///
/// All destructive operations check that the path in question is a child of
/// one of the whitelisted prefixes (the workdir and the output and ms dirs),
/// otherwise they will not be performed. Tools launched by a step are not
/// bound by this; they write wherever their parameters tell them to.
#[derive(Debug, Clone)]
pub struct Fs {
    /// The directories we are allowed to modify
    whitelist: Vec<PathBuf>,
    /// if true, prevents all destructive operations
    dry_run: bool,
}

impl Fs {
    /// Create a new `Fs` that may modify anything under `whitelist`.
    pub fn new<T: AsRef<Path>>(whitelist: &[T], dry_run: bool) -> Self {
        Self {
            whitelist: whitelist.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            dry_run,
        }
    }

    /// Also allow modifying anything under `dir`.
    pub fn allow<T: AsRef<Path>>(&mut self, dir: T) {
        let dir = dir.as_ref();
        if !self.is_whitelisted(dir) {
            self.whitelist.push(dir.to_path_buf());
        }
    }

    /// Check whether `dir` exists, and create it if not.
    pub fn ensure_dir_exists(&self, dir: &Path, verbose: bool) -> Result<()> {
        if !dir.exists() {
            if self.dry_run {
                eprintln!("Dry run. Not creating directory {:?}", dir);
            } else {
                if verbose {
                    eprintln!("Directory {:?} doesn't exist. Creating.", dir);
                }
                self.create_dir(dir)?;
            }
        } else if !dir.is_dir() {
            return Err(
                Error::NotDirectory(dir.to_str().ok_or(PathEncodingError)?.to_string()).into(),
            );
        } else if verbose {
            eprintln!("Directory {:?} already exists. Not creating.", dir);
        }
        Ok(())
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))?;
        Ok(())
    }

    /// Create a file, and return a writable `File` handle.
    pub fn create_file<T: AsRef<Path>>(&self, path: T) -> Result<fs::File> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        let f = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        Ok(f)
    }

    /// Write entire str to a file.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, text).with_context(|| format!("writing file {:?}", path))?;
        Ok(())
    }

    /// Copy `src` to `tgt`, recursively if `src` is a directory.
    /// Fails if `tgt` already exists.
    pub fn copy<T: AsRef<Path>, U: AsRef<Path>>(&self, src: T, tgt: U) -> Result<()> {
        let (src, tgt) = (src.as_ref(), tgt.as_ref());
        self.check_whitelist(tgt)?;
        if self.exists(tgt) {
            return Err(
                Error::AlreadyExists(tgt.to_str().ok_or(PathEncodingError)?.to_owned()).into(),
            );
        }
        ops::copy(src, tgt).with_context(|| format!("copying {:?} to {:?}", src, tgt))?;
        Ok(())
    }

    /// Read entire file into a String.
    pub fn read_to_buf<T: AsRef<Path>>(&self, path: T, strbuf: &mut String) -> Result<()> {
        use std::io::Read;
        let path = path.as_ref();
        strbuf.clear();
        let cap = fs::metadata(path)?.len() as usize;
        if cap > strbuf.capacity() {
            strbuf.reserve(cap);
        }
        let mut f = fs::File::open(path)?;
        f.read_to_string(strbuf)?;
        Ok(())
    }

    fn is_whitelisted(&self, path: &Path) -> bool {
        self.whitelist.iter().any(|prefix| path.starts_with(prefix))
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if self.dry_run || !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_whitelist() -> Result<()> {
        let dir = tempdir()?;
        let output = dir.path().join("output");
        let msdir = dir.path().join("msdir");
        let fs = Fs::new(&[&output, &msdir], false);

        fs.create_dir(output.join("logs"))?;
        fs.create_dir(msdir.join("lh.MS"))?;
        assert!(msdir.join("lh.MS").is_dir());

        let err = fs.create_dir(dir.path().join("elsewhere")).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotWhitelisted(_))));
        Ok(())
    }

    #[test]
    fn test_allow_extends_whitelist() -> Result<()> {
        let dir = tempdir()?;
        let elsewhere = tempdir()?;
        let images = elsewhere.path().join("images");
        let mut fs = Fs::new(&[dir.path()], false);
        fs.ensure_dir_exists(&images, false).unwrap_err();

        fs.allow(&images);
        fs.allow(images.join("nested"));
        assert_eq!(2, fs.whitelist.len());
        fs.ensure_dir_exists(&images, false)?;
        assert!(images.is_dir());
        fs.create_dir(elsewhere.path().join("other")).unwrap_err();
        Ok(())
    }

    #[test]
    fn test_dry_run_blocks_writes() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(&[dir.path()], true);
        fs.create_dir(dir.path().join("output")).unwrap_err();
        fs.ensure_dir_exists(&dir.path().join("output"), false)?;
        assert!(!dir.path().join("output").exists());
        Ok(())
    }

    #[test]
    fn test_copy_refuses_existing_target() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(&[dir.path()], false);
        fs.write_file(dir.path().join("a.txt"), "a")?;
        fs.write_file(dir.path().join("b.txt"), "b")?;

        let err = fs.copy(dir.path().join("a.txt"), dir.path().join("b.txt")).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::AlreadyExists(_))));

        let mut buf = String::new();
        fs.read_to_buf(dir.path().join("b.txt"), &mut buf)?;
        assert_eq!("b", buf);
        Ok(())
    }
}
