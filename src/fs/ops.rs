use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use util::PathEncodingError;

use super::Error;

/// Copy `src` to `tgt`, recursively if needed.
///
/// Measurement sets are directory trees, and may contain links between
/// their own subtables; those are re-pointed into the copy.
pub fn copy(src: &Path, tgt: &Path) -> Result<()> {
    if src.is_symlink() {
        symlink(&fs::read_link(src)?, tgt)
    } else if src.is_file() {
        fs::copy(src, tgt)?;
        Ok(())
    } else if src.is_dir() {
        let tree = TreeCopy { src_root: src, tgt_root: tgt };
        tree.copy_dir(src, tgt)
    } else {
        Err(Error::UnknownPathType(src.to_str().ok_or(PathEncodingError)?.to_owned()).into())
    }
}

struct TreeCopy<'a> {
    src_root: &'a Path,
    tgt_root: &'a Path,
}

impl TreeCopy<'_> {
    fn copy_dir(&self, src: &Path, tgt: &Path) -> Result<()> {
        fs::create_dir_all(tgt)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let ty = entry.file_type()?;
            let src_entry = entry.path();
            let tgt_entry = tgt.join(entry.file_name());
            if ty.is_symlink() {
                let link_tgt = self.relink(fs::read_link(&src_entry)?)?;
                symlink(&link_tgt, &tgt_entry)?;
            } else if ty.is_dir() {
                self.copy_dir(&src_entry, &tgt_entry)?;
            } else if ty.is_file() {
                fs::copy(&src_entry, &tgt_entry)?;
            } else {
                return Err(Error::UnknownPathType(
                    src_entry.to_str().ok_or(PathEncodingError)?.to_owned(),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Links inside the source tree point to the same place in the target tree;
    /// anything else keeps its original target.
    fn relink(&self, link_tgt: PathBuf) -> Result<PathBuf> {
        if link_tgt.starts_with(self.src_root) {
            Ok(self.tgt_root.join(link_tgt.strip_prefix(self.src_root)?))
        } else {
            Ok(link_tgt)
        }
    }
}

/// Symlink the given `link` to `tgt`.
fn symlink(tgt: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(tgt, link)?;

    #[cfg(windows)]
    if tgt.is_dir() {
        std::os::windows::fs::symlink_dir(tgt, link)?;
    } else {
        std::os::windows::fs::symlink_file(tgt, link)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_file() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("flags.txt");
        fs::write(&src, "quack 30s")?;

        let tgt = dir.path().join("flags.bak");
        copy(&src, &tgt)?;

        assert_eq!("quack 30s", fs::read_to_string(&tgt)?);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_measurement_set() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("msdir/lh.MS");
        let antenna = src.join("ANTENNA");
        fs::create_dir_all(&antenna)?;
        fs::write(src.join("table.dat"), "main table")?;
        fs::write(antenna.join("table.dat"), "antenna table")?;
        symlink(&antenna, &src.join("ANTENNA_LINK"))?;
        symlink(Path::new("/dev/null"), &src.join("external_link"))?;

        let tgt = dir.path().join("msdir/lh.SELFCAL1.MS");
        copy(&src, &tgt)?;

        assert_eq!("main table", fs::read_to_string(tgt.join("table.dat"))?);
        assert_eq!("antenna table", fs::read_to_string(tgt.join("ANTENNA/table.dat"))?);

        let internal = tgt.join("ANTENNA_LINK");
        assert!(internal.is_symlink());
        assert_eq!(tgt.join("ANTENNA"), fs::read_link(&internal)?);

        let external = tgt.join("external_link");
        assert!(external.is_symlink());
        assert_eq!(Path::new("/dev/null"), fs::read_link(&external)?);

        // source untouched:
        assert_eq!("main table", fs::read_to_string(src.join("table.dat"))?);
        Ok(())
    }
}
