//! Working directories for the intermediate files of each stage.

use crate::{Error, Result};

use std::fs;
use std::path::{Path, PathBuf};

//-----------------------------------------------------------------------------

/// A directory for the FASTA files and tool outputs of a stage.
///
/// # Examples
///
/// ```
/// use seqfilter::Workspace;
///
/// let dir = tempfile::tempdir().unwrap();
/// let workspace = Workspace::init(dir.path().join("host")).unwrap();
/// assert!(workspace.dir().is_dir());
/// assert_eq!(workspace.path("merged.fasta"), dir.path().join("host").join("merged.fasta"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Creates the directory and its parents if they do not exist.
    ///
    /// Existing files are kept; stages overwrite the files they write.
    pub fn init<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.exists() && !dir.is_dir() {
            return Err(Error::Config(format!("Workspace {} is not a directory", dir.display())));
        }
        fs::create_dir_all(dir).map_err(|x| Error::io(dir, x))?;
        log::debug!("Using workspace {}", dir.display());
        Ok(Workspace { dir: dir.to_path_buf() })
    }

    /// Returns the directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the full path of a file in the workspace.
    pub fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        let workspace = Workspace::init(&target);
        assert!(workspace.is_ok(), "Failed to create workspace: {}", workspace.unwrap_err());
        assert!(target.is_dir());

        // Initializing again keeps the contents.
        fs::write(target.join("keep.txt"), "data").unwrap();
        let workspace = Workspace::init(&target).unwrap();
        assert!(workspace.path("keep.txt").exists());
    }

    #[test]
    fn file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file");
        fs::write(&target, "data").unwrap();
        let result = Workspace::init(&target);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

//-----------------------------------------------------------------------------
