//! Command lines for the external tools and running them.
//!
//! The tools are executed directly rather than through a shell.
//! Their standard output and standard error are inherited, so their progress reports reach the user.

use crate::{Error, Result};

use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

//-----------------------------------------------------------------------------

/// Default name of the usearch binary.
pub const USEARCH: &str = "usearch";

/// Default name of the bowtie2 binary.
pub const BOWTIE2: &str = "bowtie2";

/// Returns the number of threads to use when the user did not specify it.
pub fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

//-----------------------------------------------------------------------------

/// An external program with its arguments.
///
/// The [`Display`] implementation gives the command line in the form it is recorded in the metadata table.
///
/// # Examples
///
/// ```
/// use seqfilter::tools::ToolCommand;
///
/// let command = ToolCommand::new("usearch").arg("-search_exact").arg("my sequences.fasta");
/// assert_eq!(command.to_string(), "usearch -search_exact 'my sequences.fasta'");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ToolCommand {
    /// Creates a command without arguments.
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        ToolCommand {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends an option followed by its value.
    pub fn opt<S: AsRef<OsStr>, T: AsRef<OsStr>>(self, option: S, value: T) -> Self {
        self.arg(option).arg(value)
    }

    /// Returns the program.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the arguments.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Runs the program and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolMissing`] if the program cannot be started and [`Error::ToolFailed`] if it exits with a failure status.
    pub fn run(&self) -> Result<()> {
        log::debug!("Running {}", self);
        let status = Command::new(&self.program).args(&self.args).status().map_err(|x| {
            let message = if x.kind() == io::ErrorKind::NotFound {
                String::from("program not found")
            } else {
                x.to_string()
            };
            Error::ToolMissing { program: self.program.display().to_string(), message }
        })?;
        if !status.success() {
            return Err(Error::ToolFailed { command: self.to_string(), status: status.code() });
        }
        Ok(())
    }
}

// Quotes the word for a POSIX shell if necessary.
fn quote(word: &OsStr) -> String {
    let word = word.to_string_lossy();
    let safe = |c: char| c.is_ascii_alphanumeric() || "-_./=:,+%@".contains(c);
    if !word.is_empty() && word.chars().all(safe) {
        word.into_owned()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

impl Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", quote(self.program.as_os_str()))?;
        for arg in self.args.iter() {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// Exact matching of query sequences against a database on the plus strand.
///
/// Hits are written to `uc` in the UC format.
pub fn usearch_search_exact(usearch: &Path, query: &Path, db: &Path, uc: &Path, threads: Option<usize>) -> ToolCommand {
    let mut command = ToolCommand::new(usearch)
        .opt("-search_exact", query)
        .opt("-strand", "plus")
        .opt("-db", db)
        .opt("-uc", uc);
    if let Some(threads) = threads {
        command = command.opt("-threads", threads.to_string());
    }
    command
}

/// Alignment of FASTA reads against a bowtie2 index.
///
/// The SAM output contains neither a header nor unaligned reads.
pub fn bowtie2(bowtie2: &Path, index: &Path, reads: &Path, sam: &Path, threads: usize) -> ToolCommand {
    ToolCommand::new(bowtie2)
        .opt("-p", threads.to_string())
        .arg("--no-unal")
        .arg("-f")
        .arg("--no-hd")
        .opt("-S", sam)
        .opt("-x", index)
        .opt("-U", reads)
}

/// De novo chimera detection for abundance-annotated sequences.
///
/// The classification of each sequence is written to `uchimeout`.
pub fn usearch_uchime_denovo(usearch: &Path, input: &Path, uchimeout: &Path, abskew: Option<f64>) -> ToolCommand {
    let mut command = ToolCommand::new(usearch)
        .opt("-uchime_denovo", input)
        .opt("-uchimeout", uchimeout);
    if let Some(abskew) = abskew {
        command = command.opt("-abskew", abskew.to_string());
    }
    command
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_exact_command() {
        let command = usearch_search_exact(
            Path::new("usearch"), Path::new("ws/sequences.fasta"), Path::new("ws/controls.fasta"),
            Path::new("ws/results.uc"), None
        );
        assert_eq!(
            command.to_string(),
            "usearch -search_exact ws/sequences.fasta -strand plus -db ws/controls.fasta -uc ws/results.uc"
        );
        let command = usearch_search_exact(
            Path::new("usearch"), Path::new("q.fa"), Path::new("d.fa"), Path::new("r.uc"), Some(4)
        );
        assert!(command.to_string().ends_with(" -threads 4"));
    }

    #[test]
    fn bowtie2_command() {
        let command = bowtie2(
            Path::new("/opt/bin/bowtie2"), Path::new("ref/zebrafish"), Path::new("host/merged.fasta"),
            Path::new("host/output.sam"), 8
        );
        assert_eq!(
            command.to_string(),
            "/opt/bin/bowtie2 -p 8 --no-unal -f --no-hd -S host/output.sam -x ref/zebrafish -U host/merged.fasta"
        );
        assert_eq!(command.program(), Path::new("/opt/bin/bowtie2"));
        assert_eq!(command.args().len(), 11);
    }

    #[test]
    fn uchime_command() {
        let command = usearch_uchime_denovo(Path::new("usearch"), Path::new("c.fasta"), Path::new("r.uchime"), Some(2.5));
        assert_eq!(command.to_string(), "usearch -uchime_denovo c.fasta -uchimeout r.uchime -abskew 2.5");
    }

    #[test]
    fn quoting() {
        let command = ToolCommand::new("tool").arg("it's").arg("").arg("a b");
        assert_eq!(command.to_string(), "tool 'it'\\''s' '' 'a b'");
    }

    #[test]
    fn missing_program() {
        let command = ToolCommand::new("seqfilter-no-such-program").arg("--version");
        let result = command.run();
        assert!(matches!(result, Err(Error::ToolMissing { .. })), "Expected a missing tool, got {:?}", result);
    }

    #[cfg(unix)]
    #[test]
    fn exit_status() {
        assert!(ToolCommand::new("true").run().is_ok());
        let result = ToolCommand::new("false").run();
        match result {
            Err(Error::ToolFailed { command, status }) => {
                assert_eq!(command, "false");
                assert_eq!(status, Some(1));
            },
            other => panic!("Expected a failed tool, got {:?}", other),
        }
    }
}

//-----------------------------------------------------------------------------
