//! External command execution.
//!
//! Downloads, extraction and the UI compiler all run as child processes.
//! They go through [`CommandRunner`] so the pipeline can be exercised without
//! `curl`, `7z` or `cargo` installed.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::ProcessError;

/// A single command line to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory for the child, inherited when `None`.
    pub current_dir: Option<PathBuf>,
    /// Directories appended to the inherited `PATH`.
    pub extra_path: Vec<PathBuf>,
}

impl Invocation {
    /// Starts an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            extra_path: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Runs the child in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Makes `dirs` searchable by the child.
    #[must_use]
    pub fn extra_path(mut self, dirs: &[PathBuf]) -> Self {
        self.extra_path.extend_from_slice(dirs);
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        if let Some(path) = self.joined_path() {
            cmd.env("PATH", path);
        }
        cmd
    }

    fn joined_path(&self) -> Option<OsString> {
        if self.extra_path.is_empty() {
            return None;
        }
        let inherited = env::var_os("PATH").unwrap_or_default();
        let dirs = env::split_paths(&inherited).chain(self.extra_path.iter().cloned());
        match env::join_paths(dirs) {
            Ok(joined) => Some(joined),
            Err(e) => {
                debug!("cannot extend PATH for {}: {e}", self.program);
                None
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Resolves `path` against the current directory.
///
/// Children run with their own `current_dir`, so any path handed to them must
/// not depend on ours. Falls back to `path` if the current directory is
/// unavailable.
pub(crate) fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Runs external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Runs `invocation` to completion.
    ///
    /// # Errors
    /// Returns [`ProcessError`] if the program cannot start or exits
    /// unsuccessfully.
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError>;

    /// Returns `true` if `invocation` starts and exits successfully.
    fn probe(&self, invocation: &Invocation) -> bool;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError> {
        info!("running: {invocation}");
        let status = invocation
            .to_command()
            .status()
            .map_err(|source| ProcessError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Failed {
                command: invocation.to_string(),
                code: status.code(),
            })
        }
    }

    fn probe(&self, invocation: &Invocation) -> bool {
        match invocation
            .to_command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => true,
            Ok(status) => {
                debug!("{invocation} failed with status {status}");
                false
            }
            Err(e) => {
                debug!("failed to run {invocation}: {e}");
                false
            }
        }
    }
}
