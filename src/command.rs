// External process execution.
//
// - `ExternalCommand`: what to run, why, and where its stdout goes.
// - `CommandRunner`: the seam the pipeline talks to. `run_required` turns a
//   non-zero exit into an error, `run_best_effort` only logs it.
// - `SystemRunner`: the real implementation on top of `std::process`.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Where a command's standard output ends up. Stdin and stderr are always
/// inherited from this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutMode {
    Inherit,
    /// Collected and returned in `CommandOutcome::stdout`.
    Capture,
    /// Streamed to the terminal and written to the given file.
    Tee(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub purpose: String,
    pub program: String,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
    pub stdout: StdoutMode,
}

impl ExternalCommand {
    pub fn new(purpose: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdout: StdoutMode::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdout(mut self, mode: StdoutMode) -> Self {
        self.stdout = mode;
        self
    }

    /// Shell-like rendering used in the invocation trace.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push_str(&format!(" '{}'", arg.to_string_lossy()));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code; `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: Option<String>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait CommandRunner {
    /// Run the command to completion. Errors only when it could not be run
    /// at all; a non-zero exit is reported through the outcome.
    fn run(&mut self, command: &ExternalCommand) -> Result<CommandOutcome>;

    /// Run a step the pipeline cannot continue without.
    fn run_required(&mut self, command: &ExternalCommand) -> Result<CommandOutcome> {
        let outcome = self.run(command)?;
        if !outcome.success() {
            tracing::error!(
                purpose = %command.purpose,
                status = ?outcome.status,
                "required command failed"
            );
            return Err(Error::ExternalCommand {
                purpose: command.purpose.clone(),
                status: outcome.status,
            });
        }
        Ok(outcome)
    }

    /// Run a step whose failure is tolerated. Returns whether it succeeded.
    fn run_best_effort(&mut self, command: &ExternalCommand) -> bool {
        match self.run(command) {
            Ok(outcome) if outcome.success() => true,
            Ok(outcome) => {
                tracing::debug!(
                    purpose = %command.purpose,
                    status = ?outcome.status,
                    "best-effort command exited non-zero"
                );
                false
            }
            Err(e) => {
                tracing::debug!(purpose = %command.purpose, error = %e, "best-effort command did not run");
                false
            }
        }
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &mut R {
    fn run(&mut self, command: &ExternalCommand) -> Result<CommandOutcome> {
        (**self).run(command)
    }
}

/// Runs commands as child processes of this one.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &ExternalCommand) -> Result<CommandOutcome> {
        println!("\n* {}\n    $ {}", command.purpose, command.command_line());

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit());

        let spawn_err = |source: io::Error| Error::Spawn {
            program: command.program.clone(),
            source,
        };

        match &command.stdout {
            StdoutMode::Inherit => {
                let status = cmd.stdout(Stdio::inherit()).status().map_err(spawn_err)?;
                Ok(CommandOutcome {
                    status: status.code(),
                    stdout: None,
                })
            }
            StdoutMode::Capture => {
                let output = cmd.stdout(Stdio::piped()).output().map_err(spawn_err)?;
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                tracing::debug!(bytes = stdout.len(), "captured stdout");
                Ok(CommandOutcome {
                    status: output.status.code(),
                    stdout: Some(stdout),
                })
            }
            StdoutMode::Tee(path) => {
                let mut child = cmd.stdout(Stdio::piped()).spawn().map_err(spawn_err)?;
                let copied = child
                    .stdout
                    .take()
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::BrokenPipe, "child stdout was not captured")
                    })
                    .and_then(|pipe| tee(pipe, path));
                // Reap the child even when copying failed.
                let status = child.wait()?;
                let written = copied?;

                tracing::debug!(bytes = written, path = %path.display(), "tee'd stdout");
                Ok(CommandOutcome {
                    status: status.code(),
                    stdout: None,
                })
            }
        }
    }
}

/// Copy `pipe` to both the terminal and a freshly created `path`.
fn tee(mut pipe: impl Read, path: &Path) -> io::Result<u64> {
    let mut file = std::fs::File::create(path)?;
    let mut terminal = io::stdout().lock();
    let mut buf = [0u8; 8192];
    let mut written: u64 = 0;
    loop {
        let n = pipe.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        terminal.write_all(&buf[..n])?;
        written += n as u64;
    }
    terminal.flush()?;
    file.flush()?;
    Ok(written)
}
