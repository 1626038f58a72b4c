//! The external content processor.
//!
//! The pipeline sees a transform as a pure bytes-in/bytes-out capability.
//! [`CommandTransform`] feeds the body to a child process on stdin and reads
//! the result from stdout; [`Passthrough`] returns the body unchanged and
//! is used when no processor is configured.
//!
//! Transforms must be [`Sync`]: units are transformed on a worker pool.

use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O with {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

pub trait Transform: Sync {
    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(input.to_vec())
    }
}

/// Pipes content through an external program.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    program: String,
    args: Vec<String>,
}

impl CommandTransform {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line. `None` if blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self::new(program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Transform for CommandTransform {
    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let io_err = |source: std::io::Error| TransformError::Io {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransformError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from a second thread so a child that writes before it
        // finishes reading cannot deadlock on a full stdout pipe.
        let mut stdin = child.stdin.take();
        let (waited, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin.as_mut() {
                Some(pipe) => pipe.write_all(input),
                None => Ok(()),
            });
            let waited = child.wait_with_output();
            (waited, writer.join().unwrap_or(Ok(())))
        });

        let output = waited.map_err(io_err)?;
        if !output.status.success() {
            return Err(TransformError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // A child may exit successfully without reading all of stdin.
        if let Err(e) = written
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(io_err(e));
        }
        tracing::debug!(program = %self.program, bytes = output.stdout.len(), "transformed");
        Ok(output.stdout)
    }
}
