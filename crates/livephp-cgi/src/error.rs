//! CGI bridge error types.

use std::process::ExitStatus;

/// Error raised while running a script through the interpreter.
#[derive(Debug, thiserror::Error)]
pub enum CgiError {
    /// The interpreter process could not be started.
    #[error("Failed to start interpreter {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The interpreter ran but exited unsuccessfully.
    ///
    /// `output` holds everything the process wrote (stdout and stderr
    /// interleaved) for server-side diagnosis only.
    #[error("Interpreter exited with {status}")]
    Exit {
        /// Exit status reported by the OS.
        status: ExitStatus,
        /// Combined output captured before the process exited.
        output: Vec<u8>,
    },

    /// I/O error while wiring up or draining the process pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CgiError {
    /// Combined process output, if the process got far enough to produce any.
    #[must_use]
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            Self::Exit { output, .. } => Some(output),
            Self::Spawn { .. } | Self::Io(_) => None,
        }
    }
}
