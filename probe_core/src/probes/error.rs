//! Error types for probe setup failures

use thiserror::Error;

/// A check that could not run. Negative outcomes are reported as failure reasons instead.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("ping binary not found on PATH")]
    PingUnavailable,

    #[error("failed to run ping: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("cannot resolve host {0}")]
    UnknownHost(String),

    #[error("unexpected ping output (exit code {code}): {output}")]
    UnexpectedOutput { code: i32, output: String },
}
