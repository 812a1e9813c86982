use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Workload file not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed workload line {line}: {reason}")]
    TraceError { line: usize, reason: String },

    #[error("Invalid range list literal: {0}")]
    RangeParseError(String),

    #[error("Operation not allowed while the simulation is {0}")]
    InvalidSimulationState(&'static str),

    #[error("Simulation time span has already been set to {0}")]
    TimeSpanAlreadySet(i64),

    #[error("End of warm-up has already been set to {0}")]
    WarmUpAlreadySet(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
