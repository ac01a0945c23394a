use num_bigint::BigUint;
use thiserror::Error;

/// Failures raised by the simulation runner itself.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Unknown signal '{0}'")]
    UnknownSignal(String),
    #[error("Signal '{0}' is declared twice")]
    DuplicateSignal(String),
    #[error("Signal '{0}' must be at least one bit wide")]
    ZeroWidth(String),
    #[error("Signal '{0}' is not a clock (only clock ports can be driven periodically)")]
    NotAClock(String),
    #[error("Clock period {0} is invalid: it must be even and at least 2")]
    InvalidPeriod(u64),
    #[error("Reset pulse for the {0} domain must last at least one cycle")]
    EmptyResetPulse(&'static str),
    #[error("Simulation time limit of {limit} exceeded at t={time} (a transaction never resolved)")]
    Timeout { limit: u64, time: u64 },
    #[error("Simulation stalled at t={time}: no clock events remain")]
    Stalled { time: u64 },
    #[error("Waveform output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid harness configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Flow-control flag named in a [`VerificationError::FlowControlViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FlowFlag {
    Full,
    Empty,
}

impl std::fmt::Display for FlowFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "wr_full"),
            Self::Empty => write!(f, "rd_empty"),
        }
    }
}

/// A scenario failure.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Data mismatch at position {position}: expected {expected:#x}, observed {observed:#x}")]
    DataMismatch {
        position: usize,
        expected: BigUint,
        observed: BigUint,
    },
    #[error("Flow control violation: {context} ({flag} = {})", bit(.observed))]
    FlowControlViolation {
        flag: FlowFlag,
        observed: bool,
        context: String,
    },
    /// An edge wait never completed within the runner's time limit.
    #[error("Protocol hang: {0}")]
    ProtocolHang(SimulationError),
    #[error("Harness failure: {0}")]
    Harness(SimulationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<SimulationError> for VerificationError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::Timeout { .. } | SimulationError::Stalled { .. } => {
                Self::ProtocolHang(err)
            }
            other => Self::Harness(other),
        }
    }
}

fn bit(value: &bool) -> u8 {
    u8::from(*value)
}
