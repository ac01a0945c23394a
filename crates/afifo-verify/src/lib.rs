//! Verification harness for dual-clock asynchronous FIFOs.
//!
//! The harness drives a device through its write and read ports from two
//! cooperatively scheduled tasks, each suspended only on edges of its own
//! clock, and checks data fidelity and full/empty flow control.

mod config;
mod device;
mod driver;
mod error;
mod executor;
mod reset;
mod scenario;
mod scheduler;
mod signal;
mod simulation;
mod sweep;
mod vcd;

pub(crate) use fxhash::FxHashMap as HashMap;
pub(crate) use fxhash::FxHashSet as HashSet;

pub use config::{ClockConfig, HarnessConfig, PortNames, ResetConfig};
pub use device::{AsyncFifo, ClockEdge, Device, Edge, FaultMode, FifoParams};
pub use driver::{
    AfifoDriver, ReadOutcome, ReadRequest, ReadSide, TransactionDriver, WriteOutcome, WriteRequest,
    WriteSide,
};
pub use error::{ConfigError, FlowFlag, SimulationError, VerificationError};
pub use executor::{Clock, EdgeFuture, JoinHandle, SimHandle};
pub use num_bigint::BigUint;
pub use reset::ResetSequencer;
pub use scenario::{ClockMode, DeviceFactory, Orchestrator, ScenarioKind, ScenarioReport};
pub use signal::{NamedSignal, PortKind, SignalRef, SignalTable};
pub use simulation::{Simulation, SimulationBuilder};
pub use sweep::{SWEEP_DEPTHS, SweepOutcome, SweepPlan, SweepPoint};
