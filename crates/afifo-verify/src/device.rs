use crate::SimulationError;
use crate::signal::{SignalRef, SignalTable};

mod async_fifo;

pub use async_fifo::{AsyncFifo, FaultMode, FifoParams};

/// Direction of a clock transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Rising,
    Falling,
}

/// A transition of one clock signal delivered by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockEdge {
    pub clock: SignalRef,
    pub edge: Edge,
}

/// A black-box device under test.
///
/// The runner calls [`Device::on_edge`] for every clock transition with the
/// signal values as they were just before the edge, resumes the tasks waiting
/// on that edge, and only then calls [`Device::settle`]. Registered outputs
/// therefore change after the testbench has sampled them, the way an HDL
/// simulator orders non-blocking updates after the edge's active region.
pub trait Device {
    /// Instance name used in waveform scopes.
    fn name(&self) -> &str;

    /// Declares the device's ports.
    fn bind(&mut self, signals: &mut SignalTable) -> Result<(), SimulationError>;

    /// Samples inputs for a clock transition and computes next-state.
    ///
    /// Implementations must read only pre-edge state here; the computed state
    /// becomes visible in [`Device::settle`].
    fn on_edge(&mut self, edge: ClockEdge, signals: &SignalTable);

    /// Commits pending state, applies asynchronous inputs and drives outputs.
    fn settle(&mut self, signals: &mut SignalTable);
}
