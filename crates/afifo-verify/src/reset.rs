use crate::config::{PortNames, ResetConfig};
use crate::executor::{Clock, SimHandle};
use crate::signal::SignalRef;
use crate::SimulationError;
use log::info;

/// Drives the two domain-local reset pulses one after the other.
///
/// Each pulse is measured in its own domain's cycles, so nothing depends on
/// the phase or ratio of the two clocks. Resets are active high.
#[derive(Debug, Clone)]
pub struct ResetSequencer {
    wr_clk: Clock,
    rd_clk: Clock,
    wr_rst: SignalRef,
    rd_rst: SignalRef,
    timing: ResetConfig,
}

impl ResetSequencer {
    pub fn bind(
        sim: &SimHandle,
        ports: &PortNames,
        timing: ResetConfig,
    ) -> Result<Self, SimulationError> {
        if timing.write_cycles == 0 {
            return Err(SimulationError::EmptyResetPulse("write"));
        }
        if timing.read_cycles == 0 {
            return Err(SimulationError::EmptyResetPulse("read"));
        }
        Ok(Self {
            wr_clk: sim.clock(&ports.wr_clk)?,
            rd_clk: sim.clock(&ports.rd_clk)?,
            wr_rst: sim.signal(&ports.wr_arst)?,
            rd_rst: sim.signal(&ports.rd_arst)?,
            timing,
        })
    }

    pub async fn run(&self) {
        let sim = self.wr_clk.handle();
        // Known levels before anything else, without waiting for an edge.
        sim.set_bit(self.wr_rst, false);
        sim.set_bit(self.rd_rst, false);

        info!("resetting write domain for {} cycles", self.timing.write_cycles);
        sim.set_bit(self.wr_rst, true);
        self.wr_clk.cycles(self.timing.write_cycles).await;
        sim.set_bit(self.wr_rst, false);

        info!("resetting read domain for {} cycles", self.timing.read_cycles);
        sim.set_bit(self.rd_rst, true);
        self.rd_clk.cycles(self.timing.read_cycles).await;
        sim.set_bit(self.rd_rst, false);
        info!("reset complete at t={}", sim.time());
    }
}
