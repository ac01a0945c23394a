use super::Simulation;
use crate::{
    SimulationError,
    device::Device,
    executor::{Executor, Kernel},
    vcd::VcdWriter,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// A fluent builder for configuring and initializing a [`Simulation`].
pub struct SimulationBuilder {
    device: Box<dyn Device>,
    time_limit: Option<u64>,
    vcd_path: Option<PathBuf>,
}

impl SimulationBuilder {
    pub fn new(device: Box<dyn Device>) -> Self {
        Self {
            device,
            time_limit: None,
            vcd_path: None,
        }
    }

    /// Bound on simulated time for each [`Simulation::run`] call.
    pub fn time_limit(mut self, limit: u64) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Enable VCD dumping to the specified file.
    pub fn vcd<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.vcd_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Binds the device ports and settles its outputs.
    pub fn build(self) -> Result<Simulation, SimulationError> {
        let mut kernel = Kernel::default();
        let mut device = self.device;
        device.bind(&mut kernel.signals)?;
        device.settle(&mut kernel.signals);

        let vcd_writer = match self.vcd_path {
            Some(path) => Some(VcdWriter::new(path, device.name(), &kernel.signals)?),
            None => None,
        };

        let mut sim = Simulation {
            kernel: Rc::new(RefCell::new(kernel)),
            executor: Executor::default(),
            device,
            time_limit: self.time_limit,
            vcd_writer,
        };
        sim.dump(0)?;
        Ok(sim)
    }
}
