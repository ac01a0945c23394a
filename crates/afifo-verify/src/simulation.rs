use crate::{
    SimulationError,
    device::{ClockEdge, Device, Edge},
    executor::{Executor, Kernel, SimHandle},
    signal::{PortKind, SignalRef},
    vcd::VcdWriter,
};
use log::{debug, warn};
use num_bigint::BigUint;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

mod builder;

pub use builder::SimulationBuilder;

/// A timed simulation around one device.
///
/// Owns simulation time, the periodic clocks, the device and the tasks that
/// drive it. Each step delivers every clock event due at the next timestamp.
pub struct Simulation {
    pub(crate) kernel: Rc<RefCell<Kernel>>,
    pub(crate) executor: Executor,
    pub(crate) device: Box<dyn Device>,
    pub(crate) time_limit: Option<u64>,
    pub(crate) vcd_writer: Option<VcdWriter>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("device", &self.device.name())
            .field("time", &self.time())
            .finish()
    }
}

impl Simulation {
    pub fn builder<D: Device + 'static>(device: D) -> SimulationBuilder {
        SimulationBuilder::new(Box::new(device))
    }

    /// Handle for tasks and drivers.
    pub fn handle(&self) -> SimHandle {
        SimHandle::new(Rc::clone(&self.kernel))
    }

    pub fn signal(&self, name: &str) -> Result<SignalRef, SimulationError> {
        self.kernel.borrow().signals.resolve(name)
    }

    pub fn get(&self, signal: SignalRef) -> BigUint {
        self.kernel.borrow().signals.get(signal).clone()
    }

    /// Register a clock port and its period, enqueuing the first rising edge
    /// at `initial_delay`.
    pub fn add_clock(
        &mut self,
        port: &str,
        period: u64,
        initial_delay: u64,
    ) -> Result<(), SimulationError> {
        let mut kernel = self.kernel.borrow_mut();
        let signal = kernel.signals.resolve(port)?;
        if kernel.signals.info(signal).kind != PortKind::Clock {
            return Err(SimulationError::NotAClock(port.to_string()));
        }
        debug!("clock {port}: period {period}, first rising edge at {initial_delay}");
        kernel.scheduler.add_clock(signal, period, initial_delay)
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> u64 {
        self.kernel.borrow().scheduler.time
    }

    /// Returns the time of the next scheduled event, if any.
    pub fn next_event_time(&self) -> Option<u64> {
        self.kernel.borrow().scheduler.next_event_time()
    }

    /// Advance time to the next scheduled event and process all events at that time.
    /// Returns the new simulation time, or None if no events are scheduled.
    pub fn step(&mut self) -> Result<Option<u64>, SimulationError> {
        let (current_time, edges) = {
            let mut kernel = self.kernel.borrow_mut();
            let Some((current_time, events)) = kernel.scheduler.pop_all_at_next_time() else {
                return Ok(None);
            };
            kernel.scheduler.time = current_time;

            let mut edges = Vec::with_capacity(events.len());
            for ev in &events {
                let was_high = kernel.signals.is_high(ev.signal);
                kernel.signals.set_bit(ev.signal, ev.next_val);
                let edge = match (was_high, ev.next_val) {
                    (false, true) => Some(Edge::Rising),
                    (true, false) => Some(Edge::Falling),
                    _ => None,
                };
                if let Some(edge) = edge {
                    edges.push(ClockEdge {
                        clock: ev.signal,
                        edge,
                    });
                }
                kernel.scheduler.reschedule(ev);
            }
            (current_time, edges)
        };

        // The device samples pre-edge values before any task reacts to the edge.
        {
            let kernel = self.kernel.borrow();
            for edge in &edges {
                self.device.on_edge(*edge, &kernel.signals);
            }
        }
        {
            let mut kernel = self.kernel.borrow_mut();
            for edge in &edges {
                kernel.fire(*edge);
            }
        }
        self.executor.run_ready(&self.kernel);
        self.settle();
        self.dump(current_time)?;

        Ok(Some(current_time))
    }

    /// Advance time and run until `end_time` (inclusive).
    pub fn run_until(&mut self, end_time: u64) -> Result<(), SimulationError> {
        self.executor.run_ready(&self.kernel);
        self.settle();
        self.dump(self.time())?;
        while let Some(next_time) = self.next_event_time() {
            if next_time > end_time {
                break;
            }
            self.step()?;
        }
        self.kernel.borrow_mut().scheduler.time = end_time;
        self.dump(end_time)
    }

    /// Runs `future` as a task until it completes.
    ///
    /// Fails with [`SimulationError::Timeout`] once the next event lies
    /// further than the configured time limit from the start of this call,
    /// and with [`SimulationError::Stalled`] when no clock events remain.
    pub fn run<F>(&mut self, future: F) -> Result<F::Output, SimulationError>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let join = self.handle().spawn(future);
        let deadline = self
            .time_limit
            .map(|limit| (limit, self.time().saturating_add(limit)));
        self.executor.run_ready(&self.kernel);
        self.settle();
        self.dump(self.time())?;
        loop {
            if let Some(value) = join.try_take() {
                return Ok(value);
            }
            let Some(next_time) = self.next_event_time() else {
                return Err(SimulationError::Stalled { time: self.time() });
            };
            if let Some((limit, deadline)) = deadline
                && next_time > deadline
            {
                warn!(
                    "time limit {limit} reached at t={} with {} of {} tasks suspended",
                    self.time(),
                    self.kernel.borrow().parked_tasks(),
                    self.executor.live_tasks()
                );
                return Err(SimulationError::Timeout {
                    limit,
                    time: self.time(),
                });
            }
            self.step()?;
        }
    }

    /// Captures the current state of all signals and writes them to the VCD file.
    pub fn dump(&mut self, timestamp: u64) -> Result<(), SimulationError> {
        if let Some(writer) = self.vcd_writer.as_mut() {
            writer.dump(timestamp, &self.kernel.borrow().signals)?;
        }
        Ok(())
    }

    fn settle(&mut self) {
        let mut kernel = self.kernel.borrow_mut();
        self.device.settle(&mut kernel.signals);
    }
}
