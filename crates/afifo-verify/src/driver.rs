//! Cycle-accurate write and read handshakes.
//!
//! Driven signals change only on the falling edge of the owning clock and
//! flow-control flags are sampled only at clock edges, so nothing races the
//! device's rising-edge sampling.

use crate::config::PortNames;
use crate::executor::{Clock, SimHandle};
use crate::signal::SignalRef;
use crate::SimulationError;
use log::debug;
use num_bigint::BigUint;
use std::future::Future;

/// Resolution of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    RejectedFull,
}

impl WriteOutcome {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// Resolution of a read transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Accepted(BigUint),
    RejectedEmpty,
}

impl ReadOutcome {
    pub fn payload(&self) -> Option<&BigUint> {
        match self {
            Self::Accepted(data) => Some(data),
            Self::RejectedEmpty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub payload: BigUint,
    pub abort_on_full: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub abort_on_empty: bool,
}

/// One side of the FIFO handshake.
///
/// Implementations share nothing but the edge-wait capability of their own
/// [`Clock`]; one transaction is in flight per side at a time.
pub trait TransactionDriver {
    type Request;
    type Outcome;

    fn clock(&self) -> &Clock;

    /// Drives the side's request signal inactive.
    fn quiesce(&self);

    /// Runs one transaction to resolution.
    fn transact(&self, request: Self::Request) -> impl Future<Output = Self::Outcome>;
}

/// Write-domain handshake: `wr_en`/`wr_data` against `wr_full`.
#[derive(Debug, Clone)]
pub struct WriteSide {
    clock: Clock,
    enable: SignalRef,
    data: SignalRef,
    full: SignalRef,
}

impl WriteSide {
    pub fn new(clock: Clock, enable: SignalRef, data: SignalRef, full: SignalRef) -> Self {
        Self {
            clock,
            enable,
            data,
            full,
        }
    }

    /// Offers `payload` until the device takes it.
    ///
    /// The request is driven on the falling edge and `full` is sampled at the
    /// following rising edge, the instant the device decides. With
    /// `abort_on_full` a refused word resolves as
    /// [`WriteOutcome::RejectedFull`]; otherwise the same word is offered again
    /// on every cycle until accepted, which blocks forever if `full` never
    /// clears.
    pub async fn write(&self, payload: &BigUint, abort_on_full: bool) -> WriteOutcome {
        let sim = self.clock.handle();
        debug!("write afifo => {payload:#x}");
        loop {
            self.clock.falling_edge().await;
            sim.set_bit(self.enable, true);
            sim.set(self.data, payload.clone());
            self.clock.rising_edge().await;
            if !sim.is_high(self.full) {
                break;
            }
            if abort_on_full {
                sim.set_bit(self.enable, false);
                debug!("write afifo => {payload:#x} refused, fifo full at t={}", sim.time());
                return WriteOutcome::RejectedFull;
            }
        }
        sim.set_bit(self.enable, false);
        WriteOutcome::Accepted
    }
}

impl TransactionDriver for WriteSide {
    type Request = WriteRequest;
    type Outcome = WriteOutcome;

    fn clock(&self) -> &Clock {
        &self.clock
    }

    fn quiesce(&self) {
        self.clock.handle().set_bit(self.enable, false);
    }

    async fn transact(&self, request: WriteRequest) -> WriteOutcome {
        self.write(&request.payload, request.abort_on_full).await
    }
}

/// Read-domain handshake: `rd_en` against `rd_empty`, capturing `rd_data`.
#[derive(Debug, Clone)]
pub struct ReadSide {
    clock: Clock,
    enable: SignalRef,
    data: SignalRef,
    empty: SignalRef,
}

impl ReadSide {
    pub fn new(clock: Clock, enable: SignalRef, data: SignalRef, empty: SignalRef) -> Self {
        Self {
            clock,
            enable,
            data,
            empty,
        }
    }

    /// Takes one word from the device.
    ///
    /// `empty` is sampled on the falling edge. When data is available the
    /// word on `rd_data` is latched before `rd_en` is raised, because the
    /// rising edge that acknowledges the read also advances the read pointer
    /// and changes the presented word.
    pub async fn read(&self, abort_on_empty: bool) -> ReadOutcome {
        let sim = self.clock.handle();
        let data = loop {
            self.clock.falling_edge().await;
            if !sim.is_high(self.empty) {
                let data = sim.get(self.data);
                sim.set_bit(self.enable, true);
                self.clock.rising_edge().await;
                break data;
            }
            if abort_on_empty {
                debug!("read afifo refused, fifo empty at t={}", sim.time());
                return ReadOutcome::RejectedEmpty;
            }
        };
        sim.set_bit(self.enable, false);
        debug!("read afifo => {data:#x}");
        ReadOutcome::Accepted(data)
    }
}

impl TransactionDriver for ReadSide {
    type Request = ReadRequest;
    type Outcome = ReadOutcome;

    fn clock(&self) -> &Clock {
        &self.clock
    }

    fn quiesce(&self) {
        self.clock.handle().set_bit(self.enable, false);
    }

    async fn transact(&self, request: ReadRequest) -> ReadOutcome {
        self.read(request.abort_on_empty).await
    }
}

/// Both handshake sides bound to one device.
#[derive(Debug, Clone)]
pub struct AfifoDriver {
    write: WriteSide,
    read: ReadSide,
}

impl AfifoDriver {
    /// Resolves the ports by name and drives both request signals inactive.
    pub fn bind(sim: &SimHandle, ports: &PortNames) -> Result<Self, SimulationError> {
        let write = WriteSide::new(
            sim.clock(&ports.wr_clk)?,
            sim.signal(&ports.wr_en)?,
            sim.signal(&ports.wr_data)?,
            sim.signal(&ports.wr_full)?,
        );
        let read = ReadSide::new(
            sim.clock(&ports.rd_clk)?,
            sim.signal(&ports.rd_en)?,
            sim.signal(&ports.rd_data)?,
            sim.signal(&ports.rd_empty)?,
        );
        write.quiesce();
        read.quiesce();
        Ok(Self { write, read })
    }

    pub async fn write(&self, payload: &BigUint, abort_on_full: bool) -> WriteOutcome {
        self.write.write(payload, abort_on_full).await
    }

    pub async fn read(&self, abort_on_empty: bool) -> ReadOutcome {
        self.read.read(abort_on_empty).await
    }

    pub fn write_side(&self) -> &WriteSide {
        &self.write
    }

    pub fn read_side(&self) -> &ReadSide {
        &self.read
    }

    /// Separates the sides so they can run as independent tasks.
    pub fn split(self) -> (WriteSide, ReadSide) {
        (self.write, self.read)
    }
}
