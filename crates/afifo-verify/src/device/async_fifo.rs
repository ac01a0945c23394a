use super::{ClockEdge, Device, Edge};
use crate::config::PortNames;
use crate::signal::{PortKind, SignalRef, SignalTable};
use crate::{ConfigError, SimulationError};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Geometry of the modeled FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoParams {
    /// Number of storage slots.
    pub depth: usize,
    /// Data width in bits.
    pub width: usize,
    /// Flip-flops in each pointer synchronizer.
    pub sync_stages: usize,
}

impl FifoParams {
    pub fn new(depth: usize, width: usize) -> Self {
        Self {
            depth,
            width,
            sync_stages: 2,
        }
    }

    pub fn sync_stages(mut self, stages: usize) -> Self {
        self.sync_stages = stages;
        self
    }
}

/// Defects that can be injected into the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    #[default]
    None,
    /// `wr_full` never asserts; writes into a full FIFO are silently dropped.
    FullStuckLow,
    /// `wr_full` is always asserted and no write is ever accepted.
    FullStuckHigh,
    /// `rd_empty` never asserts; reads of an empty FIFO return stale data.
    EmptyStuckLow,
    /// Every stored word has this bit inverted.
    DataBitFlip { bit: usize },
}

#[derive(Debug, Clone, Copy)]
struct Ports {
    wr_clk: SignalRef,
    wr_en: SignalRef,
    wr_data: SignalRef,
    wr_full: SignalRef,
    wr_arst: SignalRef,
    rd_clk: SignalRef,
    rd_en: SignalRef,
    rd_data: SignalRef,
    rd_empty: SignalRef,
    rd_arst: SignalRef,
}

#[derive(Debug, Clone)]
struct WriteDomain {
    wptr: usize,
    rptr_sync: Vec<usize>,
}

impl WriteDomain {
    fn reset(stages: usize) -> Self {
        Self {
            wptr: 0,
            rptr_sync: vec![0; stages],
        }
    }
}

#[derive(Debug, Clone)]
struct ReadDomain {
    rptr: usize,
    wptr_sync: Vec<usize>,
}

impl ReadDomain {
    fn reset(stages: usize) -> Self {
        Self {
            rptr: 0,
            wptr_sync: vec![0; stages],
        }
    }
}

/// Behavioral model of a dual-clock FIFO.
///
/// Pointers run modulo `2 * depth` so that full and empty are distinguishable
/// for any depth. Each domain sees the other domain's pointer through a chain
/// of `sync_stages` registers clocked by its own clock, which makes `wr_full`
/// and `rd_empty` pessimistic for a few cycles after the far side moves, as in
/// real synchronizer-based designs. Both resets are asynchronous and active
/// high.
#[derive(Debug)]
pub struct AsyncFifo {
    name: String,
    params: FifoParams,
    fault: FaultMode,
    port_names: PortNames,
    ports: Option<Ports>,
    mem: Vec<BigUint>,
    mask: BigUint,
    wr: WriteDomain,
    rd: ReadDomain,
    next_wr: Option<(WriteDomain, Option<(usize, BigUint)>)>,
    next_rd: Option<ReadDomain>,
}

impl AsyncFifo {
    pub fn new(params: FifoParams) -> Result<Self, ConfigError> {
        if params.depth == 0 {
            return Err(ConfigError::InvalidField {
                field: "depth",
                reason: "must be greater than zero".to_string(),
            });
        }
        if params.width == 0 {
            return Err(ConfigError::InvalidField {
                field: "width",
                reason: "must be greater than zero".to_string(),
            });
        }
        if params.sync_stages == 0 {
            return Err(ConfigError::InvalidField {
                field: "sync_stages",
                reason: "a synchronizer needs at least one stage".to_string(),
            });
        }
        Ok(Self {
            name: "async_gp_fifo".to_string(),
            params,
            fault: FaultMode::None,
            port_names: PortNames::default(),
            ports: None,
            mem: vec![BigUint::zero(); params.depth],
            mask: (BigUint::one() << params.width) - 1u32,
            wr: WriteDomain::reset(params.sync_stages),
            rd: ReadDomain::reset(params.sync_stages),
            next_wr: None,
            next_rd: None,
        })
    }

    pub fn with_fault(mut self, fault: FaultMode) -> Self {
        self.fault = fault;
        self
    }

    /// Declares the ports under these names instead of the defaults.
    pub fn with_port_names(mut self, names: PortNames) -> Self {
        self.port_names = names;
        self
    }

    /// Words held according to the write and read pointers.
    pub fn occupancy(&self) -> usize {
        self.distance(self.wr.wptr, self.rd.rptr)
    }

    fn span(&self) -> usize {
        2 * self.params.depth
    }

    fn distance(&self, ahead: usize, behind: usize) -> usize {
        (ahead + self.span() - behind) % self.span()
    }

    fn full(&self) -> bool {
        let synced_rptr = self.wr.rptr_sync[self.params.sync_stages - 1];
        self.distance(self.wr.wptr, synced_rptr) == self.params.depth
    }

    fn empty(&self) -> bool {
        self.rd.rptr == self.rd.wptr_sync[self.params.sync_stages - 1]
    }

    fn full_output(&self) -> bool {
        match self.fault {
            FaultMode::FullStuckLow => false,
            FaultMode::FullStuckHigh => true,
            _ => self.full(),
        }
    }

    fn empty_output(&self) -> bool {
        match self.fault {
            FaultMode::EmptyStuckLow => false,
            _ => self.empty(),
        }
    }

    fn blocks_writes(&self) -> bool {
        self.fault == FaultMode::FullStuckHigh || self.full()
    }

    fn stored(&self, value: BigUint) -> BigUint {
        match self.fault {
            FaultMode::DataBitFlip { bit } => (value ^ (BigUint::one() << bit)) & &self.mask,
            _ => value,
        }
    }

    fn next_write_domain(
        &self,
        ports: &Ports,
        signals: &SignalTable,
    ) -> (WriteDomain, Option<(usize, BigUint)>) {
        if signals.is_high(ports.wr_arst) {
            return (WriteDomain::reset(self.params.sync_stages), None);
        }
        let mut next = self.wr.clone();
        let mut store = None;
        if signals.is_high(ports.wr_en) && !self.blocks_writes() {
            store = Some((
                self.wr.wptr % self.params.depth,
                signals.get(ports.wr_data).clone(),
            ));
            next.wptr = (self.wr.wptr + 1) % self.span();
        }
        next.rptr_sync.rotate_right(1);
        next.rptr_sync[0] = self.rd.rptr;
        (next, store)
    }

    fn next_read_domain(&self, ports: &Ports, signals: &SignalTable) -> ReadDomain {
        if signals.is_high(ports.rd_arst) {
            return ReadDomain::reset(self.params.sync_stages);
        }
        let mut next = self.rd.clone();
        if signals.is_high(ports.rd_en) && !self.empty() {
            next.rptr = (self.rd.rptr + 1) % self.span();
        }
        next.wptr_sync.rotate_right(1);
        next.wptr_sync[0] = self.wr.wptr;
        next
    }
}

impl Device for AsyncFifo {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&mut self, signals: &mut SignalTable) -> Result<(), SimulationError> {
        let width = self.params.width;
        let names = &self.port_names;
        self.ports = Some(Ports {
            wr_clk: signals.declare(&names.wr_clk, 1, PortKind::Clock)?,
            wr_en: signals.declare(&names.wr_en, 1, PortKind::Input)?,
            wr_data: signals.declare(&names.wr_data, width, PortKind::Input)?,
            wr_full: signals.declare(&names.wr_full, 1, PortKind::Output)?,
            wr_arst: signals.declare(&names.wr_arst, 1, PortKind::Reset)?,
            rd_clk: signals.declare(&names.rd_clk, 1, PortKind::Clock)?,
            rd_en: signals.declare(&names.rd_en, 1, PortKind::Input)?,
            rd_data: signals.declare(&names.rd_data, width, PortKind::Output)?,
            rd_empty: signals.declare(&names.rd_empty, 1, PortKind::Output)?,
            rd_arst: signals.declare(&names.rd_arst, 1, PortKind::Reset)?,
        });
        Ok(())
    }

    fn on_edge(&mut self, edge: ClockEdge, signals: &SignalTable) {
        let Some(ports) = self.ports else {
            return;
        };
        if edge.edge != Edge::Rising {
            return;
        }
        if edge.clock == ports.wr_clk {
            self.next_wr = Some(self.next_write_domain(&ports, signals));
        }
        if edge.clock == ports.rd_clk {
            self.next_rd = Some(self.next_read_domain(&ports, signals));
        }
    }

    fn settle(&mut self, signals: &mut SignalTable) {
        let Some(ports) = self.ports else {
            return;
        };
        if let Some((next, store)) = self.next_wr.take() {
            if let Some((addr, value)) = store {
                self.mem[addr] = self.stored(value);
            }
            self.wr = next;
        }
        if let Some(next) = self.next_rd.take() {
            self.rd = next;
        }
        if signals.is_high(ports.wr_arst) {
            self.wr = WriteDomain::reset(self.params.sync_stages);
        }
        if signals.is_high(ports.rd_arst) {
            self.rd = ReadDomain::reset(self.params.sync_stages);
        }
        signals.set_bit(ports.wr_full, self.full_output());
        signals.set_bit(ports.rd_empty, self.empty_output());
        let head = self.mem[self.rd.rptr % self.params.depth].clone();
        signals.set(ports.rd_data, head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bench {
        fifo: AsyncFifo,
        signals: SignalTable,
    }

    impl Bench {
        fn new(depth: usize) -> Self {
            let mut fifo = AsyncFifo::new(FifoParams::new(depth, 8)).unwrap();
            let mut signals = SignalTable::new();
            fifo.bind(&mut signals).unwrap();
            fifo.settle(&mut signals);
            Self { fifo, signals }
        }

        fn sig(&self, name: &str) -> SignalRef {
            self.signals.resolve(name).unwrap()
        }

        fn tick(&mut self, clock: &str) {
            let edge = ClockEdge {
                clock: self.sig(clock),
                edge: Edge::Rising,
            };
            self.fifo.on_edge(edge, &self.signals);
            self.fifo.settle(&mut self.signals);
        }

        fn high(&self, name: &str) -> bool {
            self.signals.is_high(self.sig(name))
        }
    }

    #[test]
    fn test_empty_after_construction() {
        let bench = Bench::new(4);
        assert!(bench.high("rd_empty"));
        assert!(!bench.high("wr_full"));
    }

    #[test]
    fn test_full_asserts_at_capacity() {
        let mut bench = Bench::new(2);
        let wr_en = bench.sig("wr_en");
        let wr_data = bench.sig("wr_data");
        bench.signals.set_bit(wr_en, true);
        bench.signals.set(wr_data, BigUint::from(0xA5u32));
        bench.tick("wr_clk");
        assert!(!bench.high("wr_full"));
        bench.tick("wr_clk");
        assert!(bench.high("wr_full"));
        // a third write is refused
        bench.tick("wr_clk");
        assert_eq!(bench.fifo.occupancy(), 2);
    }

    #[test]
    fn test_empty_clears_after_synchronizer_latency() {
        let mut bench = Bench::new(4);
        let wr_en = bench.sig("wr_en");
        let wr_data = bench.sig("wr_data");
        bench.signals.set_bit(wr_en, true);
        bench.signals.set(wr_data, BigUint::from(0x3Cu32));
        bench.tick("wr_clk");
        bench.signals.set_bit(wr_en, false);

        bench.tick("rd_clk");
        assert!(bench.high("rd_empty"));
        bench.tick("rd_clk");
        assert!(!bench.high("rd_empty"));
        assert_eq!(
            bench.signals.get(bench.sig("rd_data")),
            &BigUint::from(0x3Cu32)
        );
    }

    #[test]
    fn test_async_reset_clears_pointers() {
        let mut bench = Bench::new(4);
        let wr_en = bench.sig("wr_en");
        bench.signals.set_bit(wr_en, true);
        bench.tick("wr_clk");
        bench.tick("wr_clk");
        bench.signals.set_bit(wr_en, false);
        assert_eq!(bench.fifo.occupancy(), 2);

        let wr_arst = bench.sig("wr_arst");
        bench.signals.set_bit(wr_arst, true);
        bench.fifo.settle(&mut bench.signals);
        assert_eq!(bench.fifo.occupancy(), 0);
    }

    #[test]
    fn test_bit_flip_fault_corrupts_storage() {
        let mut fifo = AsyncFifo::new(FifoParams::new(2, 8))
            .unwrap()
            .with_fault(FaultMode::DataBitFlip { bit: 0 });
        assert_eq!(fifo.stored(BigUint::from(0x10u32)), BigUint::from(0x11u32));
        fifo.fault = FaultMode::DataBitFlip { bit: 9 };
        assert_eq!(fifo.stored(BigUint::from(0x10u32)), BigUint::from(0x10u32));
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        assert!(AsyncFifo::new(FifoParams::new(0, 8)).is_err());
        assert!(AsyncFifo::new(FifoParams::new(4, 0)).is_err());
        assert!(AsyncFifo::new(FifoParams::new(4, 8).sync_stages(0)).is_err());
    }
}
