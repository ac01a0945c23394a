use crate::config::{ClockConfig, HarnessConfig};
use crate::device::{AsyncFifo, Device, FifoParams};
use crate::driver::{AfifoDriver, ReadOutcome, TransactionDriver, WriteOutcome};
use crate::error::{ConfigError, FlowFlag, VerificationError};
use crate::reset::ResetSequencer;
use crate::simulation::{Simulation, SimulationBuilder};
use log::info;
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;

/// Builds a fresh device instance for each scenario.
pub type DeviceFactory = Box<dyn Fn(&HarnessConfig) -> Result<Box<dyn Device>, ConfigError>>;

/// Which domain runs on the fast clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClockMode {
    /// Write clock at the slow period, read clock at the fast one.
    WriteSlow,
    /// Write clock at the fast period, read clock at the slow one.
    WriteFast,
}

impl ClockMode {
    pub const ALL: [ClockMode; 2] = [ClockMode::WriteSlow, ClockMode::WriteFast];

    /// `(write period, read period)`.
    pub fn periods(self, clocks: &ClockConfig) -> (u64, u64) {
        match self {
            Self::WriteSlow => (clocks.slow_period, clocks.fast_period),
            Self::WriteFast => (clocks.fast_period, clocks.slow_period),
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Self::WriteSlow => "write_slow",
            Self::WriteFast => "write_fast",
        }
    }
}

impl std::fmt::Display for ClockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScenarioKind {
    /// Random batches written then read back in order.
    Randomized,
    /// Fill to capacity, then one more write must be refused.
    WriteFull,
    /// A read right after reset must be refused.
    ReadEmpty,
    /// No data survives a second reset.
    ResetIdempotence,
    /// Producer and consumer running concurrently in their own domains.
    Streaming,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::Randomized,
        ScenarioKind::WriteFull,
        ScenarioKind::ReadEmpty,
        ScenarioKind::ResetIdempotence,
        ScenarioKind::Streaming,
    ];

    fn slug(self) -> &'static str {
        match self {
            Self::Randomized => "randomized",
            Self::WriteFull => "write_full",
            Self::ReadEmpty => "read_empty",
            Self::ResetIdempotence => "reset_idempotence",
            Self::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.slug())
    }
}

/// Summary of a passing scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub kind: ScenarioKind,
    pub clock_mode: ClockMode,
    pub words_written: usize,
    pub words_read: usize,
    /// Transactions refused by design (directed full/empty checks).
    pub rejections: usize,
    /// Simulated time at the end of the scenario, in ns.
    pub sim_time: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    written: usize,
    read: usize,
    rejections: usize,
}

struct Session {
    sim: Simulation,
    driver: AfifoDriver,
    reset: ResetSequencer,
}

/// Generates stimulus, drives it through the handshake driver and checks the
/// results. Every scenario runs on a freshly built device and simulation.
pub struct Orchestrator {
    config: HarnessConfig,
    factory: DeviceFactory,
    rng: StdRng,
    seed: u64,
    waveform_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("seed", &self.seed)
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator for the behavioral [`AsyncFifo`] model.
    pub fn new(config: HarnessConfig) -> Result<Self, ConfigError> {
        Self::with_device(config, |config: &HarnessConfig| {
            let fifo = AsyncFifo::new(FifoParams::new(config.depth, config.width))?
                .with_port_names(config.ports.clone());
            Ok(Box::new(fifo) as Box<dyn Device>)
        })
    }

    /// Orchestrator for any device exposing the FIFO port contract.
    pub fn with_device<F>(config: HarnessConfig, factory: F) -> Result<Self, ConfigError>
    where
        F: Fn(&HarnessConfig) -> Result<Box<dyn Device>, ConfigError> + 'static,
    {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(
            "harness: depth={} width={} repetitions={} seed={seed}",
            config.depth, config.width, config.repetitions
        );
        Ok(Self {
            config,
            factory: Box::new(factory),
            rng: StdRng::seed_from_u64(seed),
            seed,
            waveform_dir: None,
        })
    }

    /// Writes one VCD file per scenario into `dir`.
    pub fn with_waveforms<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.waveform_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Seed actually in use, for reproducing a run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs every scenario under both clock relationships.
    pub fn run_all(&mut self) -> Result<Vec<ScenarioReport>, VerificationError> {
        let mut reports = Vec::with_capacity(ClockMode::ALL.len() * ScenarioKind::ALL.len());
        for mode in ClockMode::ALL {
            for kind in ScenarioKind::ALL {
                reports.push(self.run(kind, mode)?);
            }
        }
        Ok(reports)
    }

    pub fn run(
        &mut self,
        kind: ScenarioKind,
        mode: ClockMode,
    ) -> Result<ScenarioReport, VerificationError> {
        match kind {
            ScenarioKind::Randomized => self.run_randomized(mode),
            ScenarioKind::WriteFull => self.run_write_full(mode),
            ScenarioKind::ReadEmpty => self.run_read_empty(mode),
            ScenarioKind::ResetIdempotence => self.run_reset_idempotence(mode),
            ScenarioKind::Streaming => self.run_streaming(mode),
        }
    }

    /// Random batches of 0..=depth words; each batch is written with blocking
    /// writes and read back with blocking reads in submission order.
    pub fn run_randomized(&mut self, mode: ClockMode) -> Result<ScenarioReport, VerificationError> {
        let batches: Vec<Vec<BigUint>> = (0..self.config.repetitions)
            .map(|_| {
                let len = self.rng.gen_range(0..=self.config.depth);
                self.words(len)
            })
            .collect();
        let Session {
            mut sim,
            driver,
            reset,
        } = self.session(ScenarioKind::Randomized, mode)?;

        let tally = sim.run(async move {
            reset.run().await;
            let mut tally = Tally::default();
            for batch in &batches {
                transfer(&driver, batch, tally.written).await?;
                tally.written += batch.len();
                tally.read += batch.len();
            }
            Ok::<_, VerificationError>(tally)
        })??;
        Ok(self.report(ScenarioKind::Randomized, mode, tally, &sim))
    }

    /// Fills the FIFO to its configured depth, then checks one more write is
    /// refused. Fill writes may not be refused either.
    pub fn run_write_full(&mut self, mode: ClockMode) -> Result<ScenarioReport, VerificationError> {
        let depth = self.config.depth;
        let fill = self.words(depth);
        let extra = self.word();
        let Session {
            mut sim,
            driver,
            reset,
        } = self.session(ScenarioKind::WriteFull, mode)?;

        let tally = sim.run(async move {
            reset.run().await;
            for (position, word) in fill.iter().enumerate() {
                if driver.write(word, true).await == WriteOutcome::RejectedFull {
                    return Err(VerificationError::FlowControlViolation {
                        flag: FlowFlag::Full,
                        observed: true,
                        context: format!(
                            "write {} of {depth} refused before the fifo reached capacity",
                            position + 1
                        ),
                    });
                }
            }
            match driver.write(&extra, true).await {
                WriteOutcome::Accepted => Err(VerificationError::FlowControlViolation {
                    flag: FlowFlag::Full,
                    observed: false,
                    context: format!("write accepted with {depth} words already stored"),
                }),
                WriteOutcome::RejectedFull => Ok(Tally {
                    written: depth,
                    read: 0,
                    rejections: 1,
                }),
            }
        })??;
        Ok(self.report(ScenarioKind::WriteFull, mode, tally, &sim))
    }

    /// A read right after reset must be refused; after one write a blocking
    /// read must return that word.
    pub fn run_read_empty(&mut self, mode: ClockMode) -> Result<ScenarioReport, VerificationError> {
        let word = self.word();
        let Session {
            mut sim,
            driver,
            reset,
        } = self.session(ScenarioKind::ReadEmpty, mode)?;

        let tally = sim.run(async move {
            reset.run().await;
            expect_empty(&driver, "read returned data from a freshly reset fifo").await?;
            transfer(&driver, std::slice::from_ref(&word), 0).await?;
            Ok::<_, VerificationError>(Tally {
                written: 1,
                read: 1,
                rejections: 1,
            })
        })??;
        Ok(self.report(ScenarioKind::ReadEmpty, mode, tally, &sim))
    }

    /// Leaves data in the FIFO, resets again and checks nothing survived and
    /// the FIFO still carries a fresh batch intact.
    pub fn run_reset_idempotence(
        &mut self,
        mode: ClockMode,
    ) -> Result<ScenarioReport, VerificationError> {
        let stale_len = self.rng.gen_range(1..=self.config.depth);
        let stale = self.words(stale_len);
        let drained = stale_len / 2;
        let fresh_len = self.rng.gen_range(1..=self.config.depth);
        let fresh = self.words(fresh_len);
        let Session {
            mut sim,
            driver,
            reset,
        } = self.session(ScenarioKind::ResetIdempotence, mode)?;

        let tally = sim.run(async move {
            reset.run().await;
            for word in &stale {
                driver.write(word, false).await;
            }
            for (position, expected) in stale.iter().take(drained).enumerate() {
                let outcome = driver.read(false).await;
                check_word(outcome, position, expected)?;
            }

            reset.run().await;
            expect_empty(&driver, "data survived a reset").await?;
            transfer(&driver, &fresh, 0).await?;
            Ok::<_, VerificationError>(Tally {
                written: stale.len() + fresh.len(),
                read: drained + fresh.len(),
                rejections: 1,
            })
        })??;
        Ok(self.report(ScenarioKind::ResetIdempotence, mode, tally, &sim))
    }

    /// Producer and consumer tasks run concurrently, each on its own clock,
    /// for several times the FIFO depth, so both backpressure paths are hit.
    pub fn run_streaming(&mut self, mode: ClockMode) -> Result<ScenarioReport, VerificationError> {
        let count = 4 * self.config.depth + 1;
        let words = self.words(count);
        let Session {
            mut sim,
            driver,
            reset,
        } = self.session(ScenarioKind::Streaming, mode)?;
        let handle = sim.handle();

        let tally = sim.run(async move {
            reset.run().await;
            let (writer, reader) = driver.split();
            let expected = words.clone();

            let producer = handle.spawn(async move {
                for word in &words {
                    writer.write(word, false).await;
                }
                words.len()
            });
            let consumer = handle.spawn(async move {
                let mut observed = Vec::with_capacity(count);
                for _ in 0..count {
                    observed.push(reader.read(false).await);
                }
                reader.quiesce();
                observed
            });

            let written = producer.await;
            let observed = consumer.await;
            for (position, (outcome, expected)) in observed.into_iter().zip(&expected).enumerate() {
                check_word(outcome, position, expected)?;
            }
            Ok::<_, VerificationError>(Tally {
                written,
                read: count,
                rejections: 0,
            })
        })??;
        Ok(self.report(ScenarioKind::Streaming, mode, tally, &sim))
    }

    fn session(&self, kind: ScenarioKind, mode: ClockMode) -> Result<Session, VerificationError> {
        let device = (self.factory)(&self.config)?;
        let mut builder =
            SimulationBuilder::new(device).time_limit(self.config.effective_time_limit());
        if let Some(dir) = &self.waveform_dir {
            builder = builder.vcd(dir.join(format!("{kind}_{mode}.vcd")));
        }
        let mut sim = builder.build()?;

        let ports = &self.config.ports;
        let clocks = &self.config.clocks;
        let (write_period, read_period) = mode.periods(clocks);
        sim.add_clock(&ports.wr_clk, write_period, clocks.write_delay)?;
        sim.add_clock(&ports.rd_clk, read_period, clocks.read_delay)?;

        let handle = sim.handle();
        let driver = AfifoDriver::bind(&handle, ports)?;
        let reset = ResetSequencer::bind(&handle, ports, self.config.reset)?;
        info!("scenario {kind} ({mode}): write period {write_period}, read period {read_period}");
        Ok(Session { sim, driver, reset })
    }

    fn word(&mut self) -> BigUint {
        self.rng.gen_biguint(self.config.width as u64)
    }

    fn words(&mut self, count: usize) -> Vec<BigUint> {
        (0..count).map(|_| self.word()).collect()
    }

    fn report(
        &self,
        kind: ScenarioKind,
        clock_mode: ClockMode,
        tally: Tally,
        sim: &Simulation,
    ) -> ScenarioReport {
        let report = ScenarioReport {
            kind,
            clock_mode,
            words_written: tally.written,
            words_read: tally.read,
            rejections: tally.rejections,
            sim_time: sim.time(),
        };
        info!(
            "scenario {kind} ({clock_mode}) passed: {} written, {} read, t={}",
            report.words_written, report.words_read, report.sim_time
        );
        report
    }
}

/// Blocking writes of the whole batch, then blocking reads checked in order.
async fn transfer(
    driver: &AfifoDriver,
    batch: &[BigUint],
    first_position: usize,
) -> Result<(), VerificationError> {
    for word in batch {
        driver.write(word, false).await;
    }
    for (offset, expected) in batch.iter().enumerate() {
        let outcome = driver.read(false).await;
        check_word(outcome, first_position + offset, expected)?;
    }
    Ok(())
}

async fn expect_empty(driver: &AfifoDriver, context: &str) -> Result<(), VerificationError> {
    match driver.read(true).await {
        ReadOutcome::RejectedEmpty => Ok(()),
        ReadOutcome::Accepted(data) => Err(VerificationError::FlowControlViolation {
            flag: FlowFlag::Empty,
            observed: false,
            context: format!("{context} ({data:#x})"),
        }),
    }
}

fn check_word(
    outcome: ReadOutcome,
    position: usize,
    expected: &BigUint,
) -> Result<(), VerificationError> {
    match outcome {
        ReadOutcome::Accepted(observed) if observed == *expected => Ok(()),
        ReadOutcome::Accepted(observed) => Err(VerificationError::DataMismatch {
            position,
            expected: expected.clone(),
            observed,
        }),
        ReadOutcome::RejectedEmpty => Err(VerificationError::FlowControlViolation {
            flag: FlowFlag::Empty,
            observed: true,
            context: format!("blocking read at position {position} gave up"),
        }),
    }
}
