use crate::config::HarnessConfig;
use crate::error::VerificationError;
use crate::scenario::{Orchestrator, ScenarioReport};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// FIFO depths covered by a default sweep.
pub const SWEEP_DEPTHS: [usize; 5] = [2, 4, 8, 16, 32];

/// One parameter combination of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SweepPoint {
    pub depth: usize,
    pub width: usize,
    pub repetitions: usize,
    pub seed: u64,
}

impl SweepPoint {
    /// `base` with this point's geometry and seed applied.
    pub fn config(&self, base: &HarnessConfig) -> HarnessConfig {
        HarnessConfig {
            depth: self.depth,
            width: self.width,
            repetitions: self.repetitions,
            seed: Some(self.seed),
            time_limit: None,
            ..base.clone()
        }
    }
}

/// Seeded enumeration of sweep points: every depth gets a random power-of-two
/// width between 4 and 1024 bits and 2 to 20 repetitions.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    base: HarnessConfig,
    seed: u64,
    points: Vec<SweepPoint>,
}

impl SweepPlan {
    pub fn new(seed: u64) -> Self {
        Self::with_depths(HarnessConfig::default(), seed, &SWEEP_DEPTHS)
    }

    /// Sweep over `depths`, taking clocks, reset timing and port names from
    /// `base`.
    pub fn with_depths(base: HarnessConfig, seed: u64, depths: &[usize]) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let points = depths
            .iter()
            .map(|&depth| SweepPoint {
                depth,
                width: 1 << rng.gen_range(2..=10u32),
                repetitions: rng.gen_range(2..=20),
                seed: rng.r#gen(),
            })
            .collect();
        Self { base, seed, points }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }

    /// Runs the full scenario suite at every point. A failing point does not
    /// stop the sweep.
    pub fn run(&self) -> Vec<SweepOutcome> {
        self.points
            .iter()
            .map(|point| {
                info!(
                    "sweep point depth={} width={} repetitions={}",
                    point.depth, point.width, point.repetitions
                );
                let result = Orchestrator::new(point.config(&self.base))
                    .map_err(VerificationError::from)
                    .and_then(|mut orchestrator| orchestrator.run_all());
                if let Err(err) = &result {
                    warn!("sweep point depth={} failed: {err}", point.depth);
                }
                SweepOutcome {
                    point: *point,
                    result,
                }
            })
            .collect()
    }
}

/// Result of running the suite at one [`SweepPoint`].
#[derive(Debug)]
pub struct SweepOutcome {
    pub point: SweepPoint,
    pub result: Result<Vec<ScenarioReport>, VerificationError>,
}

impl SweepOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

impl Serialize for SweepOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SweepOutcome", 3)?;
        state.serialize_field("point", &self.point)?;
        match &self.result {
            Ok(reports) => {
                state.serialize_field("reports", reports)?;
                state.serialize_field("failure", &None::<String>)?;
            }
            Err(err) => {
                state.serialize_field("reports", &[] as &[ScenarioReport])?;
                state.serialize_field("failure", &Some(err.to_string()))?;
            }
        }
        state.end()
    }
}
