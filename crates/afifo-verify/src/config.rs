use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a harness run needs: FIFO geometry, repetition count, clocking,
/// reset timing and port bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Slot count of the FIFO under test.
    pub depth: usize,
    /// Data width in bits.
    pub width: usize,
    /// Randomized batches per clock mode.
    pub repetitions: usize,
    /// Seed for batch generation; a fresh seed is drawn when unset.
    pub seed: Option<u64>,
    /// Simulated-time bound for one scenario, in ns. Derived from the other
    /// fields when unset.
    pub time_limit: Option<u64>,
    pub clocks: ClockConfig,
    pub reset: ResetConfig,
    pub ports: PortNames,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            width: 8,
            repetitions: 10,
            seed: None,
            time_limit: None,
            clocks: ClockConfig::default(),
            reset: ResetConfig::default(),
            ports: PortNames::default(),
        }
    }
}

/// Periods of the two clocks. Which domain gets the fast clock is chosen per
/// scenario by [`ClockMode`](crate::ClockMode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    pub fast_period: u64,
    pub slow_period: u64,
    /// Time of the first rising edge of the write clock.
    pub write_delay: u64,
    /// Time of the first rising edge of the read clock.
    pub read_delay: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 20,
            write_delay: 0,
            read_delay: 0,
        }
    }
}

/// Reset pulse lengths, each counted in the owning domain's cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResetConfig {
    pub write_cycles: usize,
    pub read_cycles: usize,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            write_cycles: 2,
            read_cycles: 2,
        }
    }
}

/// Names of the device ports the driver binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortNames {
    pub wr_clk: String,
    pub wr_en: String,
    pub wr_data: String,
    pub wr_full: String,
    pub wr_arst: String,
    pub rd_clk: String,
    pub rd_en: String,
    pub rd_data: String,
    pub rd_empty: String,
    pub rd_arst: String,
}

impl Default for PortNames {
    fn default() -> Self {
        Self {
            wr_clk: "wr_clk".to_string(),
            wr_en: "wr_en".to_string(),
            wr_data: "wr_data".to_string(),
            wr_full: "wr_full".to_string(),
            wr_arst: "wr_arst".to_string(),
            rd_clk: "rd_clk".to_string(),
            rd_en: "rd_en".to_string(),
            rd_data: "rd_data".to_string(),
            rd_empty: "rd_empty".to_string(),
            rd_arst: "rd_arst".to_string(),
        }
    }
}

impl HarnessConfig {
    pub fn new(depth: usize, width: usize, repetitions: usize) -> Self {
        Self {
            depth,
            width,
            repetitions,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit(mut self, limit: u64) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Parses and validates a TOML document. Omitted fields take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 {
            return Err(invalid("depth", "must be greater than zero"));
        }
        if self.width == 0 {
            return Err(invalid("width", "must be greater than zero"));
        }
        for (field, period) in [
            ("clocks.fast_period", self.clocks.fast_period),
            ("clocks.slow_period", self.clocks.slow_period),
        ] {
            if period < 2 || !period.is_multiple_of(2) {
                return Err(invalid(field, "must be even and at least 2"));
            }
        }
        if self.clocks.fast_period > self.clocks.slow_period {
            return Err(invalid(
                "clocks.fast_period",
                "must not exceed clocks.slow_period",
            ));
        }
        if self.reset.write_cycles == 0 {
            return Err(invalid("reset.write_cycles", "must be at least one cycle"));
        }
        if self.reset.read_cycles == 0 {
            return Err(invalid("reset.read_cycles", "must be at least one cycle"));
        }
        if self.time_limit == Some(0) {
            return Err(invalid("time_limit", "must be greater than zero"));
        }
        Ok(())
    }

    /// Time limit applied to each scenario run.
    ///
    /// The derived bound allows every word of every batch a generous number
    /// of slow-clock cycles, covering synchronizer latency on both sides, on
    /// top of the later of the two clock start delays. It saturates instead
    /// of overflowing.
    pub fn effective_time_limit(&self) -> u64 {
        self.time_limit.unwrap_or_else(|| {
            let words = (self.repetitions as u64)
                .saturating_add(4)
                .saturating_mul((self.depth as u64).saturating_add(1));
            let reset_cycles =
                (self.reset.write_cycles as u64).saturating_add(self.reset.read_cycles as u64);
            let cycles = words
                .saturating_mul(16)
                .saturating_add(reset_cycles.saturating_mul(4))
                .saturating_add(64);
            let start = self.clocks.write_delay.max(self.clocks.read_delay);
            cycles
                .saturating_mul(self.clocks.slow_period)
                .saturating_add(start)
        })
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}
