use crate::{HashMap, SimulationError};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Handle to a signal in a [`SignalTable`].
///
/// Resolving a name once and keeping the handle avoids map lookups on every
/// access from the driver loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalRef(pub(crate) usize);

/// Role of a port as seen from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Clock,
    Reset,
    Input,
    Output,
}

/// A named signal with its resolved handle and metadata.
#[derive(Debug, Clone)]
pub struct NamedSignal {
    pub name: String,
    pub signal: SignalRef,
    pub width: usize,
    pub kind: PortKind,
}

/// Current value of every declared wire.
///
/// Values are stored as unsigned integers of arbitrary width and are masked
/// to the declared width on every write.
#[derive(Debug, Default)]
pub struct SignalTable {
    by_name: HashMap<String, SignalRef>,
    signals: Vec<NamedSignal>,
    values: Vec<BigUint>,
    masks: Vec<BigUint>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new signal initialized to zero.
    pub fn declare(
        &mut self,
        name: &str,
        width: usize,
        kind: PortKind,
    ) -> Result<SignalRef, SimulationError> {
        if self.by_name.contains_key(name) {
            return Err(SimulationError::DuplicateSignal(name.to_string()));
        }
        if width == 0 {
            return Err(SimulationError::ZeroWidth(name.to_string()));
        }
        let signal = SignalRef(self.signals.len());
        self.by_name.insert(name.to_string(), signal);
        self.signals.push(NamedSignal {
            name: name.to_string(),
            signal,
            width,
            kind,
        });
        self.values.push(BigUint::zero());
        self.masks.push((BigUint::one() << width) - 1u32);
        Ok(signal)
    }

    pub fn lookup(&self, name: &str) -> Option<SignalRef> {
        self.by_name.get(name).copied()
    }

    /// Resolves a name, failing with [`SimulationError::UnknownSignal`].
    pub fn resolve(&self, name: &str) -> Result<SignalRef, SimulationError> {
        self.lookup(name)
            .ok_or_else(|| SimulationError::UnknownSignal(name.to_string()))
    }

    pub fn get(&self, signal: SignalRef) -> &BigUint {
        &self.values[signal.0]
    }

    pub fn is_high(&self, signal: SignalRef) -> bool {
        !self.values[signal.0].is_zero()
    }

    /// Writes a value, truncating it to the signal's width.
    pub fn set(&mut self, signal: SignalRef, value: BigUint) {
        self.values[signal.0] = value & &self.masks[signal.0];
    }

    pub fn set_bit(&mut self, signal: SignalRef, high: bool) {
        self.values[signal.0] = if high { BigUint::one() } else { BigUint::zero() };
    }

    pub fn width(&self, signal: SignalRef) -> usize {
        self.signals[signal.0].width
    }

    pub fn info(&self, signal: SignalRef) -> &NamedSignal {
        &self.signals[signal.0]
    }

    pub fn named_signals(&self) -> &[NamedSignal] {
        &self.signals
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_masked_to_width() {
        let mut table = SignalTable::new();
        let data = table.declare("data", 4, PortKind::Input).unwrap();
        table.set(data, BigUint::from(0x1Fu32));
        assert_eq!(table.get(data), &BigUint::from(0xFu32));
    }

    #[test]
    fn test_wide_signal_keeps_all_bits() {
        let mut table = SignalTable::new();
        let data = table.declare("data", 1024, PortKind::Input).unwrap();
        let value = (BigUint::one() << 1023usize) | BigUint::one();
        table.set(data, value.clone());
        assert_eq!(table.get(data), &value);
    }

    #[test]
    fn test_duplicate_and_unknown_names() {
        let mut table = SignalTable::new();
        table.declare("clk", 1, PortKind::Clock).unwrap();
        assert!(matches!(
            table.declare("clk", 1, PortKind::Clock),
            Err(SimulationError::DuplicateSignal(_))
        ));
        assert!(matches!(
            table.resolve("missing"),
            Err(SimulationError::UnknownSignal(_))
        ));
        assert!(matches!(
            table.declare("bus", 0, PortKind::Input),
            Err(SimulationError::ZeroWidth(_))
        ));
    }

    #[test]
    fn test_bit_helpers() {
        let mut table = SignalTable::new();
        let en = table.declare("en", 1, PortKind::Input).unwrap();
        assert!(!table.is_high(en));
        table.set_bit(en, true);
        assert!(table.is_high(en));
        assert_eq!(table.info(en).name, "en");
        assert_eq!(table.width(en), 1);
    }
}
