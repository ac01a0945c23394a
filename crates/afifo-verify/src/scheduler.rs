use crate::signal::SignalRef;
use crate::{HashMap, SimulationError};
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
pub struct ClockDef {
    pub period: u64,
}

#[derive(Debug, Clone)]
pub struct SimEvent {
    pub time: u64,
    pub signal: SignalRef,
    pub next_val: bool,
}

impl PartialEq for SimEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.signal == other.signal && self.next_val == other.next_val
    }
}

impl Eq for SimEvent {}

impl PartialOrd for SimEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Earlier time has higher priority (BinaryHeap is a Max-Heap)
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.signal.cmp(&self.signal))
            .then_with(|| other.next_val.cmp(&self.next_val))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    pub(crate) time: u64,
    pub(crate) clocks: HashMap<SignalRef, ClockDef>,
    pub(crate) event_queue: BinaryHeap<SimEvent>,
}

impl Scheduler {
    /// Registers a periodic clock. The first rising edge happens at
    /// `initial_delay`, then the clock toggles every half period.
    pub fn add_clock(
        &mut self,
        signal: SignalRef,
        period: u64,
        initial_delay: u64,
    ) -> Result<(), SimulationError> {
        if period < 2 || !period.is_multiple_of(2) {
            return Err(SimulationError::InvalidPeriod(period));
        }
        self.clocks.insert(signal, ClockDef { period });
        self.push(SimEvent {
            time: initial_delay,
            signal,
            next_val: true,
        });
        Ok(())
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn push(&mut self, event: SimEvent) {
        self.event_queue.push(event);
    }

    pub fn pop_all_at_next_time(&mut self) -> Option<(u64, Vec<SimEvent>)> {
        let next_time = self.next_event_time()?;
        let mut events = Vec::new();
        while self.next_event_time() == Some(next_time) {
            if let Some(ev) = self.event_queue.pop() {
                events.push(ev);
            }
        }
        Some((next_time, events))
    }

    /// Enqueues the opposite level of a clock event half a period later.
    pub fn reschedule(&mut self, event: &SimEvent) {
        if let Some(def) = self.clocks.get(&event.signal) {
            let half_period = def.period / 2;
            self.push(SimEvent {
                time: event.time + half_period,
                signal: event.signal,
                next_val: !event.next_val,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_pop_in_time_order() {
        let mut sched = Scheduler::default();
        sched.add_clock(SignalRef(0), 20, 0).unwrap();
        sched.add_clock(SignalRef(1), 10, 3).unwrap();

        let (t0, evs) = sched.pop_all_at_next_time().unwrap();
        assert_eq!(t0, 0);
        assert_eq!(evs.len(), 1);
        for ev in &evs {
            sched.reschedule(ev);
        }
        let (t1, evs) = sched.pop_all_at_next_time().unwrap();
        assert_eq!(t1, 3);
        assert_eq!(evs[0].signal, SignalRef(1));
        assert!(evs[0].next_val);
        for ev in &evs {
            sched.reschedule(ev);
        }
        // clk1 falls at 8, clk0 falls at 10
        assert_eq!(sched.next_event_time(), Some(8));
    }

    #[test]
    fn test_simultaneous_edges_pop_together() {
        let mut sched = Scheduler::default();
        sched.add_clock(SignalRef(0), 10, 0).unwrap();
        sched.add_clock(SignalRef(1), 20, 0).unwrap();
        let (time, evs) = sched.pop_all_at_next_time().unwrap();
        assert_eq!(time, 0);
        assert_eq!(evs.len(), 2);
        assert!(sched.pop_all_at_next_time().is_none());
    }

    #[test]
    fn test_invalid_period_is_rejected() {
        let mut sched = Scheduler::default();
        assert!(matches!(
            sched.add_clock(SignalRef(0), 7, 0),
            Err(SimulationError::InvalidPeriod(7))
        ));
        assert!(matches!(
            sched.add_clock(SignalRef(0), 0, 0),
            Err(SimulationError::InvalidPeriod(0))
        ));
    }
}
