use afifo_verify::{
    AsyncFifo, BigUint, FifoParams, PortNames, ResetConfig, ResetSequencer, Simulation,
    SimulationError,
};
use test_case::test_case;

fn simulation() -> Simulation {
    let _ = env_logger::builder().is_test(true).try_init();
    let fifo = AsyncFifo::new(FifoParams::new(4, 8)).unwrap();
    let mut sim = Simulation::builder(fifo).time_limit(10_000).build().unwrap();
    sim.add_clock("wr_clk", 20, 0).unwrap();
    sim.add_clock("rd_clk", 10, 0).unwrap();
    sim
}

/// The write pulse counts write-clock rising edges from t=0; the read pulse
/// starts afterwards and counts read-clock rising edges strictly after it.
#[test_case(2, 2, 20, 40 ; "default pulses")]
#[test_case(3, 1, 40, 50 ; "long write pulse")]
#[test_case(1, 4, 0, 40  ; "long read pulse")]
fn test_reset_pulse_timing(
    write_cycles: usize,
    read_cycles: usize,
    wr_release: u64,
    rd_release: u64,
) {
    let mut sim = simulation();
    let handle = sim.handle();
    let ports = PortNames::default();
    let timing = ResetConfig {
        write_cycles,
        read_cycles,
    };
    let reset = ResetSequencer::bind(&handle, &ports, timing).unwrap();
    let wr_arst = handle.signal("wr_arst").unwrap();
    let rd_arst = handle.signal("rd_arst").unwrap();

    let monitor = handle.clone();
    let released = sim
        .run(async move {
            let watcher = monitor.clone();
            let wr_watch = monitor.spawn(async move {
                let clock = watcher.clock("wr_clk").unwrap();
                while watcher.is_high(wr_arst) {
                    clock.rising_edge().await;
                }
                watcher.time()
            });
            reset.run().await;
            assert!(!monitor.is_high(rd_arst));
            (wr_watch.await, monitor.time())
        })
        .unwrap();

    // the watcher resumes on the first write edge after the release
    assert!(released.0 >= wr_release);
    assert!(released.0 <= wr_release + 20);
    assert_eq!(released.1, rd_release);
}

#[test]
fn test_reset_drives_known_levels_immediately() {
    let mut sim = simulation();
    let handle = sim.handle();
    let reset =
        ResetSequencer::bind(&handle, &PortNames::default(), ResetConfig::default()).unwrap();
    let wr_arst = handle.signal("wr_arst").unwrap();
    let rd_arst = handle.signal("rd_arst").unwrap();
    let rd_empty = handle.signal("rd_empty").unwrap();
    let wr_full = handle.signal("wr_full").unwrap();

    sim.run(async move { reset.run().await }).unwrap();
    assert!(!handle.is_high(wr_arst));
    assert!(!handle.is_high(rd_arst));
    assert!(handle.is_high(rd_empty));
    assert!(!handle.is_high(wr_full));
}

/// Data left in the FIFO does not survive a second reset.
#[test]
fn test_second_reset_discards_stored_words() {
    let mut sim = simulation();
    let handle = sim.handle();
    let ports = PortNames::default();
    let reset = ResetSequencer::bind(&handle, &ports, ResetConfig::default()).unwrap();
    let driver = afifo_verify::AfifoDriver::bind(&handle, &ports).unwrap();

    let (first, second) = sim
        .run(async move {
            reset.run().await;
            for value in [1u32, 2, 3] {
                driver.write(&BigUint::from(value), false).await;
            }
            let before = driver.read(true).await;
            reset.run().await;
            (before, driver.read(true).await)
        })
        .unwrap();
    assert_eq!(first.payload(), Some(&BigUint::from(1u32)));
    assert_eq!(second, afifo_verify::ReadOutcome::RejectedEmpty);
}

#[test]
fn test_binding_requires_reset_ports() {
    let sim = simulation();
    let ports = PortNames {
        wr_arst: "wr_rst_n".to_string(),
        ..PortNames::default()
    };
    let err = ResetSequencer::bind(&sim.handle(), &ports, ResetConfig::default()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown signal 'wr_rst_n'");
}

/// A zero-cycle pulse would never assert reset, so binding refuses it.
#[test_case(0, 2, "write" ; "empty write pulse")]
#[test_case(2, 0, "read"  ; "empty read pulse")]
fn test_empty_reset_pulse_is_rejected(write_cycles: usize, read_cycles: usize, domain: &str) {
    let sim = simulation();
    let timing = ResetConfig {
        write_cycles,
        read_cycles,
    };
    let err = ResetSequencer::bind(&sim.handle(), &PortNames::default(), timing).unwrap_err();
    assert!(matches!(err, SimulationError::EmptyResetPulse(d) if d == domain));
    assert_eq!(
        err.to_string(),
        format!("Reset pulse for the {domain} domain must last at least one cycle")
    );
}
