use afifo_verify::{
    AsyncFifo, BigUint, ConfigError, FifoParams, FlowFlag, HarnessConfig, Simulation,
    SimulationError, VerificationError,
};
use insta::assert_snapshot;

fn simulation(time_limit: u64) -> Simulation {
    let fifo = AsyncFifo::new(FifoParams::new(4, 8)).unwrap();
    Simulation::builder(fifo)
        .time_limit(time_limit)
        .build()
        .unwrap()
}

#[test]
fn test_data_mismatch_message() {
    let err = VerificationError::DataMismatch {
        position: 2,
        expected: BigUint::from(0x03u32),
        observed: BigUint::from(0x02u32),
    };
    assert_snapshot!(err.to_string(), @"Data mismatch at position 2: expected 0x3, observed 0x2");
}

#[test]
fn test_flow_control_violation_message() {
    let err = VerificationError::FlowControlViolation {
        flag: FlowFlag::Full,
        observed: false,
        context: "write accepted with 4 words already stored".to_string(),
    };
    assert_snapshot!(
        err.to_string(),
        @"Flow control violation: write accepted with 4 words already stored (wr_full = 0)"
    );
}

#[test]
fn test_wait_past_time_limit_is_a_hang() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sim = simulation(100);
    sim.add_clock("wr_clk", 20, 0).unwrap();
    let clock = sim.handle().clock("wr_clk").unwrap();

    let err = sim
        .run(async move { clock.cycles(100).await })
        .unwrap_err();
    assert!(matches!(err, SimulationError::Timeout { limit: 100, time: 100 }));
    assert_snapshot!(
        VerificationError::from(err).to_string(),
        @"Protocol hang: Simulation time limit of 100 exceeded at t=100 (a transaction never resolved)"
    );
}

#[test]
fn test_wait_without_clocks_stalls() {
    let mut sim = simulation(100);
    let clock = sim.handle().clock("rd_clk").unwrap();

    let err = sim
        .run(async move { clock.rising_edge().await })
        .unwrap_err();
    assert_snapshot!(
        VerificationError::from(err).to_string(),
        @"Protocol hang: Simulation stalled at t=0: no clock events remain"
    );
}

#[test]
fn test_setup_errors_are_harness_failures() {
    let mut sim = simulation(100);
    let err = sim.add_clock("wr_clk", 15, 0).unwrap_err();
    assert_snapshot!(err.to_string(), @"Clock period 15 is invalid: it must be even and at least 2");

    let err = sim.add_clock("wr_en", 10, 0).unwrap_err();
    assert_snapshot!(
        VerificationError::from(err).to_string(),
        @"Harness failure: Signal 'wr_en' is not a clock (only clock ports can be driven periodically)"
    );

    let err = sim.handle().signal("wr_valid").unwrap_err();
    assert_snapshot!(err.to_string(), @"Unknown signal 'wr_valid'");
}

#[test]
fn test_config_errors_pass_through() {
    let err = HarnessConfig::from_toml_str("depth = 0").unwrap_err();
    assert_snapshot!(
        VerificationError::from(err).to_string(),
        @"Invalid value for `depth`: must be greater than zero"
    );

    let err = HarnessConfig::from_toml_str("depth = \"four\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HarnessConfig::load(dir.path().join("harness.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
