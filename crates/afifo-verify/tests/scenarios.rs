use afifo_verify::{ClockMode, HarnessConfig, Orchestrator, ScenarioKind, SweepPlan};
use proptest::prelude::*;
use test_case::test_case;

fn orchestrator(config: HarnessConfig) -> Orchestrator {
    let _ = env_logger::builder().is_test(true).try_init();
    Orchestrator::new(config).unwrap()
}

#[test_case(1 ; "single slot")]
#[test_case(2 ; "depth 2")]
#[test_case(3 ; "non power of two")]
#[test_case(4 ; "depth 4")]
#[test_case(16 ; "depth 16")]
#[test_case(32 ; "depth 32")]
fn test_suite_passes_in_both_clock_modes(depth: usize) {
    let mut harness = orchestrator(HarnessConfig::new(depth, 8, 4).with_seed(depth as u64));
    let reports = harness.run_all().unwrap();
    assert_eq!(reports.len(), 2 * ScenarioKind::ALL.len());
    for mode in ClockMode::ALL {
        assert_eq!(
            reports.iter().filter(|r| r.clock_mode == mode).count(),
            ScenarioKind::ALL.len()
        );
    }
}

#[test_case(ClockMode::WriteSlow)]
#[test_case(ClockMode::WriteFast)]
fn test_write_full_report(mode: ClockMode) {
    let mut harness = orchestrator(HarnessConfig::new(8, 16, 1).with_seed(11));
    let report = harness.run_write_full(mode).unwrap();
    assert_eq!(report.kind, ScenarioKind::WriteFull);
    assert_eq!(report.clock_mode, mode);
    assert_eq!(report.words_written, 8);
    assert_eq!(report.words_read, 0);
    assert_eq!(report.rejections, 1);
    assert!(report.sim_time > 0);
}

#[test]
fn test_read_empty_report() {
    let mut harness = orchestrator(HarnessConfig::new(4, 8, 1).with_seed(12));
    let report = harness.run_read_empty(ClockMode::WriteFast).unwrap();
    assert_eq!(
        (report.words_written, report.words_read, report.rejections),
        (1, 1, 1)
    );
}

/// A read clock that starts late still fits inside the derived time limit.
#[test]
fn test_late_clock_start_is_not_a_hang() {
    let mut config = HarnessConfig::new(4, 8, 1).with_seed(21);
    config.clocks.read_delay = 100_000;
    let mut harness = orchestrator(config);
    harness.run_read_empty(ClockMode::WriteSlow).unwrap();
    harness.run_write_full(ClockMode::WriteFast).unwrap();
}

#[test]
fn test_zero_repetitions_still_resets_cleanly() {
    let mut harness = orchestrator(HarnessConfig::new(4, 8, 0).with_seed(13));
    let report = harness.run_randomized(ClockMode::WriteSlow).unwrap();
    assert_eq!(report.words_written, 0);
    assert_eq!(report.words_read, 0);
}

#[test]
fn test_streaming_moves_several_depths_of_data() {
    let mut harness = orchestrator(HarnessConfig::new(4, 32, 1).with_seed(14));
    let report = harness.run_streaming(ClockMode::WriteFast).unwrap();
    assert_eq!(report.words_written, 17);
    assert_eq!(report.words_read, 17);
}

#[test]
fn test_same_seed_gives_same_reports() {
    let config = HarnessConfig::new(8, 8, 6).with_seed(99);
    let first = orchestrator(config.clone()).run_all().unwrap();
    let second = orchestrator(config).run_all().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_custom_port_names_bind_end_to_end() {
    let config = HarnessConfig::from_toml_str(
        r#"
        depth = 4
        width = 8
        repetitions = 2
        seed = 21

        [ports]
        wr_clk = "clk_w"
        rd_clk = "clk_r"
        "#,
    )
    .unwrap();
    let mut harness = orchestrator(config);
    harness.run_randomized(ClockMode::WriteFast).unwrap();
}

#[test]
fn test_reports_serialize() {
    let mut harness = orchestrator(HarnessConfig::new(2, 4, 1).with_seed(15));
    let report = harness.run_write_full(ClockMode::WriteSlow).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["kind"], "WriteFull");
    assert_eq!(json["clock_mode"], "WriteSlow");
    assert_eq!(json["words_written"], 2);
}

#[test]
fn test_small_sweep_passes() {
    let plan = SweepPlan::with_depths(HarnessConfig::default(), 7, &[2, 5]);
    let outcomes = plan.run();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.passed()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any geometry and any seed: randomized batches come back intact and in
    /// order under both clock relationships.
    #[test]
    fn prop_randomized_batches_round_trip(
        depth in 1usize..=12,
        width in 1usize..=72,
        repetitions in 0usize..=6,
        seed in any::<u64>(),
    ) {
        let mut harness = orchestrator(HarnessConfig::new(depth, width, repetitions).with_seed(seed));
        for mode in ClockMode::ALL {
            let report = harness.run_randomized(mode).unwrap();
            prop_assert_eq!(report.words_written, report.words_read);
            prop_assert!(report.words_written <= depth * repetitions);
        }
    }
}
