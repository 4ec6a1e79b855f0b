//! Rollback ordering, partial injection, blast-radius enforcement, and
//! revert-failure tolerance.

use std::sync::Arc;

use faultline_core::engine::{stop_channel, ExperimentRunner, RunState};
use faultline_core::model::{
    BlastRadiusSpec, Comparison, ExperimentConfig, ExperimentStep, Hypothesis,
};
use faultline_core::predicate::{Op, Predicate};
use faultline_sim::{RecordingActuator, ScriptedMetricsSource, StaticRegistry};

fn step(action: &str) -> ExperimentStep {
    ExperimentStep {
        action: action.into(),
        target: "service:checkout".into(),
        parameters: Default::default(),
    }
}

fn experiment(steps: Vec<ExperimentStep>, percentage: u32) -> ExperimentConfig {
    ExperimentConfig {
        name: "rollback-ordering".into(),
        hypothesis: Hypothesis {
            steady_state_metric: "error_rate".into(),
            steady_state_threshold: 0.1,
            comparison: Comparison::LessOrEqual,
            rollback_condition: Predicate::threshold("error_rate", Op::Gt, 0.3),
            expected_outcome: String::new(),
        },
        steps,
        blast_radius: BlastRadiusSpec { percentage },
        selector: "service:checkout".into(),
        duration_secs: 30,
    }
}

fn harness(
    population: &[&str],
) -> (Arc<RecordingActuator>, ExperimentRunner) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let metrics = Arc::new(ScriptedMetricsSource::new().script("error_rate", [0.05]));
    let actuator = Arc::new(RecordingActuator::new());
    let registry = Arc::new(
        StaticRegistry::new().with_population("service:checkout", population.iter().copied()),
    );
    let runner = ExperimentRunner::new(metrics, actuator.clone(), registry);
    (actuator, runner)
}

#[tokio::test(start_paused = true)]
async fn failed_second_step_reverts_only_the_first() {
    let (actuator, runner) = harness(&["i-1"]);
    actuator.fail_nth_apply(2);
    let (_stop, signal) = stop_channel();

    let cfg = experiment(vec![step("kill-process"), step("drop-traffic"), step("burn-cpu")], 100);
    let result = runner.run(&cfg, signal).await;

    // Step 1 applied and reverted; step 2 failed; step 3 never attempted.
    assert_eq!(
        actuator.applied(),
        vec![("kill-process".to_string(), "i-1".to_string())]
    );
    assert_eq!(
        actuator.revert_order(),
        vec![("kill-process".to_string(), "i-1".to_string())]
    );
    assert!(!result.success);
    assert_eq!(result.final_state, RunState::Completed);
    assert!(result
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("injection failed"));
    assert!(result.samples.is_empty(), "a failed injection is never monitored");
    assert!(actuator.live().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rollback_reverses_the_exact_application_order() {
    let (actuator, runner) = harness(&["i-1", "i-2"]);
    let (_stop, signal) = stop_channel();

    let cfg = experiment(vec![step("add-latency"), step("drop-traffic")], 100);
    let result = runner.run(&cfg, signal).await;

    assert!(result.success, "failure: {:?}", result.failure_reason);
    let applied = actuator.applied();
    assert_eq!(applied.len(), 4); // 2 steps x 2 targets, step-major order
    assert_eq!(applied[0].0, "add-latency");
    assert_eq!(applied[3].0, "drop-traffic");

    let mut expected = applied.clone();
    expected.reverse();
    assert_eq!(actuator.revert_order(), expected);
    assert!(actuator.live().is_empty());
}

#[tokio::test(start_paused = true)]
async fn blast_radius_is_enforced_before_any_actuator_call() {
    let (actuator, runner) = harness(&[
        "i-009", "i-002", "i-007", "i-001", "i-005", "i-000", "i-006", "i-003", "i-008", "i-004",
    ]);
    let (_stop, signal) = stop_channel();

    let cfg = experiment(vec![step("kill-process")], 30);
    let result = runner.run(&cfg, signal).await;

    assert!(result.success, "failure: {:?}", result.failure_reason);
    // ceil(10 * 30%) = 3, and selection is the sorted prefix regardless of
    // registry order.
    assert_eq!(
        actuator.applied(),
        vec![
            ("kill-process".to_string(), "i-000".to_string()),
            ("kill-process".to_string(), "i-001".to_string()),
            ("kill-process".to_string(), "i-002".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn minimum_one_target_with_a_tiny_percentage() {
    let (actuator, runner) = harness(&["i-1"]);
    let (_stop, signal) = stop_channel();

    let result = runner.run(&experiment(vec![step("kill-process")], 1), signal).await;

    assert!(result.success, "failure: {:?}", result.failure_reason);
    assert_eq!(actuator.applied().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_percentage_never_reaches_the_actuator() {
    let (actuator, runner) = harness(&["i-1"]);
    let (_stop, signal) = stop_channel();

    let result = runner.run(&experiment(vec![step("kill-process")], 0), signal).await;

    assert!(!result.success);
    assert_eq!(result.final_state, RunState::Aborted);
    assert!(result
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("blast radius"));
    assert!(actuator.applied().is_empty());
}

#[tokio::test(start_paused = true)]
async fn revert_failures_are_aggregated_and_do_not_stop_rollback() {
    let (actuator, runner) = harness(&["i-1"]);
    actuator.fail_revert_for("drop-traffic", "i-1");
    let (_stop, signal) = stop_channel();

    let cfg = experiment(
        vec![step("add-latency"), step("drop-traffic"), step("burn-cpu")],
        100,
    );
    let result = runner.run(&cfg, signal).await;

    // All three reverts were attempted, in reverse order, despite the
    // middle one failing.
    assert_eq!(
        actuator.revert_order(),
        vec![
            ("burn-cpu".to_string(), "i-1".to_string()),
            ("drop-traffic".to_string(), "i-1".to_string()),
            ("add-latency".to_string(), "i-1".to_string()),
        ]
    );
    assert!(actuator.is_live("drop-traffic", "i-1"));
    assert!(!result.success);
    assert!(!result.rollback_triggered);
    let reason = result.failure_reason.as_deref().unwrap();
    assert!(reason.contains("not restored"));
    assert!(reason.contains("i-1"));

    let flags: Vec<(String, bool)> = result
        .applied
        .iter()
        .map(|a| (a.step.action.clone(), a.reverted))
        .collect();
    assert_eq!(
        flags,
        vec![
            ("add-latency".to_string(), true),
            ("drop-traffic".to_string(), false),
            ("burn-cpu".to_string(), true),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn result_serializes_with_the_full_audit_trail() {
    let (_, runner) = harness(&["i-1"]);
    let (_stop, signal) = stop_channel();

    let result = runner
        .run(&experiment(vec![step("kill-process")], 100), signal)
        .await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["final_state"], "completed");
    assert_eq!(json["applied"][0]["step"]["action"], "kill-process");
    assert_eq!(json["applied"][0]["reverted"], true);
    assert!(json["samples"].as_array().unwrap().len() >= 2);
}
