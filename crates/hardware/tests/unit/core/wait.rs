//! # Wait Policy Tests
//!
//! Fixed waits, PC polling, timeouts, serde shape, and `CoreController::wait`.

use std::time::Duration;

use rvboot_core::common::error::ControllerError;
use rvboot_core::core::wait::{self, WaitPolicy, WaitReason};
use rvboot_core::core::RunState;

use crate::common::harness::{controller_with, loopback_controller, test_core};

fn fixed(ms: u64) -> WaitPolicy {
    WaitPolicy::Fixed {
        duration: Duration::from_millis(ms),
    }
}

fn until_changes(timeout_ms: u64) -> WaitPolicy {
    WaitPolicy::UntilPcChanges {
        timeout: Duration::from_millis(timeout_ms),
        poll_interval: Duration::from_millis(1),
    }
}

#[test]
fn test_default_is_five_second_fixed_wait() {
    assert_eq!(WaitPolicy::default(), fixed(5000));
}

#[test]
fn test_fixed_samples_once_after_duration() {
    let outcome = wait::run(&fixed(20), || Ok(0x40)).unwrap();
    assert_eq!(outcome.pc, 0x40);
    assert_eq!(outcome.reason, WaitReason::Elapsed);
    assert_eq!(outcome.samples, 1);
    assert!(outcome.elapsed >= Duration::from_millis(20));
    assert!(outcome.completed());
}

#[test]
fn test_until_pc_changes_detects_progress() {
    let mut pcs = [0u32, 0, 0, 8].into_iter();
    let outcome = wait::run(&until_changes(1000), || Ok(pcs.next().unwrap_or(8))).unwrap();
    assert_eq!(outcome.pc, 8);
    assert_eq!(outcome.reason, WaitReason::PcChanged);
    assert_eq!(outcome.samples, 4);
}

#[test]
fn test_until_pc_changes_times_out_on_stuck_pc() {
    let outcome = wait::run(&until_changes(20), || Ok(0x100)).unwrap();
    assert_eq!(outcome.pc, 0x100);
    assert_eq!(outcome.reason, WaitReason::TimedOut);
    assert!(!outcome.completed());
    assert!(outcome.elapsed >= Duration::from_millis(20));
}

#[test]
fn test_until_pc_equals_reaches_target() {
    let policy = WaitPolicy::UntilPcEquals {
        target: 0x10,
        timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(1),
    };
    let mut pc = 0u32;
    let outcome = wait::run(&policy, || {
        let current = pc;
        pc += 4;
        Ok(current)
    })
    .unwrap();
    assert_eq!(outcome.pc, 0x10);
    assert_eq!(outcome.reason, WaitReason::PcReached);
    assert_eq!(outcome.samples, 5);
}

#[test]
fn test_until_pc_equals_immediate_match_does_not_sleep() {
    let policy = WaitPolicy::UntilPcEquals {
        target: 0,
        timeout: Duration::from_secs(5),
        poll_interval: Duration::from_secs(5),
    };
    let outcome = wait::run(&policy, || Ok(0)).unwrap();
    assert_eq!(outcome.samples, 1);
    assert!(outcome.elapsed < Duration::from_secs(1));
}

#[test]
fn test_sample_errors_propagate() {
    let err = wait::run(&until_changes(100), || {
        Err(ControllerError::Bus {
            register: "PROGRAM_COUNTER",
            reason: "gone".to_string(),
        })
    })
    .unwrap_err();
    assert!(matches!(err, ControllerError::Bus { .. }));
}

#[test]
fn test_policy_json_shape() {
    let policy: WaitPolicy =
        serde_json::from_str(r#"{ "kind": "until_pc_equals", "target": 64, "timeout_millis": 250 }"#)
            .unwrap();
    assert_eq!(
        policy,
        WaitPolicy::UntilPcEquals {
            target: 64,
            timeout: Duration::from_millis(250),
            poll_interval: Duration::from_millis(10),
        }
    );

    let json = serde_json::to_value(fixed(5000)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "fixed", "millis": 5000 }));
}

#[test]
fn test_controller_wait_requires_running() {
    let mut controller = loopback_controller(64);
    assert!(matches!(
        controller.wait(&fixed(0)),
        Err(ControllerError::InvalidState {
            operation: "wait",
            state: RunState::Halted
        })
    ));
}

#[test]
fn test_controller_wait_sees_progress() {
    let mut controller = controller_with(test_core().with_entry_pc(0x80), 64);
    controller.start().unwrap();
    let outcome = controller.wait(&until_changes(1000)).unwrap();
    assert_eq!(outcome.reason, WaitReason::PcChanged);
    assert_eq!(outcome.pc, 0x84);
    assert_eq!(controller.state(), RunState::Running);
}

#[test]
fn test_controller_wait_timeout_is_not_an_error() {
    let mut controller = controller_with(test_core().with_step(0), 64);
    controller.start().unwrap();
    let outcome = controller.wait(&until_changes(15)).unwrap();
    assert_eq!(outcome.reason, WaitReason::TimedOut);
    assert_eq!(controller.state(), RunState::Running);
}

#[test]
fn test_controller_wait_bus_error_faults() {
    let mut controller = loopback_controller(64);
    controller.start().unwrap();
    controller.bus_mut().fail_next_access("lost");
    assert!(controller.wait(&fixed(0)).is_err());
    assert_eq!(controller.state(), RunState::Faulted);
}
