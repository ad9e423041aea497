//! # Loopback Core Tests
//!
//! Register latching, PC progress modelling, access logging and fault injection of
//! the in-process stand-in for the external core.

use rvboot_core::common::PhysAddr;
use rvboot_core::common::error::ControllerError;
use rvboot_core::soc::RegisterBus;
use rvboot_core::soc::devices::{LoopbackCore, RegisterAccess};
use rvboot_core::soc::regs::{CONTROL_ENABLE, MEM_BASE_ADDRESS, PROGRAM_COUNTER, RunControl};

use crate::common::harness::test_core;

#[test]
fn test_identity() {
    let core = test_core();
    assert_eq!(core.name(), "loopback");
    assert_eq!(core.base_address(), PhysAddr::new(0x43C0_0000));
    assert_eq!(LoopbackCore::default().base_address(), PhysAddr::new(0));
}

#[test]
fn test_registers_latch() {
    let mut core = test_core();
    core.write_u32(MEM_BASE_ADDRESS, 0x1000_0000).unwrap();
    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    assert_eq!(core.read_u32(MEM_BASE_ADDRESS).unwrap(), 0x1000_0000);
    assert_eq!(core.read_u32(CONTROL_ENABLE).unwrap(), 1);
    assert_eq!(core.run_control(), RunControl::Run);
}

#[test]
fn test_pc_frozen_while_halted() {
    let mut core = test_core();
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0);
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0);
}

#[test]
fn test_pc_advances_while_running() {
    let mut core = test_core().with_entry_pc(0x100);
    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0x100);
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0x104);
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0x108);
}

#[test]
fn test_pc_stops_at_halt_pc() {
    let mut core = test_core().with_halt_pc(8);
    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    let samples: Vec<u32> = (0..5)
        .map(|_| core.read_u32(PROGRAM_COUNTER).unwrap())
        .collect();
    assert_eq!(samples, vec![0, 4, 8, 8, 8]);
}

#[test]
fn test_zero_step_models_stalled_core() {
    let mut core = test_core().with_step(0).with_entry_pc(0x40);
    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0x40);
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 0x40);
}

#[test]
fn test_halt_freezes_and_rising_edge_reloads_entry() {
    let mut core = test_core();
    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    let _ = core.read_u32(PROGRAM_COUNTER).unwrap();
    let _ = core.read_u32(PROGRAM_COUNTER).unwrap();
    core.write_u32(CONTROL_ENABLE, 0).unwrap();
    assert_eq!(core.peek_pc(), 8);
    assert_eq!(core.read_u32(PROGRAM_COUNTER).unwrap(), 8);

    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    assert_eq!(core.peek_pc(), 0);
}

#[test]
fn test_pc_writes_are_dropped() {
    let mut core = test_core();
    core.write_u32(PROGRAM_COUNTER, 0xFFFF).unwrap();
    assert_eq!(core.peek_pc(), 0);
}

#[test]
fn test_unmapped_offset_is_bus_error() {
    let mut core = test_core();
    assert!(matches!(
        core.read_u32(0xC),
        Err(ControllerError::Bus {
            register: "UNMAPPED",
            ..
        })
    ));
    assert!(core.write_u32(0x10, 1).is_err());
    assert!(core.log().is_empty());
}

#[test]
fn test_fail_next_access_fails_once() {
    let mut core = test_core();
    core.fail_next_access("injected");
    let err = core.write_u32(CONTROL_ENABLE, 1).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Bus {
            register: "CONTROL_ENABLE",
            ..
        }
    ));
    assert_eq!(core.run_control(), RunControl::Halt);
    core.write_u32(CONTROL_ENABLE, 1).unwrap();
    assert_eq!(core.run_control(), RunControl::Run);
}

#[test]
fn test_log_records_in_order() {
    let mut core = test_core();
    core.write_u32(MEM_BASE_ADDRESS, 0x2000).unwrap();
    let _ = core.read_u32(PROGRAM_COUNTER).unwrap();
    core.write_u32(CONTROL_ENABLE, 1).unwrap();

    assert_eq!(
        core.log(),
        &[
            RegisterAccess::Write {
                offset: MEM_BASE_ADDRESS,
                value: 0x2000
            },
            RegisterAccess::Read {
                offset: PROGRAM_COUNTER,
                value: 0
            },
            RegisterAccess::Write {
                offset: CONTROL_ENABLE,
                value: 1
            },
        ]
    );
    assert_eq!(
        core.writes(),
        vec![(MEM_BASE_ADDRESS, 0x2000), (CONTROL_ENABLE, 1)]
    );

    core.clear_log();
    assert!(core.log().is_empty());
}
