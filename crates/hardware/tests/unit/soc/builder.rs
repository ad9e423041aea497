//! # Controller Builder Tests
//!
//! Building buffers and controllers from configuration.

use rvboot_core::common::PhysAddr;
use rvboot_core::common::error::ControllerError;
use rvboot_core::config::{BufferBacking, Config, MemoryConfig};
use rvboot_core::core::RunState;
use rvboot_core::soc::RegisterBus;
use rvboot_core::soc::builder::{self, LOOPBACK_BUS_ADDRESS};

#[test]
fn test_build_heap_buffer_with_bus_address() {
    let memory = MemoryConfig {
        capacity_words: 512,
        backing: BufferBacking::Heap {
            bus_address: Some(0x2000_0000),
        },
    };
    let buffer = builder::build_buffer(&memory).unwrap();
    assert_eq!(buffer.capacity(), 512);
    assert_eq!(buffer.base_address(), PhysAddr::new(0x2000_0000));
}

#[test]
fn test_build_buffer_zero_capacity_fails() {
    let memory = MemoryConfig {
        capacity_words: 0,
        backing: BufferBacking::default(),
    };
    assert!(matches!(
        builder::build_buffer(&memory),
        Err(ControllerError::Allocation { .. })
    ));
}

#[test]
fn test_loopback_controller_publishes_32_bit_address() {
    let controller = builder::loopback_controller(&Config::default()).unwrap();
    assert_eq!(controller.state(), RunState::Halted);
    assert_eq!(controller.buffer().capacity(), 2048);
    assert!(controller.buffer().base_address().to_u32().is_some());
    assert_eq!(controller.bus().base_address(), PhysAddr::new(0x43C0_0000));
}

#[test]
fn test_loopback_controller_keeps_configured_address() {
    let mut config = Config::default();
    config.memory.backing = BufferBacking::Heap {
        bus_address: Some(0x0800_0000),
    };
    let controller = builder::loopback_controller(&config).unwrap();
    assert_eq!(controller.buffer().base_address(), PhysAddr::new(0x0800_0000));
    assert_ne!(0x0800_0000, LOOPBACK_BUS_ADDRESS);
}

#[cfg(unix)]
#[test]
fn test_hardware_controller_missing_device() {
    let mut config = Config::default();
    config.registers.device = "/nonexistent/rvboot-mem".to_string();
    assert!(matches!(
        builder::hardware_controller(&config),
        Err(ControllerError::Bus { .. })
    ));
}
