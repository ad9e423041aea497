use rvboot_core::common::PhysAddr;
use rvboot_core::core::CoreController;
use rvboot_core::soc::SharedBuffer;
use rvboot_core::soc::devices::LoopbackCore;

/// Bus address published for test buffers; host pointers may not fit 32 bits.
pub const TEST_BUS_ADDRESS: u64 = 0x1000_0000;

/// Register block base used by test loopback cores.
pub const TEST_REGISTER_BASE: u64 = 0x43C0_0000;

/// The four-instruction program used throughout the suite.
pub const SAMPLE_IMAGE: [u32; 4] = [0x0000_0013, 0x0000_0093, 0x0000_0001, 0x0000_00AB];

/// Installs a test subscriber once so `RUST_LOG` shows controller logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Allocates a buffer of `capacity` words published at [`TEST_BUS_ADDRESS`].
pub fn test_buffer(capacity: usize) -> SharedBuffer {
    SharedBuffer::allocate(capacity)
        .unwrap()
        .with_bus_address(PhysAddr::new(TEST_BUS_ADDRESS))
}

/// A fresh loopback core at [`TEST_REGISTER_BASE`].
pub fn test_core() -> LoopbackCore {
    LoopbackCore::new(PhysAddr::new(TEST_REGISTER_BASE))
}

/// A loopback controller over a `capacity`-word test buffer.
pub fn loopback_controller(capacity: usize) -> CoreController<LoopbackCore> {
    init_tracing();
    CoreController::new(test_core(), test_buffer(capacity))
}

/// A loopback controller over `core` and a `capacity`-word test buffer.
pub fn controller_with(core: LoopbackCore, capacity: usize) -> CoreController<LoopbackCore> {
    init_tracing();
    CoreController::new(core, test_buffer(capacity))
}
