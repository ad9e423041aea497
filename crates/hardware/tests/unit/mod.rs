//! # Unit Components
//!
//! Tests grouped by crate module: shared types, configuration, the SoC side (buffer,
//! registers, devices), the controller core and the session harness.
