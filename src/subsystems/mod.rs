//! Subsystem modules for the SMX assistant.

pub mod agents;
pub mod comms;
pub mod memory;
