//! Comms subsystem — external I/O channels.
//!
//! The console is the only channel: it supplies the session id and raw
//! query, and maps outcomes to printed answers and warnings.

pub mod pty;

pub use pty::{ConsoleCommand, PtyChannel};
