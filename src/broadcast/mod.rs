//! Telemetry broadcast
//!
//! This module provides:
//! - `TelemetryBroadcastRouter`: snapshot cache and fault-isolated fan-out
//! - `SubscriberSet`: non-owning id -> window key registrations
//! - `MemoryProbe`: resident memory sampling for the watchdog

mod memory;
mod router;


pub use memory::{FixedMemoryProbe, MemoryProbe, SysinfoMemoryProbe};
pub use router::{
    BroadcastReport, SubscriberSet, TelemetryBroadcastRouter, TelemetrySnapshot, WatchdogReport,
};
