//! Event stream for the emergency dispatch engine.
//!
//! Every entity-store mutation and every simulator tick produces one
//! [`DispatchEvent`]. The [`EventBus`] stamps it with a strictly
//! increasing sequence number and a non-decreasing timestamp, then fans
//! it out to all subscribed dispatcher sessions.
//!
//! Sequence numbers are what make reconnection safe: a snapshot records
//! the sequence number it reflects, so a client can discard any event at
//! or below it and apply everything above it.

pub mod bus;
pub mod event;

pub use bus::{EventBus, DEFAULT_CAPACITY};
pub use event::{
    AmbulanceUpdate, DispatchEvent, EventEnvelope, HospitalSelected, IncidentDeleted,
    SimulationCancelled, SimulationComplete,
};
