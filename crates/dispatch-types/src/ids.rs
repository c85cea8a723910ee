//! Type-safe identifier wrappers.
//!
//! Incidents and hazards are identified by opaque UUID v7 values (time
//! ordered, so a [`BTreeMap`](std::collections::BTreeMap) keyed by them
//! iterates in creation order). Ambulances, hospitals, and callers are
//! pre-provisioned fleet records identified by small integers, which is
//! also what the dashboard expects on the wire.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Generates a newtype wrapper around a `u32` fleet number.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub u32);

        impl $name {
            /// Return the inner numeric value.
            pub const fn into_inner(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an incident.
    IncidentId
}

define_id! {
    /// Unique identifier for a road hazard.
    HazardId
}

define_numeric_id! {
    /// Fleet number of an ambulance.
    AmbulanceId
}

define_numeric_id! {
    /// Identifier of a hospital.
    HospitalId
}

define_numeric_id! {
    /// Identifier assigned to a caller reporting a scenario incident.
    CallerId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_distinct() {
        let first = IncidentId::new();
        let second = IncidentId::new();
        assert_ne!(first, second);
        assert_ne!(first.into_inner(), Uuid::nil());
    }

    #[test]
    fn numeric_ids_serialize_as_numbers() {
        let id = AmbulanceId(7);
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "7");
    }

    #[test]
    fn incident_id_serializes_as_string() {
        let id = IncidentId::new();
        let json = serde_json::to_value(id).unwrap_or_default();
        assert_eq!(json.as_str(), Some(id.to_string().as_str()));
    }
}
