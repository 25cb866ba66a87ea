//! Core domain types: identifiers, weekday/time values, slot expansion,
//! and the flattened trigger descriptor.

pub mod slots;
pub mod trigger;
pub mod types;
