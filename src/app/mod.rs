//! Application core: detection orchestration behind port traits.
//!
//! [`service::JackDetector`] serializes every entry point through one lock
//! and drives the detection states.  All interaction with hardware happens
//! through the traits in [`ports`], keeping this layer testable without a
//! codec.

pub mod events;
pub mod ports;
pub mod service;
