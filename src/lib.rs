//! # DShot ESC Library
//!
//! Encode DShot throttle commands into timed pulse sequences for electronic
//! speed controllers.
//!
//! The core is [`dshot::encoder::DshotEncoder`], a stateless transformation
//! from a throttle value and telemetry flag into a checksummed 16-bit frame
//! and then into `(high, low)` pulse durations at a fixed tick resolution.
//! The [`rmt`] module drives those sequences through a pulse transmitter.

pub mod capture;
pub mod config;
pub mod dshot;
pub mod error;
pub mod rmt;
