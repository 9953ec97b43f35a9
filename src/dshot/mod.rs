//! # DShot Protocol Module
//!
//! Implementation of the DShot digital ESC protocol (transmit side).
//!
//! This module handles:
//! - Throttle command validation (11-bit range, reserved special commands)
//! - 16-bit frame packing (throttle + telemetry flag + checksum)
//! - 4-bit nibble checksum, standard and inverted variants
//! - Frame to pulse-duration encoding at a configured tick resolution

pub mod protocol;
pub mod encoder;
pub mod checksum;
