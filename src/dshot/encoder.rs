//! # DShot Pulse Encoder
//!
//! Encodes throttle commands into sequences of `(high, low)` pulse durations.

use std::time::Duration;

use serde::Serialize;

use super::checksum::ChecksumKind;
use super::protocol::*;
use crate::error::{DshotError, Result};

/// Largest tick count a single pulse level can hold (15-bit symbol field)
pub const PULSE_TICKS_MAX: u32 = 0x7FFF;

/// High time of a "1" bit, in millionths of the bit period (74.850%)
pub const BIT1_HIGH_PPM: u64 = 748_500;

/// High time of a "0" bit, in millionths of the bit period (37.5%)
pub const BIT0_HIGH_PPM: u64 = 375_000;

const PPM: u64 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Encoder settings, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Tick rate of the timing hardware in Hz
    pub resolution_hz: u32,

    /// DShot bit rate (150k / 300k / 600k / 1200k)
    pub baud_rate: u32,

    /// Idle time appended after every frame
    pub post_delay: Duration,

    /// Checksum variant written into the frame
    pub checksum: ChecksumKind,
}

impl EncoderConfig {
    pub fn new(resolution_hz: u32, speed: DshotSpeed, post_delay: Duration) -> Self {
        Self {
            resolution_hz,
            baud_rate: speed.baud_rate(),
            post_delay,
            checksum: ChecksumKind::Standard,
        }
    }

    pub fn with_checksum(mut self, checksum: ChecksumKind) -> Self {
        self.checksum = checksum;
        self
    }
}

/// One bit (or the trailing delay) as high time followed by low time, in ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PulsePair {
    pub high: u16,
    pub low: u16,
}

impl PulsePair {
    pub const fn total(&self) -> u32 {
        self.high as u32 + self.low as u32
    }
}

/// Tick durations derived from an [`EncoderConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTiming {
    /// Ticks per bit
    pub period: u16,
    pub one: PulsePair,
    pub zero: PulsePair,
    /// Ticks of idle line after the frame
    pub post_delay: u16,
}

impl BitTiming {
    fn from_config(config: &EncoderConfig) -> Result<Self> {
        if config.resolution_hz == 0 {
            return Err(DshotError::Configuration("resolution_hz must be greater than 0".to_string()));
        }
        if config.baud_rate == 0 {
            return Err(DshotError::Configuration("baud_rate must be greater than 0".to_string()));
        }

        let period = config.resolution_hz / config.baud_rate;
        if period > PULSE_TICKS_MAX {
            return Err(DshotError::Configuration(format!(
                "bit period of {} ticks exceeds maximum {} ({} Hz / {} baud)",
                period, PULSE_TICKS_MAX, config.resolution_hz, config.baud_rate
            )));
        }

        let one_high = ratio_ticks(period, BIT1_HIGH_PPM);
        let zero_high = ratio_ticks(period, BIT0_HIGH_PPM);
        let one = PulsePair {
            high: one_high as u16,
            low: (period - one_high) as u16,
        };
        let zero = PulsePair {
            high: zero_high as u16,
            low: (period - zero_high) as u16,
        };

        if one.high == 0 || one.low == 0 || zero.high == 0 || zero.low == 0 {
            return Err(DshotError::Configuration(format!(
                "{} Hz / {} baud gives a {} tick bit period, too short to represent DShot pulses",
                config.resolution_hz, config.baud_rate, period
            )));
        }

        // The receiver tells bits apart by which level is longer
        if one.high <= one.low || zero.high >= zero.low {
            return Err(DshotError::Configuration(format!(
                "{} tick bit period cannot distinguish 1 ({}/{}) from 0 ({}/{})",
                period, one.high, one.low, zero.high, zero.low
            )));
        }

        let post_delay = u128::from(config.resolution_hz) * config.post_delay.as_nanos() / NANOS_PER_SEC;
        if post_delay > u128::from(PULSE_TICKS_MAX) {
            return Err(DshotError::Configuration(format!(
                "post delay of {:?} is {} ticks, exceeds maximum {}",
                config.post_delay, post_delay, PULSE_TICKS_MAX
            )));
        }

        Ok(Self {
            period: period as u16,
            one,
            zero,
            post_delay: post_delay as u16,
        })
    }

    /// Pulse pair for a single frame bit
    pub const fn bit(&self, set: bool) -> PulsePair {
        if set {
            self.one
        } else {
            self.zero
        }
    }
}

/// Scale a bit period by a fraction expressed in parts per million, rounding down
fn ratio_ticks(period: u32, ppm: u64) -> u32 {
    (u64::from(period) * ppm / PPM) as u32
}

/// Encoded frame: 16 bit pairs (MSB first) followed by the post-frame delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PulseSequence {
    pairs: [PulsePair; DSHOT_PULSES_PER_FRAME],
}

impl PulseSequence {
    pub fn pairs(&self) -> &[PulsePair] {
        &self.pairs
    }

    /// The 16 pairs carrying frame bits
    pub fn bit_pairs(&self) -> &[PulsePair] {
        &self.pairs[..DSHOT_FRAME_BITS]
    }

    /// The trailing idle pair
    pub fn post_delay(&self) -> PulsePair {
        self.pairs[DSHOT_FRAME_BITS]
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Ticks spent on frame bits, excluding the post delay
    pub fn frame_ticks(&self) -> u32 {
        self.bit_pairs().iter().map(PulsePair::total).sum()
    }

    /// Ticks for one full transmission including the post delay
    pub fn total_ticks(&self) -> u32 {
        self.pairs.iter().map(PulsePair::total).sum()
    }
}

/// DShot frame encoder
///
/// Holds only the timing derived at construction, so it is `Copy` and can be
/// shared freely between channels and threads.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dshot_esc::dshot::encoder::{DshotEncoder, EncoderConfig};
/// use dshot_esc::dshot::protocol::DshotSpeed;
///
/// let config = EncoderConfig::new(40_000_000, DshotSpeed::DShot300, Duration::from_micros(50));
/// let encoder = DshotEncoder::new(config)?;
///
/// let pulses = encoder.encode(0, false)?;
/// assert_eq!(pulses.len(), 17);
/// assert_eq!(pulses.frame_ticks(), 16 * 133);
/// # Ok::<(), dshot_esc::error::DshotError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DshotEncoder {
    config: EncoderConfig,
    timing: BitTiming,
}

impl DshotEncoder {
    /// Create an encoder, precomputing pulse timings
    ///
    /// # Errors
    ///
    /// Returns `DshotError::Configuration` if the resolution / baud rate
    /// combination cannot represent DShot pulses (a duration rounds to zero
    /// ticks, the bits become indistinguishable, or a duration overflows the
    /// 15-bit tick field).
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let timing = BitTiming::from_config(&config)?;
        Ok(Self { config, timing })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn timing(&self) -> &BitTiming {
        &self.timing
    }

    /// Encode a raw throttle value and telemetry flag
    ///
    /// # Errors
    ///
    /// Returns `DshotError::InvalidThrottle` if `throttle` exceeds 2047.
    pub fn encode(&self, throttle: u16, telemetry_request: bool) -> Result<PulseSequence> {
        let command = ThrottleCommand::new(throttle, telemetry_request)?;
        Ok(self.encode_command(&command))
    }

    pub fn encode_command(&self, command: &ThrottleCommand) -> PulseSequence {
        self.encode_frame(self.frame(command))
    }

    /// Build the frame for a command using the configured checksum variant
    pub fn frame(&self, command: &ThrottleCommand) -> Frame {
        Frame::new(command, self.config.checksum)
    }

    /// Convert a frame into bit pulses (MSB first) plus the post delay
    pub fn encode_frame(&self, frame: Frame) -> PulseSequence {
        let raw = frame.raw();
        let mut pairs = [PulsePair::default(); DSHOT_PULSES_PER_FRAME];

        for (i, pair) in pairs.iter_mut().take(DSHOT_FRAME_BITS).enumerate() {
            let bit = (raw >> (DSHOT_FRAME_BITS - 1 - i)) & 1 == 1;
            *pair = self.timing.bit(bit);
        }

        pairs[DSHOT_FRAME_BITS] = PulsePair {
            high: 0,
            low: self.timing.post_delay,
        };

        PulseSequence { pairs }
    }

    /// Recover the frame from a sequence produced with this encoder's timing
    ///
    /// Returns `None` if any bit pair matches neither the "1" nor the "0" timing.
    pub fn decode(&self, pulses: &PulseSequence) -> Option<Frame> {
        let mut raw = 0u16;

        for pair in pulses.bit_pairs() {
            let bit = if *pair == self.timing.one {
                1
            } else if *pair == self.timing.zero {
                0
            } else {
                return None;
            };
            raw = (raw << 1) | bit;
        }

        Some(Frame::from_raw(raw))
    }
}
