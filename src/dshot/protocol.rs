//! # DShot Protocol Constants and Types
//!
//! Core protocol definitions for DShot frames.

use serde::Deserialize;

use super::checksum::{ChecksumKind, DSHOT_CHECKSUM_MASK};
use crate::error::{DshotError, Result};

/// Largest raw value that fits the 11-bit throttle field
pub const DSHOT_THROTTLE_MAX: u16 = 2047;

/// First raw value that is a throttle level rather than a special command
pub const DSHOT_THROTTLE_MIN_ARMED: u16 = 48;

/// Highest armed throttle level accepted by [`ThrottleCommand::armed`]
pub const DSHOT_ARMED_LEVEL_MAX: u16 = DSHOT_THROTTLE_MAX - DSHOT_THROTTLE_MIN_ARMED;

/// Bits per frame (11 throttle + 1 telemetry + 4 checksum)
pub const DSHOT_FRAME_BITS: usize = 16;

/// Pulse pairs per encoded frame (one per bit plus the post-frame delay)
pub const DSHOT_PULSES_PER_FRAME: usize = DSHOT_FRAME_BITS + 1;

/// DShot speed variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DshotSpeed {
    DShot150,
    DShot300,
    DShot600,
    DShot1200,
}

impl DshotSpeed {
    /// Bit rate of this variant in bits per second
    pub const fn baud_rate(self) -> u32 {
        match self {
            Self::DShot150 => 150_000,
            Self::DShot300 => 300_000,
            Self::DShot600 => 600_000,
            Self::DShot1200 => 1_200_000,
        }
    }

    pub const fn from_baud_rate(baud_rate: u32) -> Option<Self> {
        match baud_rate {
            150_000 => Some(Self::DShot150),
            300_000 => Some(Self::DShot300),
            600_000 => Some(Self::DShot600),
            1_200_000 => Some(Self::DShot1200),
            _ => None,
        }
    }
}

/// Reserved special commands (raw values 0-47)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    MotorStop = 0,
    Beep1 = 1,
    Beep2 = 2,
    Beep3 = 3,
    Beep4 = 4,
    Beep5 = 5,
    EscInfo = 6,
    SpinDirection1 = 7,
    SpinDirection2 = 8,
    ThreeDModeOff = 9,
    ThreeDModeOn = 10,
    SettingsRequest = 11,
    SaveSettings = 12,
    ExtendedTelemetryEnable = 13,
    ExtendedTelemetryDisable = 14,
    SpinDirectionNormal = 20,
    SpinDirectionReversed = 21,
    Led0On = 22,
    Led1On = 23,
    Led2On = 24,
    Led3On = 25,
    Led0Off = 26,
    Led1Off = 27,
    Led2Off = 28,
    Led3Off = 29,
    AudioStreamModeToggle = 30,
    SilentModeToggle = 31,
    SignalLineTelemetryDisable = 32,
    SignalLineTelemetryEnable = 33,
    SignalLineContinuousErpmTelemetry = 34,
    SignalLineContinuousErpmPeriodTelemetry = 35,
    SignalLineTemperatureTelemetry = 42,
    SignalLineVoltageTelemetry = 43,
    SignalLineCurrentTelemetry = 44,
    SignalLineConsumptionTelemetry = 45,
    SignalLineErpmTelemetry = 46,
    SignalLineErpmPeriodTelemetry = 47,
}

impl Command {
    /// Look up a special command by raw value (gaps 15-19 and 36-41 are unassigned)
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::MotorStop),
            1 => Some(Self::Beep1),
            2 => Some(Self::Beep2),
            3 => Some(Self::Beep3),
            4 => Some(Self::Beep4),
            5 => Some(Self::Beep5),
            6 => Some(Self::EscInfo),
            7 => Some(Self::SpinDirection1),
            8 => Some(Self::SpinDirection2),
            9 => Some(Self::ThreeDModeOff),
            10 => Some(Self::ThreeDModeOn),
            11 => Some(Self::SettingsRequest),
            12 => Some(Self::SaveSettings),
            13 => Some(Self::ExtendedTelemetryEnable),
            14 => Some(Self::ExtendedTelemetryDisable),
            20 => Some(Self::SpinDirectionNormal),
            21 => Some(Self::SpinDirectionReversed),
            22 => Some(Self::Led0On),
            23 => Some(Self::Led1On),
            24 => Some(Self::Led2On),
            25 => Some(Self::Led3On),
            26 => Some(Self::Led0Off),
            27 => Some(Self::Led1Off),
            28 => Some(Self::Led2Off),
            29 => Some(Self::Led3Off),
            30 => Some(Self::AudioStreamModeToggle),
            31 => Some(Self::SilentModeToggle),
            32 => Some(Self::SignalLineTelemetryDisable),
            33 => Some(Self::SignalLineTelemetryEnable),
            34 => Some(Self::SignalLineContinuousErpmTelemetry),
            35 => Some(Self::SignalLineContinuousErpmPeriodTelemetry),
            42 => Some(Self::SignalLineTemperatureTelemetry),
            43 => Some(Self::SignalLineVoltageTelemetry),
            44 => Some(Self::SignalLineCurrentTelemetry),
            45 => Some(Self::SignalLineConsumptionTelemetry),
            46 => Some(Self::SignalLineErpmTelemetry),
            47 => Some(Self::SignalLineErpmPeriodTelemetry),
            _ => None,
        }
    }

    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Number of consecutive frames the ESC must see before acting
    ///
    /// Settings-changing commands are only accepted after 6 repetitions.
    pub const fn repeat_count(self) -> u8 {
        match self {
            Self::SpinDirection1
            | Self::SpinDirection2
            | Self::ThreeDModeOff
            | Self::ThreeDModeOn
            | Self::SettingsRequest
            | Self::SaveSettings
            | Self::ExtendedTelemetryEnable
            | Self::ExtendedTelemetryDisable
            | Self::SpinDirectionNormal
            | Self::SpinDirectionReversed => 6,
            _ => 1,
        }
    }
}

/// Throttle value and telemetry flag for one frame
///
/// Raw values 0-47 are special commands and pass through unchanged;
/// 48-2047 are armed throttle levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThrottleCommand {
    throttle: u16,
    telemetry_request: bool,
}

impl ThrottleCommand {
    /// Create a command from a raw 11-bit value
    ///
    /// # Errors
    ///
    /// Returns `DshotError::InvalidThrottle` if `throttle` exceeds 2047.
    /// The value is never truncated.
    pub fn new(throttle: u16, telemetry_request: bool) -> Result<Self> {
        if throttle > DSHOT_THROTTLE_MAX {
            return Err(DshotError::InvalidThrottle(throttle));
        }

        Ok(Self {
            throttle,
            telemetry_request,
        })
    }

    /// Create a frame carrying a special command
    pub const fn from_command(command: Command, telemetry_request: bool) -> Self {
        Self {
            throttle: command.raw(),
            telemetry_request,
        }
    }

    /// Create an armed throttle command from a level in 0-1999 (raw 48-2047)
    ///
    /// # Errors
    ///
    /// Returns `DshotError::InvalidThrottle` if `level` exceeds 1999.
    pub fn armed(level: u16, telemetry_request: bool) -> Result<Self> {
        if level > DSHOT_ARMED_LEVEL_MAX {
            return Err(DshotError::InvalidThrottle(level));
        }
        Self::new(level + DSHOT_THROTTLE_MIN_ARMED, telemetry_request)
    }

    pub const fn throttle(&self) -> u16 {
        self.throttle
    }

    pub const fn telemetry_request(&self) -> bool {
        self.telemetry_request
    }

    /// Whether the raw value falls in the reserved command range
    pub const fn is_special_command(&self) -> bool {
        self.throttle < DSHOT_THROTTLE_MIN_ARMED
    }

    /// 12-bit payload: throttle in the upper 11 bits, telemetry flag in bit 0
    pub const fn payload(&self) -> u16 {
        (self.throttle << 1) | self.telemetry_request as u16
    }
}

/// 16-bit DShot frame
///
/// Layout, MSB first:
/// ```text
/// bit 15..5  throttle (11 bits)
/// bit 4      telemetry request
/// bit 3..0   checksum
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame(u16);

impl Frame {
    /// Pack a command and its checksum into a frame
    ///
    /// # Examples
    ///
    /// ```
    /// use dshot_esc::dshot::checksum::ChecksumKind;
    /// use dshot_esc::dshot::protocol::{Frame, ThrottleCommand};
    ///
    /// let command = ThrottleCommand::new(1046, false)?;
    /// let frame = Frame::new(&command, ChecksumKind::Standard);
    /// assert_eq!(frame.raw(), 0x82C6);
    /// # Ok::<(), dshot_esc::error::DshotError>(())
    /// ```
    pub const fn new(command: &ThrottleCommand, kind: ChecksumKind) -> Self {
        let payload = command.payload();
        Self((payload << 4) | kind.compute(payload) as u16)
    }

    /// Wrap a raw 16-bit value without checking its checksum
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    /// Upper 12 bits (throttle + telemetry flag)
    pub const fn payload(&self) -> u16 {
        self.0 >> 4
    }

    pub const fn throttle(&self) -> u16 {
        self.0 >> 5
    }

    pub const fn telemetry_request(&self) -> bool {
        (self.0 >> 4) & 1 == 1
    }

    pub const fn checksum(&self) -> u8 {
        (self.0 & DSHOT_CHECKSUM_MASK) as u8
    }

    /// Recompute the checksum over the payload and compare with the carried one
    pub const fn is_valid(&self, kind: ChecksumKind) -> bool {
        kind.compute(self.payload()) == self.checksum()
    }
}
