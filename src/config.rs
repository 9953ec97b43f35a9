//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::dshot::checksum::ChecksumKind;
use crate::dshot::encoder::{DshotEncoder, EncoderConfig};
use crate::dshot::protocol::{DshotSpeed, DSHOT_PULSES_PER_FRAME, DSHOT_THROTTLE_MAX, DSHOT_THROTTLE_MIN_ARMED};
use crate::error::{DshotError, Result};
use crate::rmt::transmitter::{DEFAULT_MEM_BLOCK_SYMBOLS, DEFAULT_QUEUE_DEPTH};

/// Most output channels a single controller drives
pub const MAX_CHANNELS: usize = 8;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderSection,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub ramp: RampConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// DShot encoder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EncoderSection {
    #[serde(default = "default_resolution_hz")]
    pub resolution_hz: u32,

    #[serde(default = "default_speed")]
    pub speed: DshotSpeed,

    #[serde(default = "default_post_delay_us")]
    pub post_delay_us: u64,

    #[serde(default)]
    pub checksum: ChecksumKind,
}

/// Output channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelsConfig {
    #[serde(default = "default_gpio")]
    pub gpio: Vec<u8>,

    #[serde(default = "default_mem_block_symbols")]
    pub mem_block_symbols: usize,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Arming and throttle ramp configuration for the demo loop
#[derive(Debug, Deserialize, Clone)]
pub struct RampConfig {
    #[serde(default = "default_arm_duration_ms")]
    pub arm_duration_ms: u64,

    #[serde(default = "default_ramp_start")]
    pub start: u16,

    #[serde(default = "default_ramp_end")]
    pub end: u16,

    #[serde(default = "default_ramp_step")]
    pub step: u16,

    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    #[serde(default = "default_channel_offset")]
    pub channel_offset: u16,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files, empty for stdout only
    #[serde(default)]
    pub log_dir: String,

    /// JSONL frame capture path, empty to disable
    #[serde(default)]
    pub frame_log: String,
}

// Default value functions
fn default_resolution_hz() -> u32 { 40_000_000 }
fn default_speed() -> DshotSpeed { DshotSpeed::DShot300 }
fn default_post_delay_us() -> u64 { 50 }

fn default_gpio() -> Vec<u8> { vec![1, 2, 42, 41] }
fn default_mem_block_symbols() -> usize { DEFAULT_MEM_BLOCK_SYMBOLS }
fn default_queue_depth() -> usize { DEFAULT_QUEUE_DEPTH }

fn default_arm_duration_ms() -> u64 { 5000 }
fn default_ramp_start() -> u16 { 50 }
fn default_ramp_end() -> u16 { 400 }
fn default_ramp_step() -> u16 { 1 }
fn default_step_interval_ms() -> u64 { 1 }
fn default_channel_offset() -> u16 { 10 }

fn default_log_level() -> String { "info".to_string() }

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            resolution_hz: default_resolution_hz(),
            speed: default_speed(),
            post_delay_us: default_post_delay_us(),
            checksum: ChecksumKind::default(),
        }
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            gpio: default_gpio(),
            mem_block_symbols: default_mem_block_symbols(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            arm_duration_ms: default_arm_duration_ms(),
            start: default_ramp_start(),
            end: default_ramp_end(),
            step: default_ramp_step(),
            step_interval_ms: default_step_interval_ms(),
            channel_offset: default_channel_offset(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
            frame_log: String::new(),
        }
    }
}

impl EncoderSection {
    /// Encoder settings described by this section
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig::new(
            self.resolution_hz,
            self.speed,
            Duration::from_micros(self.post_delay_us),
        )
        .with_checksum(self.checksum)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dshot_esc::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the DShot encoder described by the `[encoder]` section
    ///
    /// # Errors
    ///
    /// Returns `DshotError::Configuration` if the timing cannot be represented.
    pub fn build_encoder(&self) -> Result<DshotEncoder> {
        DshotEncoder::new(self.encoder.encoder_config())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Encoder
        if self.encoder.resolution_hz < 1_000_000 || self.encoder.resolution_hz > 80_000_000 {
            return Err(invalid("resolution_hz must be between 1000000 and 80000000"));
        }

        if self.encoder.post_delay_us > 500 {
            return Err(invalid("post_delay_us must be between 0 and 500"));
        }

        // Catches resolution/speed pairs too coarse for DShot timing
        self.build_encoder().map_err(|e| match e {
            DshotError::Configuration(msg) => invalid(&msg),
            other => other,
        })?;

        // Channels
        if self.channels.gpio.is_empty() {
            return Err(invalid("at least one gpio must be configured"));
        }

        if self.channels.gpio.len() > MAX_CHANNELS {
            return Err(invalid(&format!("at most {} gpio pins can be configured", MAX_CHANNELS)));
        }

        for (i, pin) in self.channels.gpio.iter().enumerate() {
            if self.channels.gpio[..i].contains(pin) {
                return Err(invalid(&format!("gpio {} is configured more than once", pin)));
            }
        }

        if self.channels.mem_block_symbols < DSHOT_PULSES_PER_FRAME {
            return Err(invalid(&format!(
                "mem_block_symbols must be at least {} (one frame)",
                DSHOT_PULSES_PER_FRAME
            )));
        }

        if self.channels.queue_depth == 0 {
            return Err(invalid("queue_depth must be greater than 0"));
        }

        // Ramp
        if self.ramp.arm_duration_ms > 60000 {
            return Err(invalid("arm_duration_ms must be between 0 and 60000"));
        }

        if self.ramp.step_interval_ms == 0 || self.ramp.step_interval_ms > 60000 {
            return Err(invalid("step_interval_ms must be between 1 and 60000"));
        }

        if self.ramp.step == 0 {
            return Err(invalid("step must be greater than 0"));
        }

        if self.ramp.start < DSHOT_THROTTLE_MIN_ARMED {
            return Err(invalid(&format!(
                "ramp start must be at least {} (values below are special commands)",
                DSHOT_THROTTLE_MIN_ARMED
            )));
        }

        if self.ramp.start > self.ramp.end {
            return Err(invalid("ramp start must not exceed ramp end"));
        }

        let highest = u32::from(self.ramp.end)
            + u32::from(self.ramp.channel_offset) * (self.channels.gpio.len() as u32 - 1);
        if highest > u32::from(DSHOT_THROTTLE_MAX) {
            return Err(invalid(&format!(
                "ramp end plus channel offsets reaches {}, must not exceed {}",
                highest, DSHOT_THROTTLE_MAX
            )));
        }

        // Logging
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> DshotError {
    DshotError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());

        let encoder = config.build_encoder().unwrap();
        assert_eq!(encoder.config().baud_rate, 300_000);
        assert_eq!(encoder.config().post_delay, Duration::from_micros(50));
        assert_eq!(encoder.timing().period, 133);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[encoder]
resolution_hz = 32000000
speed = "dshot600"
checksum = "inverted"

[channels]
gpio = [4, 5]

[ramp]

[logging]
level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.encoder.resolution_hz, 32_000_000);
        assert_eq!(config.encoder.speed, DshotSpeed::DShot600);
        assert_eq!(config.encoder.checksum, ChecksumKind::Inverted);
        assert_eq!(config.encoder.post_delay_us, 50);
        assert_eq!(config.channels.gpio, vec![4, 5]);
        assert_eq!(config.ramp.start, 50);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.channels.gpio, vec![1, 2, 42, 41]);
        assert_eq!(config.encoder.speed, DshotSpeed::DShot300);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/dshot-esc.toml");
        assert!(matches!(result, Err(DshotError::Io(_))));
    }

    #[test]
    fn test_load_invalid_speed() {
        let result: std::result::Result<Config, _> = toml::from_str("[encoder]\nspeed = \"dshot450\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolution_too_low() {
        let mut config = create_valid_config();
        config.encoder.resolution_hz = 999_999;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolution_too_high() {
        let mut config = create_valid_config();
        config.encoder.resolution_hz = 80_000_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolution_too_coarse_for_speed() {
        // 1MHz / 1.2Mbaud rounds the bit period to zero ticks
        let mut config = create_valid_config();
        config.encoder.resolution_hz = 1_000_000;
        config.encoder.speed = DshotSpeed::DShot1200;
        assert!(matches!(config.validate(), Err(DshotError::Config(_))));
    }

    #[test]
    fn test_post_delay_too_high() {
        let mut config = create_valid_config();
        config.encoder.post_delay_us = 501;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_post_delay_overflows_at_high_resolution() {
        // 500us at 80MHz = 40000 ticks
        let mut config = create_valid_config();
        config.encoder.resolution_hz = 80_000_000;
        config.encoder.post_delay_us = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_speeds() {
        for speed in [
            DshotSpeed::DShot150,
            DshotSpeed::DShot300,
            DshotSpeed::DShot600,
            DshotSpeed::DShot1200,
        ] {
            let mut config = create_valid_config();
            config.encoder.speed = speed;
            assert!(config.validate().is_ok(), "Speed {:?} should be valid", speed);
        }
    }

    #[test]
    fn test_empty_gpio() {
        let mut config = create_valid_config();
        config.channels.gpio = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_too_many_gpio() {
        let mut config = create_valid_config();
        config.channels.gpio = (0..9).collect();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_gpio() {
        let mut config = create_valid_config();
        config.channels.gpio = vec![1, 2, 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mem_block_symbols_too_small() {
        let mut config = create_valid_config();
        config.channels.mem_block_symbols = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queue_depth_zero() {
        let mut config = create_valid_config();
        config.channels.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_arm_duration_too_high() {
        let mut config = create_valid_config();
        config.ramp.arm_duration_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_interval_zero() {
        let mut config = create_valid_config();
        config.ramp.step_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_zero() {
        let mut config = create_valid_config();
        config.ramp.step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ramp_start_in_command_range() {
        let mut config = create_valid_config();
        config.ramp.start = 47;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ramp_start_above_end() {
        let mut config = create_valid_config();
        config.ramp.start = 500;
        config.ramp.end = 400;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ramp_offsets_exceed_throttle_max() {
        let mut config = create_valid_config();
        config.ramp.end = 2020;
        config.ramp.channel_offset = 10;
        // 2020 + 10 * 3 = 2050
        assert!(config.validate().is_err());

        config.ramp.end = 2017;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_resolution_hz(), 40_000_000);
        assert_eq!(default_speed(), DshotSpeed::DShot300);
        assert_eq!(default_post_delay_us(), 50);
        assert_eq!(default_gpio(), vec![1, 2, 42, 41]);
        assert_eq!(default_mem_block_symbols(), 48);
        assert_eq!(default_queue_depth(), 10);
        assert_eq!(default_arm_duration_ms(), 5000);
        assert_eq!(default_ramp_start(), 50);
        assert_eq!(default_ramp_end(), 400);
        assert_eq!(default_ramp_step(), 1);
        assert_eq!(default_step_interval_ms(), 1);
        assert_eq!(default_channel_offset(), 10);
        assert_eq!(default_log_level(), "info");
    }
}
