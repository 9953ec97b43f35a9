//! # DShot ESC
//!
//! Drive a set of ESCs with DShot frames: arm them at zero throttle, then
//! sweep the throttle up and wrap around.
//!
//! Each output line is backed by a simulated RMT transmitter, so the demo runs
//! without hardware and the generated frames can be captured to a JSONL file.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::time::{interval, sleep, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use dshot_esc::capture::FrameLog;
use dshot_esc::config::{Config, LoggingConfig, RampConfig};
use dshot_esc::dshot::encoder::DshotEncoder;
use dshot_esc::dshot::protocol::{Command, DshotSpeed, ThrottleCommand};
use dshot_esc::rmt::{Channel, LoopMode, SimulatedTransmitter};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Number of ramp steps between status log messages
const LOG_INTERVAL_STEPS: u64 = 1000;

/// Sawtooth throttle sweep shared by all channels
///
/// Each channel runs `channel_offset` above the previous one.
#[derive(Debug, Clone)]
struct ThrottleRamp {
    start: u16,
    end: u16,
    step: u16,
    channel_offset: u16,
    current: u16,
}

impl ThrottleRamp {
    fn new(config: &RampConfig) -> Self {
        Self {
            start: config.start,
            end: config.end,
            step: config.step,
            channel_offset: config.channel_offset,
            current: config.start,
        }
    }

    fn current(&self) -> u16 {
        self.current
    }

    /// Throttle for a channel at the current step
    fn throttle_for(&self, channel: usize) -> u16 {
        self.current + self.channel_offset * channel as u16
    }

    /// Move to the next step, wrapping back to `start` past `end`
    fn advance(&mut self) {
        self.current = match self.current.checked_add(self.step) {
            Some(next) if next <= self.end => next,
            _ => self.start,
        };
    }
}

/// Main entry point for the DShot ESC demo
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Build the encoder and one channel per configured GPIO
///
/// 2. **Arming**
///    - Loop zero throttle on every channel for `arm_duration_ms`
///
/// 3. **Ramp**
///    - Every `step_interval_ms`, re-encode each channel's throttle and
///      update its looping frame
///    - Log status every 1000 steps
///    - Handle Ctrl+C for graceful shutdown
///
/// 4. **Shutdown**
///    - Send `MotorStop` on every channel, then disable it
///
/// # Errors
///
/// Returns error if the configuration is invalid or a channel transition fails.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        Config::load(&config_path).with_context(|| format!("Failed to load {}", config_path))?
    } else {
        Config::default()
    };

    let _log_guard = init_logging(&config.logging)?;
    info!("DShot ESC v{} starting...", env!("CARGO_PKG_VERSION"));
    if !config_found {
        warn!("No configuration at {}, using defaults", config_path);
    }

    let encoder = config.build_encoder()?;
    let timing = encoder.timing();
    info!(
        "Encoder: {} Hz resolution, {} baud, {} ticks/bit (1 = {}/{}, 0 = {}/{}), {} tick post delay",
        encoder.config().resolution_hz,
        encoder.config().baud_rate,
        timing.period,
        timing.one.high,
        timing.one.low,
        timing.zero.high,
        timing.zero.low,
        timing.post_delay
    );
    match DshotSpeed::from_baud_rate(encoder.config().baud_rate) {
        Some(speed) => info!("Bit rate matches {:?}", speed),
        None => warn!("Bit rate {} is not a standard DShot speed", encoder.config().baud_rate),
    }

    let mut frame_log = if config.logging.frame_log.is_empty() {
        None
    } else {
        Some(FrameLog::create(&config.logging.frame_log)?)
    };

    info!("Create RMT TX channels");
    let mut channels: Vec<Channel<SimulatedTransmitter>> = config
        .channels
        .gpio
        .iter()
        .enumerate()
        .map(|(i, &gpio)| {
            let transmitter = SimulatedTransmitter::with_limits(
                gpio,
                encoder.config().resolution_hz,
                config.channels.mem_block_symbols,
                config.channels.queue_depth,
            );
            Channel::new(i, transmitter)
        })
        .collect();

    for channel in channels.iter_mut() {
        channel.enable().await?;
        info!("Enabled channel {} on GPIO {}", channel.id(), channel.transmitter().gpio());
    }

    info!("Start ESC by sending zero throttle for {}ms...", config.ramp.arm_duration_ms);
    let zero = ThrottleCommand::new(0, false)?;
    for channel in channels.iter_mut() {
        send(&encoder, channel, &zero, frame_log.as_mut()).await?;
    }

    let arm_delay = sleep(Duration::from_millis(config.ramp.arm_duration_ms));
    tokio::select! {
        _ = arm_delay => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C while arming, shutting down...");
            return shutdown(&encoder, &mut channels, frame_log.as_mut()).await;
        }
    }

    info!("Increase throttle, no telemetry");
    let mut ramp = ThrottleRamp::new(&config.ramp);
    let mut step_interval = interval(Duration::from_millis(config.ramp.step_interval_ms));
    let mut steps: u64 = 0;

    loop {
        tokio::select! {
            _ = step_interval.tick() => {
                for channel in channels.iter_mut() {
                    let command = ThrottleCommand::new(ramp.throttle_for(channel.id()), false)?;
                    send(&encoder, channel, &command, frame_log.as_mut()).await?;
                }

                steps += 1;
                if steps % LOG_INTERVAL_STEPS == 0 {
                    info!("Completed {} ramp steps (base throttle {})", steps, ramp.current());
                }
                ramp.advance();
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total ramp steps: {}", steps);
                break;
            }
        }
    }

    shutdown(&encoder, &mut channels, frame_log.as_mut()).await
}

/// Encode a command and make it the looping frame on `channel`
async fn send(
    encoder: &DshotEncoder,
    channel: &mut Channel<SimulatedTransmitter>,
    command: &ThrottleCommand,
    frame_log: Option<&mut FrameLog>,
) -> Result<()> {
    let frame = encoder.frame(command);
    let pulses = encoder.encode_frame(frame);
    channel.update(&pulses, LoopMode::Infinite).await?;

    if let Some(log) = frame_log {
        log.record(channel.id(), frame, &pulses)?;
    }
    Ok(())
}

/// Replace the looping frame with a special command, repeated as often as
/// the ESC needs to accept it
async fn send_command(
    encoder: &DshotEncoder,
    channel: &mut Channel<SimulatedTransmitter>,
    command: Command,
    frame_log: Option<&mut FrameLog>,
) -> Result<()> {
    let frame = encoder.frame(&ThrottleCommand::from_command(command, false));
    let pulses = encoder.encode_frame(frame);
    let repeats = u32::from(command.repeat_count());
    channel.update(&pulses, LoopMode::Count(repeats)).await?;

    if let Some(log) = frame_log {
        log.record(channel.id(), frame, &pulses)?;
    }
    Ok(())
}

/// Stop every motor, let the stop frames play out, then release the outputs
async fn shutdown(
    encoder: &DshotEncoder,
    channels: &mut [Channel<SimulatedTransmitter>],
    mut frame_log: Option<&mut FrameLog>,
) -> Result<()> {
    for channel in channels.iter_mut() {
        send_command(encoder, channel, Command::MotorStop, frame_log.as_deref_mut()).await?;
        channel.transmitter_mut().finish_queued();
        channel.disable().await?;
        info!("Channel {} sent {} frames", channel.id(), channel.transmissions());
    }

    if let Some(log) = frame_log {
        log.flush()?;
        info!("Captured {} frames to {}", log.records(), log.path().display());
    }
    Ok(())
}

/// Set up the tracing subscriber, optionally writing to daily rolling files
///
/// `RUST_LOG` directives take precedence over the configured level.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))?;

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, "dshot-esc.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}
