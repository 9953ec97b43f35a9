//! # RMT Channel Module
//!
//! Drives encoded DShot frames out through pulse transmitters.
//!
//! This module handles:
//! - Enable/disable state of each output channel
//! - Looping a frame until the throttle changes
//! - Updating a looping frame as a stop-reconfigure-restart transaction

pub mod transmitter;

pub use transmitter::{LoopMode, PulseTransmitter, SimulatedTransmitter};

use crate::dshot::encoder::PulseSequence;
use crate::error::{DshotError, Result};
use tracing::{debug, warn};

/// Lifecycle of an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Output released, transmit not allowed
    Disabled,
    /// Enabled with no looping sequence
    Idle,
    /// A sequence is repeating until the channel is stopped
    Transmitting,
}

/// One physical output line and the transmitter behind it
///
/// At most one looping sequence is in flight per channel. Changing it goes
/// through [`Channel::update`].
pub struct Channel<T: PulseTransmitter> {
    id: usize,
    transmitter: T,
    state: ChannelState,
    transmissions: u64,
}

impl<T: PulseTransmitter> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("transmissions", &self.transmissions)
            .finish_non_exhaustive()
    }
}

impl<T: PulseTransmitter> Channel<T> {
    /// Wrap a transmitter; the channel starts disabled
    pub fn new(id: usize, transmitter: T) -> Self {
        Self {
            id,
            transmitter,
            state: ChannelState::Disabled,
            transmissions: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Sequences accepted by the transmitter through this channel
    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn transmitter_mut(&mut self) -> &mut T {
        &mut self.transmitter
    }

    /// Enable the output
    ///
    /// # Errors
    ///
    /// Returns `DshotError::ChannelState` if already enabled, or
    /// `DshotError::Transmit` if the transmitter fails.
    pub async fn enable(&mut self) -> Result<()> {
        if self.state != ChannelState::Disabled {
            return Err(DshotError::ChannelState(format!("channel {} is already enabled", self.id)));
        }

        self.transmitter
            .enable()
            .await
            .map_err(|e| DshotError::Transmit(format!("Failed to enable channel {}: {}", self.id, e)))?;

        self.state = ChannelState::Idle;
        debug!("Enabled channel {}", self.id);
        Ok(())
    }

    /// Disable the output, stopping any looping sequence
    ///
    /// # Errors
    ///
    /// Returns `DshotError::ChannelState` if already disabled, or
    /// `DshotError::Transmit` if the transmitter fails.
    pub async fn disable(&mut self) -> Result<()> {
        if self.state == ChannelState::Disabled {
            return Err(DshotError::ChannelState(format!("channel {} is already disabled", self.id)));
        }

        self.transmitter
            .disable()
            .await
            .map_err(|e| DshotError::Transmit(format!("Failed to disable channel {}: {}", self.id, e)))?;

        self.state = ChannelState::Disabled;
        debug!("Disabled channel {}", self.id);
        Ok(())
    }

    /// Start transmitting a sequence on an idle channel
    ///
    /// `LoopMode::Infinite` moves the channel to `Transmitting`; finite modes
    /// are queued by the transmitter and leave the channel `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `DshotError::ChannelState` if the channel is disabled or
    /// already looping, or `DshotError::Transmit` if the transmitter fails.
    pub async fn transmit(&mut self, pulses: &PulseSequence, mode: LoopMode) -> Result<()> {
        match self.state {
            ChannelState::Idle => {}
            ChannelState::Disabled => {
                return Err(DshotError::ChannelState(format!("channel {} is disabled", self.id)));
            }
            ChannelState::Transmitting => {
                return Err(DshotError::ChannelState(format!(
                    "channel {} is already looping a sequence, use update",
                    self.id
                )));
            }
        }

        self.transmitter
            .transmit(pulses, mode)
            .await
            .map_err(|e| DshotError::Transmit(format!("Failed to transmit on channel {}: {}", self.id, e)))?;

        self.transmissions += 1;
        if mode == LoopMode::Infinite {
            self.state = ChannelState::Transmitting;
        }
        Ok(())
    }

    /// Replace whatever the channel is sending
    ///
    /// A looping transmission cannot pick up new data, so the channel is
    /// stopped (disable + enable) before the new sequence starts.
    ///
    /// # Errors
    ///
    /// Returns `DshotError::ChannelState` if the channel is disabled, or
    /// `DshotError::Transmit` if any transmitter step fails.
    pub async fn update(&mut self, pulses: &PulseSequence, mode: LoopMode) -> Result<()> {
        match self.state {
            ChannelState::Disabled => {
                return Err(DshotError::ChannelState(format!("channel {} is disabled", self.id)));
            }
            ChannelState::Transmitting => {
                self.restart().await?;
            }
            ChannelState::Idle => {}
        }

        self.transmit(pulses, mode).await
    }

    async fn restart(&mut self) -> Result<()> {
        self.disable().await?;

        if let Err(e) = self.enable().await {
            warn!("Channel {} left disabled after failed restart", self.id);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::transmitter::MockPulseTransmitter;
    use super::*;
    use crate::dshot::encoder::{DshotEncoder, EncoderConfig};
    use crate::dshot::protocol::DshotSpeed;
    use std::io;
    use std::time::Duration;

    fn encoder() -> DshotEncoder {
        let config = EncoderConfig::new(40_000_000, DshotSpeed::DShot300, Duration::from_micros(50));
        DshotEncoder::new(config).unwrap()
    }

    async fn looping_channel(throttle: u16) -> Channel<SimulatedTransmitter> {
        let mut channel = Channel::new(0, SimulatedTransmitter::new(1, 40_000_000));
        channel.enable().await.unwrap();
        let seq = encoder().encode(throttle, false).unwrap();
        channel.transmit(&seq, LoopMode::Infinite).await.unwrap();
        channel
    }

    #[tokio::test]
    async fn test_new_channel_is_disabled() {
        let channel = Channel::new(3, SimulatedTransmitter::new(41, 40_000_000));
        assert_eq!(channel.id(), 3);
        assert_eq!(channel.state(), ChannelState::Disabled);
        assert_eq!(channel.transmissions(), 0);
    }

    #[tokio::test]
    async fn test_enable_disable_cycle() {
        let mut channel = Channel::new(0, SimulatedTransmitter::new(1, 40_000_000));

        channel.enable().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(matches!(channel.enable().await, Err(DshotError::ChannelState(_))));

        channel.disable().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Disabled);
        assert!(matches!(channel.disable().await, Err(DshotError::ChannelState(_))));
    }

    #[tokio::test]
    async fn test_transmit_on_disabled_channel_fails() {
        let mut channel = Channel::new(0, SimulatedTransmitter::new(1, 40_000_000));
        let seq = encoder().encode(0, false).unwrap();

        let result = channel.transmit(&seq, LoopMode::Infinite).await;
        assert!(matches!(result, Err(DshotError::ChannelState(_))));
        assert_eq!(channel.transmitter().transmissions(), 0);
    }

    #[tokio::test]
    async fn test_infinite_transmit_enters_transmitting() {
        let channel = looping_channel(0).await;
        assert_eq!(channel.state(), ChannelState::Transmitting);
        assert_eq!(channel.transmissions(), 1);
    }

    #[tokio::test]
    async fn test_finite_transmit_stays_idle() {
        let mut channel = Channel::new(0, SimulatedTransmitter::new(1, 40_000_000));
        channel.enable().await.unwrap();
        let seq = encoder().encode(48, false).unwrap();

        channel.transmit(&seq, LoopMode::Once).await.unwrap();
        channel.transmit(&seq, LoopMode::Count(6)).await.unwrap();

        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.transmissions(), 2);
        assert_eq!(channel.transmitter().pending(), 2);
    }

    #[tokio::test]
    async fn test_full_transmit_queue_surfaces_as_transmit_error() {
        let tx = SimulatedTransmitter::with_limits(1, 40_000_000, 48, 1);
        let mut channel = Channel::new(5, tx);
        channel.enable().await.unwrap();
        let seq = encoder().encode(48, false).unwrap();

        channel.transmit(&seq, LoopMode::Count(6)).await.unwrap();
        match channel.transmit(&seq, LoopMode::Once).await {
            Err(DshotError::Transmit(msg)) => assert!(msg.contains("queue full")),
            other => panic!("Expected Transmit error, got: {:?}", other),
        }
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.transmissions(), 1);
    }

    #[tokio::test]
    async fn test_transmit_while_looping_is_rejected() {
        let mut channel = looping_channel(0).await;
        let seq = encoder().encode(100, false).unwrap();

        let result = channel.transmit(&seq, LoopMode::Infinite).await;
        assert!(matches!(result, Err(DshotError::ChannelState(_))));
    }

    #[tokio::test]
    async fn test_update_replaces_looping_sequence() {
        let mut channel = looping_channel(0).await;
        let seq = encoder().encode(400, false).unwrap();

        channel.update(&seq, LoopMode::Infinite).await.unwrap();

        assert_eq!(channel.state(), ChannelState::Transmitting);
        assert_eq!(channel.transmissions(), 2);
        assert_eq!(channel.transmitter().looping(), Some(&seq));
        assert!(channel.transmitter().is_enabled());
    }

    #[tokio::test]
    async fn test_update_on_idle_channel_transmits() {
        let mut channel = Channel::new(0, SimulatedTransmitter::new(1, 40_000_000));
        channel.enable().await.unwrap();
        let seq = encoder().encode(50, false).unwrap();

        channel.update(&seq, LoopMode::Infinite).await.unwrap();
        assert_eq!(channel.state(), ChannelState::Transmitting);
    }

    #[tokio::test]
    async fn test_update_on_disabled_channel_fails() {
        let mut channel = Channel::new(0, SimulatedTransmitter::new(1, 40_000_000));
        let seq = encoder().encode(50, false).unwrap();

        let result = channel.update(&seq, LoopMode::Infinite).await;
        assert!(matches!(result, Err(DshotError::ChannelState(_))));
    }

    #[tokio::test]
    async fn test_update_stops_before_restarting() {
        let mut mock = MockPulseTransmitter::new();
        let mut seq = mockall::Sequence::new();

        mock.expect_enable().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        mock.expect_transmit().times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));
        mock.expect_disable().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        mock.expect_enable().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        mock.expect_transmit()
            .withf(|_, mode| *mode == LoopMode::Infinite)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let pulses = encoder().encode(48, false).unwrap();
        let mut channel = Channel::new(0, mock);
        channel.enable().await.unwrap();
        channel.transmit(&pulses, LoopMode::Infinite).await.unwrap();
        channel.update(&pulses, LoopMode::Infinite).await.unwrap();
    }

    #[tokio::test]
    async fn test_transmitter_failure_keeps_state() {
        let mut mock = MockPulseTransmitter::new();
        mock.expect_enable().returning(|| Ok(()));
        mock.expect_transmit()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::TimedOut, "Mock transmit error")));

        let pulses = encoder().encode(48, false).unwrap();
        let mut channel = Channel::new(7, mock);
        channel.enable().await.unwrap();

        match channel.transmit(&pulses, LoopMode::Infinite).await {
            Err(DshotError::Transmit(msg)) => {
                assert!(msg.contains("channel 7"));
                assert!(msg.contains("Mock transmit error"));
            }
            other => panic!("Expected Transmit error, got: {:?}", other),
        }
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.transmissions(), 0);
    }

    #[tokio::test]
    async fn test_failed_restart_leaves_channel_disabled() {
        let mut mock = MockPulseTransmitter::new();
        let mut seq = mockall::Sequence::new();

        mock.expect_enable().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        mock.expect_transmit().times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));
        mock.expect_disable().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        mock.expect_enable()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(io::Error::new(io::ErrorKind::Other, "Mock enable error")));

        let pulses = encoder().encode(48, false).unwrap();
        let mut channel = Channel::new(0, mock);
        channel.enable().await.unwrap();
        channel.transmit(&pulses, LoopMode::Infinite).await.unwrap();

        let result = channel.update(&pulses, LoopMode::Infinite).await;
        assert!(matches!(result, Err(DshotError::Transmit(_))));
        assert_eq!(channel.state(), ChannelState::Disabled);
    }
}
