//! Trait abstraction for pulse transmitters to enable testing

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use tracing::{debug, trace};

use crate::dshot::encoder::PulseSequence;

/// How many times a transmitter repeats a pulse sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Send the sequence a single time
    Once,
    /// Send the sequence a fixed number of times
    Count(u32),
    /// Repeat until the transmitter is disabled
    Infinite,
}

/// Trait for hardware that plays back pulse sequences on one output line
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PulseTransmitter: Send {
    /// Power up the output and make it ready to accept sequences
    async fn enable(&mut self) -> io::Result<()>;

    /// Stop any running sequence and release the output
    async fn disable(&mut self) -> io::Result<()>;

    /// Queue a sequence for playback
    async fn transmit(&mut self, pulses: &PulseSequence, mode: LoopMode) -> io::Result<()>;
}

/// Pulse symbols one RMT channel can hold without refilling
pub const DEFAULT_MEM_BLOCK_SYMBOLS: usize = 48;

/// Finite transactions that may wait behind the one being played
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Software stand-in for an RMT TX channel
///
/// Keeps the looping sequence and the queue of finite transactions so callers
/// can inspect the output without hardware attached. Queued transactions stay
/// pending until [`SimulatedTransmitter::finish_queued`] plays them out.
#[derive(Debug)]
pub struct SimulatedTransmitter {
    gpio: u8,
    resolution_hz: u32,
    mem_block_symbols: usize,
    queue_depth: usize,
    enabled: bool,
    looping: Option<PulseSequence>,
    queue: VecDeque<(PulseSequence, u32)>,
    transmissions: u64,
    frames_played: u64,
}

impl SimulatedTransmitter {
    pub fn new(gpio: u8, resolution_hz: u32) -> Self {
        Self::with_limits(gpio, resolution_hz, DEFAULT_MEM_BLOCK_SYMBOLS, DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_limits(gpio: u8, resolution_hz: u32, mem_block_symbols: usize, queue_depth: usize) -> Self {
        Self {
            gpio,
            resolution_hz,
            mem_block_symbols,
            queue_depth,
            enabled: false,
            looping: None,
            queue: VecDeque::with_capacity(queue_depth),
            transmissions: 0,
            frames_played: 0,
        }
    }

    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sequence repeating until disable, if any
    pub fn looping(&self) -> Option<&PulseSequence> {
        self.looping.as_ref()
    }

    /// Finite transactions waiting to be played, oldest first, with their repeat count
    pub fn queued(&self) -> impl Iterator<Item = &(PulseSequence, u32)> {
        self.queue.iter()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Play out every queued transaction, returning how many completed
    pub fn finish_queued(&mut self) -> usize {
        let finished = self.queue.len();
        for (_, repeats) in self.queue.drain(..) {
            self.frames_played += u64::from(repeats);
        }
        finished
    }

    /// Number of sequences accepted since creation
    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }

    /// Frames played by completed finite transactions
    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }

    fn enqueue(&mut self, pulses: &PulseSequence, repeats: u32) -> io::Result<()> {
        if repeats == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("GPIO {}: loop count must be at least 1", self.gpio),
            ));
        }
        if self.queue.len() >= self.queue_depth {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("GPIO {}: transmit queue full ({} pending)", self.gpio, self.queue.len()),
            ));
        }
        self.queue.push_back((*pulses, repeats));
        Ok(())
    }

    /// Wall-clock length of one playback of `pulses` in microseconds
    pub fn playback_us(&self, pulses: &PulseSequence) -> f64 {
        f64::from(pulses.total_ticks()) * 1_000_000.0 / f64::from(self.resolution_hz)
    }
}

#[async_trait]
impl PulseTransmitter for SimulatedTransmitter {
    async fn enable(&mut self) -> io::Result<()> {
        if self.enabled {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("GPIO {} already enabled", self.gpio),
            ));
        }
        self.enabled = true;
        debug!("GPIO {} transmitter enabled", self.gpio);
        Ok(())
    }

    async fn disable(&mut self) -> io::Result<()> {
        if !self.enabled {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("GPIO {} already disabled", self.gpio),
            ));
        }
        self.enabled = false;
        self.looping = None;
        // Pending transactions are aborted, not played
        self.queue.clear();
        debug!("GPIO {} transmitter disabled", self.gpio);
        Ok(())
    }

    async fn transmit(&mut self, pulses: &PulseSequence, mode: LoopMode) -> io::Result<()> {
        if !self.enabled {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("GPIO {} is disabled", self.gpio),
            ));
        }

        if pulses.len() > self.mem_block_symbols {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "GPIO {}: {} pulses exceed memory block of {} symbols",
                    self.gpio,
                    pulses.len(),
                    self.mem_block_symbols
                ),
            ));
        }

        match mode {
            LoopMode::Infinite => self.looping = Some(*pulses),
            LoopMode::Once => self.enqueue(pulses, 1)?,
            LoopMode::Count(repeats) => self.enqueue(pulses, repeats)?,
        }

        self.transmissions += 1;
        trace!(
            "GPIO {} accepted {} pulses ({} ticks, {:.2}us, {:?})",
            self.gpio,
            pulses.len(),
            pulses.total_ticks(),
            self.playback_us(pulses),
            mode
        );
        Ok(())
    }
}
