//! # Frame Capture Module
//!
//! Records every encoded frame to a JSONL (JSON Lines) file.
//!
//! One record per frame, so a capture can be replayed or compared against a
//! logic analyzer trace of the same run.

use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::dshot::encoder::PulseSequence;
use crate::dshot::protocol::Frame;
use crate::error::Result;

/// One captured frame
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FrameRecord {
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    pub channel: usize,
    pub throttle: u16,
    pub telemetry_request: bool,
    /// Raw 16-bit frame
    pub frame: u16,
    pub checksum: u8,
    /// Ticks spent on the 16 frame bits
    pub frame_ticks: u32,
}

impl FrameRecord {
    pub fn new(channel: usize, frame: Frame, pulses: &PulseSequence) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            channel,
            throttle: frame.throttle(),
            telemetry_request: frame.telemetry_request(),
            frame: frame.raw(),
            checksum: frame.checksum(),
            frame_ticks: pulses.frame_ticks(),
        }
    }
}

/// Append-only JSONL writer for [`FrameRecord`]s
#[derive(Debug)]
pub struct FrameLog {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl FrameLog {
    /// Open (or create) a capture file, appending to existing content
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory or the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened frame log at {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records: 0,
        })
    }

    /// Append one frame
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn record(&mut self, channel: usize, frame: Frame, pulses: &PulseSequence) -> Result<()> {
        let record = FrameRecord::new(channel, frame, pulses);
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Records written by this instance
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
