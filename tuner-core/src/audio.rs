//! # Audio Capture Module
//!
//! The producer half of the pipeline. An [`AudioSource`] delivers mono 16-bit
//! blocks through a [`BlockSink`], which numbers them and pushes them onto
//! the unbounded queue the tuning engine reads from.
//!
//! [`CpalSource`] is the real device, built on CPAL (Cross-Platform Audio
//! Library). The device callback runs on the audio subsystem's own thread and
//! only ever converts and enqueues; it never touches the session lock.
//!
//! ## Features
//! - Default or named input device selection
//! - 16-bit and float input formats, mono or interleaved
//! - Fixed-size blocks regardless of the device's callback size
//! - Capture stops once the engine side of the queue is gone

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedBufferSize, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::note::Note;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,
    #[error("input device '{0}' not found")]
    DeviceNotFound(String),
    #[error("no 16-bit or float input format supports {0} Hz")]
    UnsupportedRate(u32),
    #[error("could not enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("could not query input formats: {0}")]
    Formats(#[from] cpal::SupportedStreamConfigsError),
    #[error("could not build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("could not start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("capture device failed: {0}")]
    Other(String),
}

/// A block of captured audio, consumed exactly once by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    /// Position in capture order, shared across reconfigurations.
    pub sequence: u64,
    /// Rate the block was captured at.
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// What travels over the capture queue.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    Block(SampleBlock),
    /// Orderly shutdown. Nothing after it is read.
    End,
}

/// Stream parameters for one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub block_frames: usize,
}

impl CaptureConfig {
    pub fn for_note(note: &Note) -> Self {
        Self {
            sample_rate: note.sample_rate(),
            block_frames: note.block_frames().max(1),
        }
    }
}

/// Creates the capture queue.
///
/// Unbounded: blocks are small and the engine drains faster than the device
/// fills.
pub fn queue() -> (BlockSink, Receiver<PipelineMessage>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (BlockSink::new(tx), rx)
}

/// Producer handle for the capture queue.
///
/// Cloning is cheap; clones share the sequence counter so block numbering
/// continues across stream restarts.
#[derive(Debug, Clone)]
pub struct BlockSink {
    tx: Sender<PipelineMessage>,
    sequence: Arc<AtomicU64>,
    disconnected: Arc<AtomicBool>,
}

impl BlockSink {
    pub fn new(tx: Sender<PipelineMessage>) -> Self {
        Self {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueues a block. Never blocks.
    ///
    /// Returns `false` once the engine side of the queue is gone, after which
    /// the caller should stop producing.
    pub fn push_samples(&self, sample_rate: u32, samples: Vec<i16>) -> bool {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let block = SampleBlock {
            sequence,
            sample_rate,
            samples,
        };
        if self.tx.send(PipelineMessage::Block(block)).is_err() {
            if !self.disconnected.swap(true, Ordering::Relaxed) {
                warn!("capture queue closed, dropping blocks");
            }
            return false;
        }
        true
    }

    /// Logs a transient device anomaly. Capture carries on.
    pub fn report_status(&self, status: &str) {
        warn!(status, "capture status");
    }

    /// Enqueues the shutdown sentinel.
    pub fn end(&self) {
        let _ = self.tx.send(PipelineMessage::End);
    }
}

/// Capability interface for an audio input.
///
/// Implementations deliver blocks in capture order and must treat `close` on
/// an already-closed source as a no-op.
pub trait AudioSource {
    /// Starts delivering `config.block_frames`-sized blocks to `sink`.
    fn open(&mut self, config: CaptureConfig, sink: BlockSink) -> Result<(), CaptureError>;

    /// Stops delivery. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Re-chunks device callbacks into fixed-size mono blocks.
///
/// Devices rarely honour the requested buffer size exactly, so callbacks of
/// any length are accumulated and cut at `block_frames`. Only the first
/// channel of interleaved input is kept.
///
/// Once `emit` refuses a block the assembler stops for good and ignores all
/// further input.
#[derive(Debug)]
pub(crate) struct BlockAssembler {
    channels: usize,
    block_frames: usize,
    pending: Vec<i16>,
    stopped: bool,
}

impl BlockAssembler {
    pub(crate) fn new(channels: usize, block_frames: usize) -> Self {
        let block_frames = block_frames.max(1);
        Self {
            channels: channels.max(1),
            block_frames,
            pending: Vec::with_capacity(block_frames * 2),
            stopped: false,
        }
    }

    /// Accumulates one device callback and emits every complete block.
    ///
    /// `emit` returns `false` to stop production.
    pub(crate) fn push<T: Copy>(
        &mut self,
        interleaved: &[T],
        convert: impl Fn(T) -> i16,
        mut emit: impl FnMut(Vec<i16>) -> bool,
    ) {
        if self.stopped {
            return;
        }
        self.pending.extend(
            interleaved
                .chunks(self.channels)
                .filter_map(|frame| frame.first().copied())
                .map(convert),
        );
        while self.pending.len() >= self.block_frames {
            let rest = self.pending.split_off(self.block_frames);
            if !emit(std::mem::replace(&mut self.pending, rest)) {
                self.stopped = true;
                self.pending = Vec::new();
                debug!("block assembler stopped");
                return;
            }
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

/// Default-host input device.
pub struct CpalSource {
    device: cpal::Device,
    stream: Option<cpal::Stream>,
}

impl CpalSource {
    /// Lists input device names.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let names = host
            .input_devices()?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(names)
    }

    /// Selects the named input device, or the default one.
    ///
    /// No stream is opened until [`AudioSource::open`] is called.
    ///
    /// # Arguments
    /// * `preferred_device` - Exact device name as shown by [`CpalSource::list_devices`]
    ///
    /// # Returns
    /// * `Ok(source)` - A closed source bound to the device
    /// * `Err(CaptureError::DeviceNotFound)` - No input device has that name
    /// * `Err(CaptureError::NoDevice)` - No default input device exists
    pub fn new(preferred_device: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            "using audio input device"
        );
        Ok(Self {
            device,
            stream: None,
        })
    }

    fn build_stream(
        &self,
        config: CaptureConfig,
        sink: BlockSink,
    ) -> Result<cpal::Stream, CaptureError> {
        let ranges = self.device.supported_input_configs()?.collect::<Vec<_>>();
        let range = find_supported_config(ranges, config.sample_rate)
            .ok_or(CaptureError::UnsupportedRate(config.sample_rate))?;

        let format = range.sample_format();
        let channels = usize::from(range.channels());
        let buffer_size = match range.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&(config.block_frames as u32)) =>
            {
                cpal::BufferSize::Fixed(config.block_frames as u32)
            }
            _ => cpal::BufferSize::Default,
        };
        debug!(?format, channels, ?buffer_size, rate = config.sample_rate, "input stream config");

        let mut stream_config: cpal::StreamConfig = range
            .with_sample_rate(cpal::SampleRate(config.sample_rate))
            .config();
        stream_config.buffer_size = buffer_size;

        let rate = config.sample_rate;
        let mut assembler = BlockAssembler::new(channels, config.block_frames);
        let status_sink = sink.clone();
        let err_fn = move |err: cpal::StreamError| status_sink.report_status(&err.to_string());

        let stream = match format {
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, |s| s, |block| sink.push_samples(rate, block));
                },
                err_fn,
                None,
            )?,
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, f32_to_i16, |block| sink.push_samples(rate, block));
                },
                err_fn,
                None,
            )?,
            other => {
                return Err(CaptureError::Other(format!(
                    "unsupported sample format {other:?}"
                )));
            }
        };
        stream.play()?;
        Ok(stream)
    }
}

impl AudioSource for CpalSource {
    fn open(&mut self, config: CaptureConfig, sink: BlockSink) -> Result<(), CaptureError> {
        self.close();
        let stream = self.build_stream(config, sink)?;
        info!(
            rate = config.sample_rate,
            block_frames = config.block_frames,
            "input stream opened"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("error pausing stream: {e}");
            }
            drop(stream);
            info!("input stream closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Picks the input configuration to capture `target_rate` with.
///
/// Only ranges containing the rate with 16-bit or float samples qualify;
/// among those, mono beats multi-channel and 16-bit beats float.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| {
            let channel_cost = u32::from(c.channels() != 1);
            let format_cost = u32::from(c.sample_format() != SampleFormat::I16);
            (channel_cost, format_cost, c.channels())
        })
}
