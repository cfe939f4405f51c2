//! Audio output using cpal
//!
//! `write()` pushes interleaved samples into a ring buffer; the cpal callback
//! pops them on the audio thread and fills any shortfall with silence. The
//! ring holds two blocks, so `write()` blocks for roughly one block once the
//! stream runs.
//!
//! The stream runs at the source's own rate and channel count. The device
//! sample format is negotiated (f32, then i16, then u16) and converted in the
//! callback.

use super::device::Device;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, FromSample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Blocks of audio the ring buffer holds
const RING_BLOCKS: usize = 2;

/// Sleep while waiting for ring buffer space
const WRITE_POLL: Duration = Duration::from_millis(2);

pub struct CpalDevice {
    /// Requested device name (None = default)
    requested: Option<String>,
    stream: Option<Stream>,
    producer: Option<HeapProd<f32>>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    channels: usize,
    sample_rate: u32,
    frames_per_block: usize,
}

impl CpalDevice {
    pub fn new(requested: Option<String>) -> Self {
        Self {
            requested,
            stream: None,
            producer: None,
            error_flag: Arc::new(AtomicBool::new(false)),
            channels: 0,
            sample_rate: 0,
            frames_per_block: 0,
        }
    }

    /// Names of the available output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::DeviceConfig(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Requested device, or the default one if it is missing
    fn find_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(name) = self.requested.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::DeviceConfig(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                info!("Using requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceConfig("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    fn block_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames_per_block as f64 / self.sample_rate as f64)
    }

    fn check_stream(&self) -> Result<()> {
        if self.error_flag.load(Ordering::SeqCst) {
            return Err(Error::Device("audio stream reported an error".to_string()));
        }
        Ok(())
    }
}

impl Device for CpalDevice {
    fn open_device(&mut self, channels: usize, sample_rate: u32, frames_per_block: usize) -> Result<()> {
        let stream_channels = u16::try_from(channels)
            .map_err(|_| Error::DeviceConfig(format!("{} channels exceed the device limit", channels)))?;
        let device = self.find_device()?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceConfig(format!("Failed to get device configs: {}", e)))?
            .map(|range| {
                (
                    range.channels(),
                    range.min_sample_rate().0,
                    range.max_sample_rate().0,
                    range.sample_format(),
                )
            });
        let sample_format = pick_sample_format(supported, stream_channels, sample_rate).ok_or_else(|| {
            Error::DeviceConfig(format!(
                "device does not support {} Hz with {} channels in f32, i16 or u16",
                sample_rate, channels
            ))
        })?;

        let config = StreamConfig {
            channels: stream_channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let ring = HeapRb::<f32>::new(RING_BLOCKS * frames_per_block * channels);
        let (producer, consumer) = ring.split();

        self.error_flag.store(false, Ordering::SeqCst);
        let error_flag = Arc::clone(&self.error_flag);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, error_flag),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, error_flag),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, error_flag),
            other => Err(Error::DeviceConfig(format!("Unsupported sample format: {:?}", other))),
        }?;

        // Some hosts start streams on creation
        stream
            .pause()
            .map_err(|e| Error::DeviceConfig(format!("Failed to pause new stream: {}", e)))?;

        self.stream = Some(stream);
        self.producer = Some(producer);
        self.channels = channels;
        self.sample_rate = sample_rate;
        self.frames_per_block = frames_per_block;

        debug!(
            "Audio stream built: sample_rate={}, channels={}, format={:?}, ring={} samples",
            sample_rate,
            channels,
            sample_format,
            RING_BLOCKS * frames_per_block * channels
        );
        Ok(())
    }

    fn write(&mut self, block: &[f32], frames: usize) -> Result<()> {
        self.check_stream()?;
        let producer = self
            .producer
            .as_mut()
            .ok_or_else(|| Error::State("audio device is not open".to_string()))?;

        let mut pending = &block[..frames * self.channels];
        while !pending.is_empty() {
            let pushed = producer.push_slice(pending);
            pending = &pending[pushed..];
            if !pending.is_empty() {
                if self.error_flag.load(Ordering::SeqCst) {
                    return Err(Error::Device("audio stream failed during write".to_string()));
                }
                thread::sleep(WRITE_POLL);
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.check_stream()?;
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| Error::State("audio device is not open".to_string()))?;
        stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to start stream: {}", e)))
    }

    fn stop(&mut self) -> Result<()> {
        // Let the queued blocks play out
        let deadline = Instant::now() + self.block_duration() * (RING_BLOCKS as u32 + 1);
        if let Some(producer) = self.producer.as_ref() {
            while !producer.is_empty() && Instant::now() < deadline {
                thread::sleep(WRITE_POLL);
            }
            if !producer.is_empty() {
                debug!("Stopping with {} samples still queued", producer.occupied_len());
            }
        }

        if let Some(stream) = self.stream.as_ref() {
            stream
                .pause()
                .map_err(|e| Error::Device(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    fn close_device(&mut self) -> Result<()> {
        self.stream = None;
        self.producer = None;
        debug!("Audio stream closed");
        Ok(())
    }

    fn release(&mut self) {
        // cpal hosts need no explicit teardown; dropping the stream is enough
        self.stream = None;
        self.producer = None;
    }
}

/// Best sample format among `(channels, min_rate, max_rate, format)` ranges
/// that carry exactly `channels` at `sample_rate`: f32, then i16, then u16
fn pick_sample_format(
    supported: impl Iterator<Item = (u16, u32, u32, SampleFormat)>,
    channels: u16,
    sample_rate: u32,
) -> Option<SampleFormat> {
    const PREFERENCE: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

    supported
        .filter(|(ch, min, max, _)| *ch == channels && (*min..=*max).contains(&sample_rate))
        .filter_map(|(_, _, _, format)| {
            PREFERENCE
                .iter()
                .position(|preferred| *preferred == format)
                .map(|rank| (rank, format))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, format)| format)
}

/// Output stream converting queued `f32` samples to the device format;
/// a shortfall is filled with silence
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    *out = <T as FromSample<f32>>::from_sample_(consumer.try_pop().unwrap_or(0.0));
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| {
            Error::DeviceConfig(format!(
                "Failed to build {} Hz / {} channel stream: {}",
                config.sample_rate.0, config.channels, e
            ))
        })
}
