//! Test helpers for blockamp integration tests
//!
//! - RecordingDevice: audio device that records every call and sample
//! - ScriptedToggles: toggle source answering from a fixed script
//! - CollectingSink: visualization sink keeping the blocks it saw
//! - ScriptedLines / CapturedOutput: console input and output for the channel
//! - WAV fixtures written with hound

#![allow(dead_code)]

use blockamp::control::LineSource;
use blockamp::{Device, Error, Result, ToggleSource, VisualizationSink};
use hound::{WavSpec, WavWriter};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// Calls seen by a [`RecordingDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Open {
        channels: usize,
        sample_rate: u32,
        frames_per_block: usize,
    },
    Start,
    Write(usize),
    Stop,
    Close,
    Release,
}

#[derive(Debug, Default)]
pub struct DeviceLog {
    pub events: Vec<DeviceEvent>,
    pub samples: Vec<f32>,
}

/// Device that keeps everything written to it.
///
/// The log is shared so it can be inspected after the port has been dropped.
pub struct RecordingDevice {
    log: Arc<Mutex<DeviceLog>>,
    channels: usize,
    /// Fail the write with this index (0-based)
    fail_write: Option<usize>,
    writes: usize,
}

impl RecordingDevice {
    pub fn new() -> (Self, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        (
            Self {
                log: Arc::clone(&log),
                channels: 0,
                fail_write: None,
                writes: 0,
            },
            log,
        )
    }

    pub fn failing_on_write(index: usize) -> (Self, Arc<Mutex<DeviceLog>>) {
        let (mut device, log) = Self::new();
        device.fail_write = Some(index);
        (device, log)
    }

    fn record(&self, event: DeviceEvent) {
        self.log.lock().unwrap().events.push(event);
    }
}

impl Device for RecordingDevice {
    fn open_device(&mut self, channels: usize, sample_rate: u32, frames_per_block: usize) -> Result<()> {
        self.channels = channels;
        self.record(DeviceEvent::Open {
            channels,
            sample_rate,
            frames_per_block,
        });
        Ok(())
    }

    fn write(&mut self, block: &[f32], frames: usize) -> Result<()> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write == Some(index) {
            return Err(Error::Device("injected write failure".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        log.events.push(DeviceEvent::Write(frames));
        log.samples.extend_from_slice(&block[..frames * self.channels]);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.record(DeviceEvent::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record(DeviceEvent::Stop);
        Ok(())
    }

    fn close_device(&mut self) -> Result<()> {
        self.record(DeviceEvent::Close);
        Ok(())
    }

    fn release(&mut self) {
        self.record(DeviceEvent::Release);
    }
}

pub fn events(log: &Arc<Mutex<DeviceLog>>) -> Vec<DeviceEvent> {
    log.lock().unwrap().events.clone()
}

pub fn samples(log: &Arc<Mutex<DeviceLog>>) -> Vec<f32> {
    log.lock().unwrap().samples.clone()
}

/// Answers `key_toggled` from a script, `false` once it runs out
pub struct ScriptedToggles {
    script: Mutex<VecDeque<bool>>,
    polls: Mutex<usize>,
}

impl ScriptedToggles {
    pub fn new(script: &[bool]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            polls: Mutex::new(0),
        }
    }

    pub fn never() -> Self {
        Self::new(&[])
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

impl ToggleSource for ScriptedToggles {
    fn key_toggled(&self) -> bool {
        *self.polls.lock().unwrap() += 1;
        self.script.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// Keeps every block it is shown
#[derive(Default)]
pub struct CollectingSink {
    pub blocks: Vec<Vec<f32>>,
}

impl VisualizationSink for CollectingSink {
    fn write(&mut self, block: &[f32]) {
        self.blocks.push(block.to_vec());
    }
}

/// Console input fed line by line from the test
pub struct ScriptedLines(mpsc::Receiver<String>);

impl ScriptedLines {
    pub fn new() -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self(rx))
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.0.recv().ok())
    }
}

/// Console output captured in memory
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Interleaved ramp `0, 1, 2, ...` scaled by `step`
pub fn ramp(frames: usize, channels: usize, step: f32) -> Vec<f32> {
    (0..frames * channels).map(|i| i as f32 * step).collect()
}

/// Write a 16-bit WAV whose sample n (interleaved) is `value(n)`
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    value: impl Fn(usize) -> i16,
) -> std::result::Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for n in 0..frames * channels as usize {
        writer.write_sample(value(n))?;
    }
    writer.finalize()?;
    Ok(())
}
