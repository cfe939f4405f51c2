//! Playback engine loop tests
//!
//! Runs the engine against in-memory sources and a recording device, with
//! key presses scripted per poll.

mod helpers;

use blockamp::{
    AudioOutputPort, AudioSource, Error, Filter, FilterCoefficients, IirFilter, MemorySource, PlaybackEngine,
    PlaybackState,
};
use helpers::{events, ramp, samples, CollectingSink, DeviceEvent, RecordingDevice, ScriptedToggles};
use std::time::Duration;

const RATE: u32 = 8000;

fn open_source(samples: Vec<f32>, channels: usize) -> MemorySource {
    let mut source = MemorySource::new(samples, RATE, channels);
    source.open().unwrap();
    source
}

fn lowpass(channels: usize) -> Filter {
    let coefficients = FilterCoefficients::new(vec![0.5, 0.0], vec![1.0, -0.5]).unwrap();
    Filter::Iir(IirFilter::new(coefficients, channels).unwrap())
}

fn open_event(channels: usize, frames_per_block: usize) -> DeviceEvent {
    DeviceEvent::Open {
        channels,
        sample_rate: RATE,
        frames_per_block,
    }
}

#[test]
fn test_exactly_one_block_then_empty_read_terminates() {
    let input = ramp(4, 2, 0.01);
    let mut source = open_source(input.clone(), 2);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);
    let toggles = ScriptedToggles::never();
    let mut sink = CollectingSink::default();

    let mut engine = PlaybackEngine::new(4, Duration::ZERO);
    let report = engine.run(&mut source, &mut port, &toggles, &mut sink).unwrap();

    assert_eq!(report.blocks_played, 1);
    assert_eq!(report.reads, 2);
    assert_eq!(report.frames_played, 4);
    assert_eq!(toggles.polls(), 2);

    assert_eq!(
        events(&log),
        vec![open_event(2, 4), DeviceEvent::Start, DeviceEvent::Write(4), DeviceEvent::Stop, DeviceEvent::Close]
    );
    assert_eq!(samples(&log), input);
    assert_eq!(port.state(), PlaybackState::NotReady);

    // Rewound for the next session
    assert_eq!(source.remaining(), input.len());
}

#[test]
fn test_short_final_block_is_played() {
    let input = ramp(10, 1, 0.05);
    let mut source = open_source(input.clone(), 1);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);
    let mut sink = CollectingSink::default();

    let report = PlaybackEngine::new(4, Duration::ZERO)
        .run(&mut source, &mut port, &ScriptedToggles::never(), &mut sink)
        .unwrap();

    assert_eq!(report.reads, 3);
    assert_eq!(report.blocks_played, 3);
    assert_eq!(report.frames_played, 10);
    assert_eq!(samples(&log), input);

    let writes: Vec<DeviceEvent> = events(&log)
        .into_iter()
        .filter(|e| matches!(e, DeviceEvent::Write(_)))
        .collect();
    assert_eq!(writes, vec![DeviceEvent::Write(4), DeviceEvent::Write(4), DeviceEvent::Write(2)]);

    assert_eq!(sink.blocks.len(), 3);
    assert_eq!(sink.blocks[2], input[8..].to_vec());
}

#[test]
fn test_pause_and_resume_neither_drop_nor_duplicate_blocks() {
    let input = ramp(12, 1, 0.01);
    let mut source = open_source(input.clone(), 1);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);
    // Pause after the first block, resume on the next poll
    let toggles = ScriptedToggles::new(&[true, true]);
    let mut sink = CollectingSink::default();

    let report = PlaybackEngine::new(4, Duration::ZERO)
        .run(&mut source, &mut port, &toggles, &mut sink)
        .unwrap();

    assert_eq!(report.pauses, 1);
    assert_eq!(report.resumes, 1);
    assert_eq!(report.blocks_played, 3);
    assert_eq!(report.reads, 4);
    assert_eq!(samples(&log), input);

    assert_eq!(
        events(&log),
        vec![
            open_event(1, 4),
            DeviceEvent::Start,
            DeviceEvent::Write(4),
            DeviceEvent::Stop,
            DeviceEvent::Start,
            DeviceEvent::Write(4),
            DeviceEvent::Write(4),
            DeviceEvent::Stop,
            DeviceEvent::Close,
        ]
    );
}

#[test]
fn test_paused_engine_only_polls() {
    let input = ramp(8, 1, 0.01);
    let mut source = open_source(input.clone(), 1);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);
    // Pause, stay paused for three polls, resume
    let toggles = ScriptedToggles::new(&[true, false, false, false, true]);

    let report = PlaybackEngine::new(4, Duration::from_millis(1))
        .run(&mut source, &mut port, &toggles, &mut CollectingSink::default())
        .unwrap();

    assert_eq!(report.reads, 3);
    assert_eq!(report.blocks_played, 2);
    assert_eq!(toggles.polls(), 7);
    assert_eq!(samples(&log), input);
}

#[test]
fn test_pause_on_final_block_stops_once() {
    let mut source = open_source(ramp(6, 1, 0.1), 1);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);
    let toggles = ScriptedToggles::new(&[false, true]);

    let report = PlaybackEngine::new(4, Duration::ZERO)
        .run(&mut source, &mut port, &toggles, &mut CollectingSink::default())
        .unwrap();

    assert_eq!(report.pauses, 1);
    assert_eq!(
        events(&log),
        vec![
            open_event(1, 4),
            DeviceEvent::Start,
            DeviceEvent::Write(4),
            DeviceEvent::Write(2),
            DeviceEvent::Stop,
            DeviceEvent::Close,
        ]
    );
}

#[test]
fn test_empty_source() {
    let mut source = open_source(Vec::new(), 2);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    let report = PlaybackEngine::new(4, Duration::ZERO)
        .run(&mut source, &mut port, &ScriptedToggles::never(), &mut CollectingSink::default())
        .unwrap();

    assert_eq!(report.reads, 1);
    assert_eq!(report.blocks_played, 0);
    assert!(samples(&log).is_empty());
}

#[test]
fn test_filter_state_carries_across_blocks() {
    let mut source = open_source(vec![1.0; 5], 1);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    let mut engine = PlaybackEngine::new(4, Duration::ZERO).with_filter(Some(lowpass(1)));
    let report = engine
        .run(&mut source, &mut port, &ScriptedToggles::never(), &mut CollectingSink::default())
        .unwrap();

    assert_eq!(report.frames_played, 5);
    assert_eq!(samples(&log), vec![0.5, 0.75, 0.875, 0.9375, 0.96875]);
    assert!(engine.into_filter().is_some());
}

#[test]
fn test_identity_filter_three_channels() {
    let input = ramp(9, 3, 0.01);
    let mut source = open_source(input.clone(), 3);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    let identity = FilterCoefficients::new(vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]).unwrap();
    let filter = Filter::Iir(IirFilter::new(identity, 3).unwrap());

    PlaybackEngine::new(4, Duration::ZERO)
        .with_filter(Some(filter))
        .run(&mut source, &mut port, &ScriptedToggles::never(), &mut CollectingSink::default())
        .unwrap();

    assert_eq!(samples(&log), input);
}

#[test]
fn test_filter_channel_mismatch_rejected_before_open() {
    let mut source = open_source(ramp(8, 1, 0.1), 1);
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    let result = PlaybackEngine::new(4, Duration::ZERO)
        .with_filter(Some(lowpass(2)))
        .run(&mut source, &mut port, &ScriptedToggles::never(), &mut CollectingSink::default());

    assert!(matches!(result, Err(Error::Configuration(_))));
    assert!(events(&log).is_empty());
}

#[test]
fn test_block_shorter_than_filter_order_rejected() {
    let mut source = open_source(ramp(8, 1, 0.1), 1);
    let (device, _log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    let third_order = FilterCoefficients::new(vec![0.1, 0.1, 0.1, 0.1], vec![1.0, 0.0, 0.0, 0.0]).unwrap();
    let filter = Filter::Iir(IirFilter::new(third_order, 1).unwrap());

    let result = PlaybackEngine::new(2, Duration::ZERO)
        .with_filter(Some(filter))
        .run(&mut source, &mut port, &ScriptedToggles::never(), &mut CollectingSink::default());

    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_device_error_aborts_and_closes_port() {
    let mut source = open_source(ramp(12, 1, 0.1), 1);
    let (device, log) = RecordingDevice::failing_on_write(1);
    let mut port = AudioOutputPort::new(device);

    let result = PlaybackEngine::new(4, Duration::ZERO).run(
        &mut source,
        &mut port,
        &ScriptedToggles::never(),
        &mut CollectingSink::default(),
    );

    assert!(matches!(result, Err(Error::Device(_))));
    assert_eq!(port.state(), PlaybackState::NotReady);
    assert_eq!(
        events(&log),
        vec![open_event(1, 4), DeviceEvent::Start, DeviceEvent::Write(4), DeviceEvent::Stop, DeviceEvent::Close]
    );
}
