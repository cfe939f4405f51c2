//! Output port state machine tests

mod helpers;

use blockamp::{AudioOutputPort, Error, PlaybackState};
use helpers::{events, samples, DeviceEvent, RecordingDevice};

fn open_port() -> (AudioOutputPort<RecordingDevice>, std::sync::Arc<std::sync::Mutex<helpers::DeviceLog>>) {
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);
    port.open(2, 44100, 8).unwrap();
    (port, log)
}

#[test]
fn test_full_lifecycle() {
    let (mut port, log) = open_port();
    assert_eq!(port.state(), PlaybackState::Ready);
    assert_eq!(port.channels(), 2);
    assert_eq!(port.sample_rate(), 44100);
    assert_eq!(port.frames_per_block(), 8);

    port.start().unwrap();
    assert_eq!(port.state(), PlaybackState::Playing);

    let block = vec![0.25f32; 16];
    port.play(&block, 8).unwrap();

    port.pause().unwrap();
    assert_eq!(port.state(), PlaybackState::Ready);
    port.resume().unwrap();
    assert_eq!(port.state(), PlaybackState::Playing);

    port.close().unwrap();
    assert_eq!(port.state(), PlaybackState::NotReady);

    assert_eq!(
        events(&log),
        vec![
            DeviceEvent::Open {
                channels: 2,
                sample_rate: 44100,
                frames_per_block: 8
            },
            DeviceEvent::Start,
            DeviceEvent::Write(8),
            DeviceEvent::Stop,
            DeviceEvent::Start,
            DeviceEvent::Stop,
            DeviceEvent::Close,
        ]
    );
    assert_eq!(samples(&log), block);
}

#[test]
fn test_repeated_transitions_are_noops() {
    let (mut port, log) = open_port();

    port.open(1, 8000, 4).unwrap();
    // Second open keeps the first format
    assert_eq!(port.channels(), 2);

    port.stop().unwrap();
    port.start().unwrap();
    port.start().unwrap();
    port.stop().unwrap();
    port.stop().unwrap();
    port.close().unwrap();
    port.close().unwrap();

    let starts = events(&log).iter().filter(|e| **e == DeviceEvent::Start).count();
    let stops = events(&log).iter().filter(|e| **e == DeviceEvent::Stop).count();
    let closes = events(&log).iter().filter(|e| **e == DeviceEvent::Close).count();
    assert_eq!((starts, stops, closes), (1, 1, 1));
}

#[test]
fn test_calls_before_open_are_state_errors() {
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    assert!(matches!(port.start(), Err(Error::State(_))));
    assert!(matches!(port.stop(), Err(Error::State(_))));
    assert!(matches!(port.play(&[0.0; 4], 2), Err(Error::State(_))));
    // Closing a port that was never opened is fine
    port.close().unwrap();
    assert!(events(&log).is_empty());
}

#[test]
fn test_play_before_start() {
    let (mut port, log) = open_port();
    assert!(matches!(port.play(&[0.0; 16], 8), Err(Error::DeviceNotStarted)));
    assert!(!events(&log).iter().any(|e| matches!(e, DeviceEvent::Write(_))));
}

#[test]
fn test_play_with_short_block() {
    let (mut port, _log) = open_port();
    port.start().unwrap();
    assert!(matches!(port.play(&[0.0; 10], 8), Err(Error::Configuration(_))));
    // Fewer frames than the block holds is a short final block
    port.play(&[0.0; 10], 5).unwrap();
}

#[test]
fn test_open_rejects_zero_sizes() {
    let (device, log) = RecordingDevice::new();
    let mut port = AudioOutputPort::new(device);

    assert!(matches!(port.open(2, 44100, 0), Err(Error::DeviceConfig(_))));
    assert!(matches!(port.open(0, 44100, 8), Err(Error::DeviceConfig(_))));
    assert_eq!(port.state(), PlaybackState::NotReady);
    assert!(events(&log).is_empty());
}

#[test]
fn test_reopen_after_close() {
    let (mut port, _log) = open_port();
    port.start().unwrap();
    port.close().unwrap();

    port.open(1, 22050, 4).unwrap();
    assert_eq!(port.state(), PlaybackState::Ready);
    assert_eq!(port.channels(), 1);
    assert_eq!(port.sample_rate(), 22050);
}

#[test]
fn test_drop_closes_and_releases() {
    let (mut port, log) = open_port();
    port.start().unwrap();
    drop(port);

    let tail: Vec<DeviceEvent> = events(&log).into_iter().rev().take(3).collect();
    assert_eq!(tail, vec![DeviceEvent::Release, DeviceEvent::Close, DeviceEvent::Stop]);
}

#[test]
fn test_state_display() {
    assert_eq!(PlaybackState::NotReady.to_string(), "not ready");
    assert_eq!(PlaybackState::Playing.to_string(), "playing");
}
