//! Player session
//!
//! Owns everything one playback needs: the current sound, the user's filter
//! choice adapted to that sound, the amplitude meter, the control device and
//! the output port.

use super::engine::{PlaybackEngine, PlaybackReport, ToggleSource};
use crate::audio::{AudioOutputPort, AudioSource, Device};
use crate::control::PlayerDevice;
use crate::dsp::{Filter, FilterChoice};
use crate::error::{Error, Result};
use crate::meter::{AmpMeter, VisualizationSink};
use blockamp_common::{FilterBank, ScalingKind, TomlConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables of a player, usually taken from the config file
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub block_duration_ms: u32,
    pub pause_poll: Duration,
    pub scaling: ScalingKind,
    pub meter_peak: f32,
    pub log_db_floor: f32,
    /// Wait for a key press before the first block
    pub wait_for_start: bool,
}

impl PlayerSettings {
    /// Frames in one block at `sample_rate`, at least one
    pub fn block_frames(&self, sample_rate: u32) -> usize {
        let frames = sample_rate as u64 * self.block_duration_ms as u64 / 1000;
        frames.max(1) as usize
    }

    fn meter(&self) -> AmpMeter {
        AmpMeter::new(self.scaling, self.meter_peak, self.log_db_floor)
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

impl From<&TomlConfig> for PlayerSettings {
    fn from(config: &TomlConfig) -> Self {
        Self {
            block_duration_ms: config.block_duration_ms,
            pause_poll: Duration::from_millis(config.pause_poll_ms),
            scaling: config.scaling,
            meter_peak: config.meter_peak,
            log_db_floor: config.log_db_floor as f32,
            wait_for_start: false,
        }
    }
}

/// Key presses of the control device, polled without blocking
struct DeviceToggles<'a>(&'a dyn PlayerDevice);

impl ToggleSource for DeviceToggles<'_> {
    fn key_toggled(&self) -> bool {
        self.0.key_pressed(false)
    }
}

/// Amplitude bar on the control device
struct MeterSink<'a> {
    meter: &'a AmpMeter,
    device: &'a dyn PlayerDevice,
    failed: bool,
}

impl VisualizationSink for MeterSink<'_> {
    fn write(&mut self, block: &[f32]) {
        let pattern = self.meter.block_pattern(block);
        if let Err(e) = self.device.write_levels(pattern) {
            // Report once per session, playback goes on without the bar
            if !self.failed {
                warn!("Amplitude bar unavailable: {}", e);
                self.failed = true;
            }
        }
    }
}

pub struct Player<D: Device> {
    settings: PlayerSettings,
    device: Arc<dyn PlayerDevice>,
    port: AudioOutputPort<D>,
    bank: Option<FilterBank>,
    meter: AmpMeter,
    sound: Option<Box<dyn AudioSource>>,
    choice: Option<FilterChoice>,
    filter: Option<Filter>,
}

impl<D: Device> Player<D> {
    pub fn new(
        settings: PlayerSettings,
        device: Arc<dyn PlayerDevice>,
        output: D,
        bank: Option<FilterBank>,
    ) -> Self {
        let meter = settings.meter();
        Self {
            settings,
            device,
            port: AudioOutputPort::new(output),
            bank,
            meter,
            sound: None,
            choice: None,
            filter: None,
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn port(&self) -> &AudioOutputPort<D> {
        &self.port
    }

    pub fn filter_choice(&self) -> Option<&FilterChoice> {
        self.choice.as_ref()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn has_sound(&self) -> bool {
        self.sound.is_some()
    }

    /// Make `source` the current sound and adapt the filter to its format.
    ///
    /// An IIR filter without coefficients for the new sample rate is dropped
    /// with a warning.
    pub fn set_sound(&mut self, mut source: Box<dyn AudioSource>) -> Result<()> {
        if let Some(mut previous) = self.sound.take() {
            previous.close();
        }
        source.open()?;
        info!(
            "Sound selected: {} Hz, {} channels",
            source.sample_rate(),
            source.channels()
        );

        self.filter = None;
        if let Some(choice) = self.choice.clone() {
            match choice.build(self.bank.as_ref(), source.sample_rate(), source.channels()) {
                Ok(filter) => {
                    debug!("Filter '{}' adapted to {} Hz", choice, source.sample_rate());
                    self.filter = Some(filter);
                }
                Err(e) if matches!(choice, FilterChoice::Iir { .. }) => {
                    warn!("Filter '{}' dropped: {}", choice, e);
                    self.choice = None;
                }
                Err(e) => {
                    self.sound = Some(source);
                    return Err(e);
                }
            }
        }

        self.sound = Some(source);
        Ok(())
    }

    /// Select a filter; built right away if a sound is selected.
    ///
    /// # Errors
    /// The `FilterChoice::build` errors; the previous selection stays.
    pub fn select_filter(&mut self, choice: FilterChoice) -> Result<()> {
        if let Some(sound) = self.sound.as_ref() {
            let filter = choice.build(self.bank.as_ref(), sound.sample_rate(), sound.channels())?;
            self.filter = Some(filter);
        }
        info!("Filter selected: {}", choice);
        self.choice = Some(choice);
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.choice = None;
        self.filter = None;
    }

    pub fn set_scaling(&mut self, scaling: ScalingKind) {
        self.settings.scaling = scaling;
        self.meter = self.settings.meter();
        debug!("Amplitude scaling set to {}", scaling);
    }

    /// Play the current sound from the start.
    ///
    /// # Errors
    /// `State` if no sound is selected, plus everything the device and the
    /// engine report. A device whose control threads fail to start
    /// (`ThreadStart`) is used in degraded mode instead.
    pub fn play(&mut self) -> Result<PlaybackReport> {
        let sound = self
            .sound
            .as_mut()
            .ok_or_else(|| Error::State("no sound selected".to_string()))?;
        let frames_per_block = self.settings.block_frames(sound.sample_rate());

        match self.device.open() {
            Ok(()) => {}
            // The console channel stays usable through direct console I/O
            Err(Error::ThreadStart(reason)) => warn!(
                "{} control threads unavailable, using the console directly: {}",
                self.device.name(),
                reason
            ),
            Err(e) => return Err(e),
        }
        if self.settings.wait_for_start {
            self.device.status_text("Press ENTER to start playback\n")?;
            if !self.device.key_pressed(true) {
                warn!("No start key press, playing anyway");
            }
        }
        self.device
            .status_text("Playing, press ENTER to pause or resume\n")?;

        let mut engine =
            PlaybackEngine::new(frames_per_block, self.settings.pause_poll).with_filter(self.filter.take());
        let toggles = DeviceToggles(self.device.as_ref());
        let mut sink = MeterSink {
            meter: &self.meter,
            device: self.device.as_ref(),
            failed: false,
        };

        let result = engine.run(&mut **sound, &mut self.port, &toggles, &mut sink);
        self.filter = engine.into_filter();
        self.device.close();
        result
    }
}

impl<D: Device> Drop for Player<D> {
    fn drop(&mut self) {
        if let Some(mut sound) = self.sound.take() {
            sound.close();
        }
    }
}
