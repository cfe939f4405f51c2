//! blockamp - console audio player
//!
//! Subcommands:
//! - `play`: stream a sound file with an optional filter, ENTER toggles pause
//! - `sounds`: list the sound files in the configured directory
//! - `filters`: list the filters available for a sample rate
//! - `devices`: list the audio output devices

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use blockamp::audio::decoder::list_sounds;
use blockamp::{
    ConsoleDevice, ControlSignalChannel, CpalDevice, FilterChoice, LedBarDevice, Player, PlayerDevice,
    PlayerSettings, SoundFile,
};
use blockamp_common::{DeviceKind, FilterBank, ScalingKind, TomlConfig};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for blockamp
#[derive(Parser, Debug)]
#[command(name = "blockamp")]
#[command(about = "Console audio player with IIR / delay filters and an amplitude bar")]
#[command(version, long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ", ", env!("BUILD_PROFILE"), ")"))]
struct Args {
    /// Config file (default: platform config location)
    #[arg(short, long, global = true, env = "BLOCKAMP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with sound files
    #[arg(long, global = true, env = "BLOCKAMP_SOUNDS_DIR")]
    sounds_dir: Option<PathBuf>,

    /// Filter bank file
    #[arg(long, global = true, env = "BLOCKAMP_FILTERS")]
    filters_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a sound file
    Play {
        /// Sound file, absolute or relative to the sounds directory
        file: PathBuf,

        /// Named IIR filter from the filter bank
        #[arg(long, conflicts_with = "delay")]
        filter: Option<String>,

        /// Delay filter: delay in milliseconds
        #[arg(long, value_name = "MS")]
        delay: Option<u32>,

        /// Delay filter: feedforward gain
        #[arg(long, default_value_t = 0.5, requires = "delay")]
        gff: f32,

        /// Delay filter: feedback gain (0 <= g < 1)
        #[arg(long, default_value_t = 0.0, requires = "delay")]
        gfb: f32,

        /// Amplitude bar scaling (linear | logarithmic)
        #[arg(long, env = "BLOCKAMP_SCALING")]
        scaling: Option<ScalingKind>,

        /// Control / visualization device (console | led-bar)
        #[arg(long, env = "BLOCKAMP_DEVICE")]
        device: Option<DeviceKind>,

        /// LED bar device node
        #[arg(long, env = "BLOCKAMP_LED_DEVICE")]
        led_device: Option<PathBuf>,

        /// Audio output device name
        #[arg(long, env = "BLOCKAMP_AUDIO_DEVICE")]
        audio_device: Option<String>,

        /// Block duration in milliseconds
        #[arg(long, env = "BLOCKAMP_BLOCK_MS")]
        block_ms: Option<u32>,

        /// Wait for ENTER before playing
        #[arg(long)]
        wait_for_start: bool,
    },

    /// List sound files
    Sounds,

    /// List filters available for a sample rate
    Filters {
        /// Sample rate in Hz
        sample_rate: u32,
    },

    /// List audio output devices
    Devices,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        TomlConfig::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.sounds_dir.clone() {
        config.sounds_dir = dir;
    }
    if let Some(file) = args.filters_file.clone() {
        config.filters_file = Some(file);
    }

    // Logs go to stderr, the amplitude bar owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("blockamp={}", config.logging.level))),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "blockamp {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.command {
        Command::Play {
            file,
            filter,
            delay,
            gff,
            gfb,
            scaling,
            device,
            led_device,
            audio_device,
            block_ms,
            wait_for_start,
        } => {
            if let Some(scaling) = scaling {
                config.scaling = scaling;
            }
            if let Some(device) = device {
                config.device = device;
            }
            if led_device.is_some() {
                config.led_device_path = led_device;
            }
            if audio_device.is_some() {
                config.audio_device = audio_device;
            }
            if let Some(ms) = block_ms {
                if ms == 0 {
                    bail!("--block-ms must be greater than 0");
                }
                config.block_duration_ms = ms;
            }

            let choice = match (filter, delay) {
                (Some(name), _) => Some(FilterChoice::Iir { name }),
                (None, Some(delay_ms)) => Some(FilterChoice::Delay {
                    delay_ms,
                    gain_ff: gff,
                    gain_fb: gfb,
                }),
                (None, None) => None,
            };

            play(&config, &file, choice, wait_for_start)
        }
        Command::Sounds => sounds(&config),
        Command::Filters { sample_rate } => filters(&config, sample_rate),
        Command::Devices => devices(),
    }
}

fn load_bank(config: &TomlConfig) -> Result<Option<FilterBank>> {
    match config.filters_file.as_ref() {
        Some(path) => {
            let bank = FilterBank::load(path)
                .with_context(|| format!("Failed to load filter bank {}", path.display()))?;
            debug!("Loaded {} filters from {}", bank.filters.len(), path.display());
            Ok(Some(bank))
        }
        None => Ok(None),
    }
}

/// `file` as given, or relative to the sounds directory
fn resolve_sound(config: &TomlConfig, file: &Path) -> PathBuf {
    if file.exists() || file.is_absolute() {
        file.to_path_buf()
    } else {
        config.sounds_dir.join(file)
    }
}

fn play(config: &TomlConfig, file: &Path, choice: Option<FilterChoice>, wait_for_start: bool) -> Result<()> {
    let bank = load_bank(config)?;
    let channel = Arc::new(ControlSignalChannel::new());

    let device: Arc<dyn PlayerDevice> = match config.device {
        DeviceKind::Console => Arc::new(ConsoleDevice::new(Arc::clone(&channel))),
        DeviceKind::LedBar => {
            let path = config
                .led_device_path
                .as_ref()
                .context("device 'led-bar' requires an LED device path")?;
            Arc::new(LedBarDevice::new(path, Arc::clone(&channel)))
        }
    };

    let settings = PlayerSettings {
        wait_for_start,
        ..PlayerSettings::from(config)
    };
    let mut player = Player::new(settings, device, CpalDevice::new(config.audio_device.clone()), bank);

    let path = resolve_sound(config, file);
    let sound = SoundFile::new(&path).with_context(|| format!("Cannot open sound file {}", path.display()))?;
    player.set_sound(Box::new(sound)).context("Failed to load sound")?;
    if let Some(choice) = choice {
        player.select_filter(choice).context("Failed to set up filter")?;
    }

    let report = player.play().context("Playback failed")?;
    drop(player);
    channel.close();

    println!(
        "Played {} blocks ({} frames), paused {} times",
        report.blocks_played, report.frames_played, report.pauses
    );
    Ok(())
}

fn sounds(config: &TomlConfig) -> Result<()> {
    let files = list_sounds(&config.sounds_dir)
        .with_context(|| format!("Cannot read sounds directory {}", config.sounds_dir.display()))?;
    if files.is_empty() {
        println!("No sound files in {}", config.sounds_dir.display());
        return Ok(());
    }

    for (index, path) in files.iter().enumerate() {
        match SoundFile::new(path) {
            Ok(sound) => {
                let info = sound.info();
                println!(
                    "{:3}  {:<40} {:>6} Hz  {} ch",
                    index + 1,
                    sound.name(),
                    info.sample_rate,
                    info.channels
                );
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn filters(config: &TomlConfig, sample_rate: u32) -> Result<()> {
    let bank = load_bank(config)?.context("No filter bank configured (set filters_file or --filters-file)")?;
    let available = bank.available_for(sample_rate);
    if available.is_empty() {
        println!("No filters for {} Hz", sample_rate);
    }
    for definition in available {
        println!("{}", definition.describe(sample_rate));
    }
    Ok(())
}

fn devices() -> Result<()> {
    let devices = CpalDevice::list_devices().context("Failed to list audio devices")?;
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}
