//! Sound files decoded with symphonia
//!
//! A [`SoundFile`] is probed on creation (format only) and decoded completely
//! on `open()`; blocks are then served from memory. Samples keep the file's
//! own channel count and sample rate.

use super::source::{AudioSource, MemorySource};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, info, warn};

/// File extensions `list_sounds` treats as playable
pub const SOUND_EXTENSIONS: [&str; 4] = ["wav", "flac", "mp3", "ogg"];

/// Format of a sound file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundInfo {
    pub sample_rate: u32,
    pub channels: usize,
    /// Length in frames, if the container states it
    pub frames: Option<u64>,
}

pub struct SoundFile {
    path: PathBuf,
    info: SoundInfo,
    pcm: Option<MemorySource>,
}

impl SoundFile {
    /// Probe `path` for its format without decoding it.
    ///
    /// # Errors
    /// `Decode` if the file cannot be opened or holds no decodable audio track.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = probe(&path)?;
        let (_, params) = audio_track(format.as_ref())?;
        let info = sound_info(&params)?;

        debug!(
            "Probed {}: sample_rate={}, channels={}, frames={:?}",
            path.display(),
            info.sample_rate,
            info.channels,
            info.frames
        );

        Ok(Self { path, info, pcm: None })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> SoundInfo {
        self.info
    }

    /// File name without directories
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn pcm(&mut self) -> Result<&mut MemorySource> {
        self.pcm
            .as_mut()
            .ok_or_else(|| Error::State(format!("sound file {} is not open", self.path.display())))
    }
}

impl AudioSource for SoundFile {
    fn open(&mut self) -> Result<()> {
        if let Some(pcm) = self.pcm.as_mut() {
            return pcm.rewind();
        }

        let samples = decode_file(&self.path, self.info.channels)?;
        let mut pcm = MemorySource::new(samples, self.info.sample_rate, self.info.channels);
        pcm.open()?;
        info!(
            "Opened {}: {} frames at {} Hz, {} channels",
            self.name(),
            pcm.frames(),
            self.info.sample_rate,
            self.info.channels
        );
        self.pcm = Some(pcm);
        Ok(())
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        self.pcm()?.read(buf)
    }

    fn rewind(&mut self) -> Result<()> {
        self.pcm()?.rewind()
    }

    fn close(&mut self) {
        self.pcm = None;
    }

    fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    fn channels(&self) -> usize {
        self.info.channels
    }
}

/// Playable files directly inside `dir`, sorted by path
pub fn list_sounds(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut sounds: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_sound_file(path))
        .collect();
    sounds.sort();

    debug!("Found {} sound files in {}", sounds.len(), dir.display());
    Ok(sounds)
}

fn is_sound_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SOUND_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn probe(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path)
        .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to probe {}: {}", path.display(), e)))?;
    Ok(probed.format)
}

fn audio_track(format: &dyn FormatReader) -> Result<(u32, CodecParameters)> {
    format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))
}

fn sound_info(params: &CodecParameters) -> Result<SoundInfo> {
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
    let channels = params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

    Ok(SoundInfo {
        sample_rate,
        channels,
        frames: params.n_frames,
    })
}

/// Decode the whole file to interleaved `f32`
fn decode_file(path: &Path, channels: usize) -> Result<Vec<f32>> {
    debug!("Decoding entire file: {}", path.display());

    let mut format = probe(path)?;
    let (track_id, params) = audio_track(format.as_ref())?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Reached end of file");
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_interleaved(&decoded, &mut samples),
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(Error::Decode(format!("Decoding {} failed: {}", path.display(), e))),
        }
    }

    debug!(
        "Decoded {} samples ({} frames)",
        samples.len(),
        samples.len() / channels.max(1)
    );
    Ok(samples)
}

fn append_interleaved(decoded: &AudioBufferRef, output: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => interleave(buf, output),
        AudioBufferRef::U16(buf) => interleave(buf, output),
        AudioBufferRef::U24(buf) => interleave(buf, output),
        AudioBufferRef::U32(buf) => interleave(buf, output),
        AudioBufferRef::S8(buf) => interleave(buf, output),
        AudioBufferRef::S16(buf) => interleave(buf, output),
        AudioBufferRef::S24(buf) => interleave(buf, output),
        AudioBufferRef::S32(buf) => interleave(buf, output),
        AudioBufferRef::F32(buf) => interleave(buf, output),
        AudioBufferRef::F64(buf) => interleave(buf, output),
    }
}

/// Planar to interleaved, converting to `f32` in `[-1, 1]`
fn interleave<S>(buf: &AudioBuffer<S>, output: &mut Vec<f32>)
where
    S: Sample + IntoSample<f32>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    output.reserve(frames * channels);

    for frame in 0..frames {
        for ch in 0..channels {
            output.push(buf.chan(ch)[frame].into_sample());
        }
    }
}
