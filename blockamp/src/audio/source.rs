//! Block sources for the playback engine

use crate::error::{Error, Result};

/// Stream of interleaved `f32` samples in a fixed format
pub trait AudioSource {
    fn open(&mut self) -> Result<()>;

    /// Fill `buf` from the current position and return the number of samples
    /// written. Fewer than `buf.len()` only at the end of the stream, 0 once
    /// it is exhausted.
    fn read(&mut self, buf: &mut [f32]) -> Result<usize>;

    /// Go back to the first sample
    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self);

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;
}

/// Source over samples already in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<f32>,
    position: usize,
    sample_rate: u32,
    channels: usize,
    is_open: bool,
}

impl MemorySource {
    /// Trailing samples that do not make up a whole frame are dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        if channels > 0 {
            let whole = samples.len() - samples.len() % channels;
            samples.truncate(whole);
        }
        Self {
            samples,
            position: 0,
            sample_rate,
            channels,
            is_open: false,
        }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Samples not read yet
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }
}

impl AudioSource for MemorySource {
    fn open(&mut self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::Configuration("source has no channels".to_string()));
        }
        self.is_open = true;
        self.position = 0;
        Ok(())
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<usize> {
        if !self.is_open {
            return Err(Error::State("read() on a source that is not open".to_string()));
        }
        let count = buf.len().min(self.remaining());
        buf[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.is_open {
            return Err(Error::State("rewind() on a source that is not open".to_string()));
        }
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.is_open = false;
        self.position = 0;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_until_exhausted() {
        let mut source = MemorySource::new((0..10).map(|i| i as f32).collect(), 8000, 2);
        source.open().unwrap();

        let mut buf = [0.0; 4];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[8.0, 9.0]);
        assert_eq!(source.read(&mut buf).unwrap(), 0);

        source.rewind().unwrap();
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_partial_frames_dropped() {
        let source = MemorySource::new(vec![0.0; 7], 8000, 2);
        assert_eq!(source.frames(), 3);
        assert_eq!(source.samples().len(), 6);
    }

    #[test]
    fn test_read_requires_open() {
        let mut source = MemorySource::new(vec![0.0; 4], 8000, 1);
        let mut buf = [0.0; 2];
        assert!(matches!(source.read(&mut buf), Err(Error::State(_))));
        source.open().unwrap();
        source.close();
        assert!(source.read(&mut buf).is_err());
    }
}
