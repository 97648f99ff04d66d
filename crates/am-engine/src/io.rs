//! External collaborator interfaces (§1 "out of scope", §6): the engine
//! consumes PCM through a `Decoder` and a `Resampler` it never implements
//! itself — codecs, file I/O, and resampling quality are someone else's
//! concern. This module only carries the contracts those collaborators
//! must satisfy, plus the `SoundFormat` value they report.

use am_core::{AmError, AmResult};

/// Sample storage type reported by a decoder (§3 "Sound format").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Int,
    Float,
}

/// Channel layout reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    Planar,
    Interleaved,
}

/// `{sample_rate, channels, bits_per_sample, frames_count, frame_size,
/// sample_type, interleave}` (§3).
#[derive(Debug, Clone, Copy)]
pub struct SoundFormat {
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub frames_count: u64,
    pub frame_size: u32,
    pub sample_type: SampleType,
    pub interleave: Interleave,
}

/// Consumed interface for a PCM source (§1, §6 "Decoder interface").
/// Implementations live outside this crate (codec crates); the engine only
/// calls through this trait from `Channel`/`VoicePipeline`.
pub trait Decoder: Send {
    fn open(&mut self, path: &std::path::Path) -> AmResult<()>;
    fn close(&mut self);

    /// Decode the entire source into `buf` up front (non-streaming path).
    fn load(&mut self, buf: &mut Vec<f32>) -> AmResult<()>;

    /// Decode `frame_count` frames starting at `sample_offset` into `buf`
    /// (streaming path). Returns the number of frames actually written;
    /// `0` signals underrun, handled by the caller per §4.1 failure
    /// semantics (zero-fill and continue for a streaming voice).
    fn stream(&mut self, buf: &mut [f32], sample_offset: u64, frame_count: usize) -> AmResult<usize>;

    fn seek(&mut self, sample_offset: u64) -> AmResult<()>;
    fn format(&self) -> SoundFormat;
}

/// Consumed interface for sample-rate conversion (§6 "Resampler
/// interface"). A failure demotes the owning voice to virtual (§4.1).
pub trait Resampler: Send {
    fn initialize(&mut self, channels: u32, sample_rate_in: u32, sample_rate_out: u32) -> AmResult<()>;

    /// Convert `in_buf` (consuming up to `in_frames`) into `out_buf`
    /// (producing up to `out_frames`), reporting how many frames of each
    /// were actually used, via the in/out mutable frame counts. Returns
    /// `false` on an unrecoverable resampler fault.
    fn process(&mut self, in_buf: &[f32], in_frames: &mut usize, out_buf: &mut [f32], out_frames: &mut usize) -> bool;

    fn required_input_frames(&self, output_frames: usize) -> usize;
    fn reset(&mut self);
    fn clear(&mut self);
}

/// Minimal in-memory `Decoder` over pre-loaded PCM, used by tests and by
/// callers that have already decoded a sound with an external codec.
pub struct PcmDecoder {
    samples: Vec<f32>,
    format: SoundFormat,
}

impl PcmDecoder {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u32) -> Self {
        let frames_count = if channels > 0 { samples.len() as u64 / channels as u64 } else { 0 };
        Self {
            format: SoundFormat {
                sample_rate,
                channels,
                bits_per_sample: 32,
                frames_count,
                frame_size: channels * 4,
                sample_type: SampleType::Float,
                interleave: Interleave::Interleaved,
            },
            samples,
        }
    }
}

impl Decoder for PcmDecoder {
    fn open(&mut self, _path: &std::path::Path) -> AmResult<()> {
        Ok(())
    }

    fn close(&mut self) {}

    fn load(&mut self, buf: &mut Vec<f32>) -> AmResult<()> {
        buf.clear();
        buf.extend_from_slice(&self.samples);
        Ok(())
    }

    fn stream(&mut self, buf: &mut [f32], sample_offset: u64, frame_count: usize) -> AmResult<usize> {
        let channels = self.format.channels.max(1) as usize;
        let start = sample_offset as usize * channels;
        if start >= self.samples.len() {
            return Ok(0);
        }
        let available_frames = (self.samples.len() - start) / channels;
        let frames = frame_count.min(available_frames);
        let len = frames * channels;
        if len > buf.len() {
            return Err(AmError::InvalidParameter("stream buffer too small".into()));
        }
        buf[..len].copy_from_slice(&self.samples[start..start + len]);
        Ok(frames)
    }

    fn seek(&mut self, _sample_offset: u64) -> AmResult<()> {
        Ok(())
    }

    fn format(&self) -> SoundFormat {
        self.format
    }
}

/// Linear-interpolation resampler: adequate for a reference implementation
/// and for tests; a production build swaps in a higher-order collaborator
/// without changing this trait.
pub struct LinearResampler {
    channels: usize,
    ratio: f64,
    position: f64,
    last_frame: Vec<f32>,
}

impl LinearResampler {
    pub fn new() -> Self {
        Self { channels: 1, ratio: 1.0, position: 0.0, last_frame: Vec::new() }
    }
}

impl Default for LinearResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler for LinearResampler {
    fn initialize(&mut self, channels: u32, sample_rate_in: u32, sample_rate_out: u32) -> AmResult<()> {
        if sample_rate_out == 0 {
            return Err(AmError::InvalidParameter("sample_rate_out must be nonzero".into()));
        }
        self.channels = channels.max(1) as usize;
        self.ratio = sample_rate_in as f64 / sample_rate_out as f64;
        self.position = 0.0;
        self.last_frame = vec![0.0; self.channels];
        Ok(())
    }

    fn process(&mut self, in_buf: &[f32], in_frames: &mut usize, out_buf: &mut [f32], out_frames: &mut usize) -> bool {
        let channels = self.channels;
        let available_in = *in_frames;
        let requested_out = *out_frames;
        let mut produced = 0usize;
        let mut consumed_frac = self.position;

        while produced < requested_out {
            let idx = consumed_frac.floor() as usize;
            if idx + 1 >= available_in {
                break;
            }
            let frac = consumed_frac - idx as f64;
            for c in 0..channels {
                let a = in_buf[idx * channels + c];
                let b = in_buf[(idx + 1) * channels + c];
                out_buf[produced * channels + c] = a + (b - a) * frac as f32;
            }
            produced += 1;
            consumed_frac += self.ratio;
        }

        let consumed = (consumed_frac.floor() as usize).min(available_in.saturating_sub(1));
        self.position = consumed_frac - consumed as f64;
        *in_frames = consumed;
        *out_frames = produced;
        true
    }

    fn required_input_frames(&self, output_frames: usize) -> usize {
        (output_frames as f64 * self.ratio).ceil() as usize + 1
    }

    fn reset(&mut self) {
        self.position = 0.0;
    }

    fn clear(&mut self) {
        self.position = 0.0;
        self.last_frame.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_decoder_stream_reports_zero_frames_past_end() {
        let mut decoder = PcmDecoder::new(vec![0.0; 8], 48_000, 1);
        let mut buf = vec![0.0; 4];
        let frames = decoder.stream(&mut buf, 100, 4).unwrap();
        assert_eq!(frames, 0);
    }

    #[test]
    fn linear_resampler_identity_ratio_passes_through() {
        let mut resampler = LinearResampler::new();
        resampler.initialize(1, 48_000, 48_000).unwrap();
        let input = vec![0.0, 1.0, 2.0, 3.0];
        let mut output = vec![0.0; 3];
        let mut in_frames = 4;
        let mut out_frames = 3;
        assert!(resampler.process(&input, &mut in_frames, &mut output, &mut out_frames));
        assert_eq!(out_frames, 3);
        assert!((output[0] - 0.0).abs() < 1e-6);
        assert!((output[1] - 1.0).abs() < 1e-6);
    }
}
