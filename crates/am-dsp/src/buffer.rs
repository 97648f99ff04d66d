//! Planar audio buffers and the fixed-width SIMD kernels the pipeline nodes
//! share: scalar multiply(-accumulate), point-wise multiply(-accumulate),
//! interleave, and a split-complex FFT wrapper.
//!
//! Unlike `simd` (which picks a kernel at runtime via CPUID), these kernels
//! use `wide`'s portable vector types so the instruction selection is fixed
//! at compile time — there is no branch on the audio thread.

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;
use wide::f32x8;

const LANES: usize = 8;

/// `out[i] = in[i] * k`
pub fn scalar_multiply(input: &[f32], output: &mut [f32], k: f32) {
    debug_assert_eq!(input.len(), output.len());
    let kv = f32x8::splat(k);
    let chunks = input.len() / LANES;
    for i in 0..chunks {
        let base = i * LANES;
        let v = f32x8::from(<[f32; LANES]>::try_from(&input[base..base + LANES]).unwrap());
        let r = (v * kv).to_array();
        output[base..base + LANES].copy_from_slice(&r);
    }
    for i in chunks * LANES..input.len() {
        output[i] = input[i] * k;
    }
}

/// `out[i] += in[i] * k`
pub fn scalar_multiply_accumulate(input: &[f32], output: &mut [f32], k: f32) {
    debug_assert_eq!(input.len(), output.len());
    let kv = f32x8::splat(k);
    let chunks = input.len() / LANES;
    for i in 0..chunks {
        let base = i * LANES;
        let iv = f32x8::from(<[f32; LANES]>::try_from(&input[base..base + LANES]).unwrap());
        let ov = f32x8::from(<[f32; LANES]>::try_from(&output[base..base + LANES]).unwrap());
        let r = (ov + iv * kv).to_array();
        output[base..base + LANES].copy_from_slice(&r);
    }
    for i in chunks * LANES..input.len() {
        output[i] += input[i] * k;
    }
}

/// `out[i] = a[i] * b[i]`
pub fn point_wise_multiply(a: &[f32], b: &[f32], out: &mut [f32]) {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), out.len());
    let chunks = a.len() / LANES;
    for i in 0..chunks {
        let base = i * LANES;
        let av = f32x8::from(<[f32; LANES]>::try_from(&a[base..base + LANES]).unwrap());
        let bv = f32x8::from(<[f32; LANES]>::try_from(&b[base..base + LANES]).unwrap());
        let r = (av * bv).to_array();
        out[base..base + LANES].copy_from_slice(&r);
    }
    for i in chunks * LANES..a.len() {
        out[i] = a[i] * b[i];
    }
}

/// `out[i] += a[i] * b[i]`
pub fn point_wise_multiply_accumulate(a: &[f32], b: &[f32], out: &mut [f32]) {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), out.len());
    let chunks = a.len() / LANES;
    for i in 0..chunks {
        let base = i * LANES;
        let av = f32x8::from(<[f32; LANES]>::try_from(&a[base..base + LANES]).unwrap());
        let bv = f32x8::from(<[f32; LANES]>::try_from(&b[base..base + LANES]).unwrap());
        let ov = f32x8::from(<[f32; LANES]>::try_from(&out[base..base + LANES]).unwrap());
        let r = (ov + av * bv).to_array();
        out[base..base + LANES].copy_from_slice(&r);
    }
    for i in chunks * LANES..a.len() {
        out[i] += a[i] * b[i];
    }
}

/// Interleave `channels.len()` planar buffers of `n` frames each into
/// `out[frame * channels.len() + channel]`.
pub fn interleave(planar_channels: &[&[f32]], out_interleaved: &mut [f32], n: usize) {
    let channels = planar_channels.len();
    debug_assert_eq!(out_interleaved.len(), n * channels);
    for (c, channel) in planar_channels.iter().enumerate() {
        debug_assert_eq!(channel.len(), n);
        for frame in 0..n {
            out_interleaved[frame * channels + c] = channel[frame];
        }
    }
}

/// Inverse of [`interleave`]: split `in_interleaved` back into `channels.len()`
/// planar buffers of `n` frames each.
pub fn deinterleave(in_interleaved: &[f32], planar_channels: &mut [&mut [f32]], n: usize) {
    let channels = planar_channels.len();
    debug_assert_eq!(in_interleaved.len(), n * channels);
    for (c, channel) in planar_channels.iter_mut().enumerate() {
        debug_assert_eq!(channel.len(), n);
        for frame in 0..n {
            channel[frame] = in_interleaved[frame * channels + c];
        }
    }
}

/// `n / 2 + 1`, the bin count of a real-input FFT of length `n`.
#[inline]
pub fn complex_size(n: usize) -> usize {
    n / 2 + 1
}

/// Real/imaginary planes of a real-input FFT's spectrum, laid out for
/// pipeline nodes that want to touch bins without a `Complex<f32>` tuple.
#[derive(Debug, Clone)]
pub struct SplitComplex {
    pub re: Vec<f32>,
    pub im: Vec<f32>,
}

impl SplitComplex {
    pub fn zeroed(n: usize) -> Self {
        let bins = complex_size(n);
        Self {
            re: vec![0.0; bins],
            im: vec![0.0; bins],
        }
    }

    fn to_rustfft(&self) -> Vec<Complex<f32>> {
        self.re
            .iter()
            .zip(self.im.iter())
            .map(|(&re, &im)| Complex::new(re, im))
            .collect()
    }

    fn from_rustfft(&mut self, spectrum: &[Complex<f32>]) {
        for (i, c) in spectrum.iter().enumerate() {
            self.re[i] = c.re;
            self.im[i] = c.im;
        }
    }
}

/// Forward/inverse real FFT pair of a fixed block length, reused across
/// blocks so no allocation happens on the audio thread after construction.
pub struct FftKernel {
    len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    scratch_fwd: Vec<Complex<f32>>,
    scratch_inv: Vec<Complex<f32>>,
}

impl FftKernel {
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        Self {
            len,
            scratch_fwd: forward.make_output_vec(),
            scratch_inv: inverse.make_input_vec(),
            forward,
            inverse,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn forward(&mut self, time: &mut [f32], out: &mut SplitComplex) {
        self.forward
            .process(time, &mut self.scratch_fwd)
            .expect("fft forward: buffer length mismatch");
        out.from_rustfft(&self.scratch_fwd);
    }

    pub fn inverse(&mut self, spectrum: &SplitComplex, out: &mut [f32]) {
        self.scratch_inv.copy_from_slice(&spectrum.to_rustfft());
        self.inverse
            .process(&mut self.scratch_inv, out)
            .expect("fft inverse: buffer length mismatch");
    }
}

/// A planar multi-channel audio buffer: `channels[c][frame]`, all channels
/// the same length. Either empty (zero frames) or has at least one channel.
#[derive(Debug, Clone)]
pub struct PlanarAudioBuffer {
    frame_count: usize,
    channels: Vec<Vec<f32>>,
}

impl PlanarAudioBuffer {
    pub fn new(channel_count: usize, frame_count: usize) -> Self {
        Self {
            frame_count,
            channels: vec![vec![0.0; frame_count]; channel_count],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    pub fn interleave_into(&self, out: &mut [f32]) {
        let refs: Vec<&[f32]> = self.channels.iter().map(|c| c.as_slice()).collect();
        interleave(&refs, out, self.frame_count);
    }

    pub fn deinterleave_from(&mut self, input: &[f32]) {
        let frame_count = self.frame_count;
        let mut refs: Vec<&mut [f32]> = self.channels.iter_mut().map(|c| c.as_mut_slice()).collect();
        deinterleave(input, &mut refs, frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_multiply_matches_scalar_loop() {
        let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut out = vec![0.0; 20];
        scalar_multiply(&input, &mut out, 2.0);
        for (i, &v) in out.iter().enumerate() {
            assert_eq!(v, input[i] * 2.0);
        }
    }

    #[test]
    fn multiply_accumulate_adds_to_existing_output() {
        let a: Vec<f32> = vec![1.0; 17];
        let mut out = vec![1.0; 17];
        scalar_multiply_accumulate(&a, &mut out, 3.0);
        assert!(out.iter().all(|&v| (v - 4.0).abs() < 1e-6));
    }

    #[test]
    fn point_wise_multiply_matches_scalar_loop() {
        let a: Vec<f32> = (0..13).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..13).map(|i| (i as f32) * 0.5).collect();
        let mut out = vec![0.0; 13];
        point_wise_multiply(&a, &b, &mut out);
        for i in 0..13 {
            assert_eq!(out[i], a[i] * b[i]);
        }
    }

    #[test]
    fn interleave_deinterleave_round_trips() {
        let left: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let right: Vec<f32> = vec![-1.0, -2.0, -3.0, -4.0];
        let mut interleaved = vec![0.0; 8];
        interleave(&[&left, &right], &mut interleaved, 4);
        assert_eq!(interleaved, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0]);

        let mut back_l = vec![0.0; 4];
        let mut back_r = vec![0.0; 4];
        deinterleave(&interleaved, &mut [&mut back_l, &mut back_r], 4);
        assert_eq!(back_l, left);
        assert_eq!(back_r, right);
    }

    #[test]
    fn fft_round_trip_recovers_impulse() {
        let mut kernel = FftKernel::new(16);
        let mut time = vec![0.0f32; 16];
        time[0] = 1.0;
        let mut spectrum = SplitComplex::zeroed(16);
        kernel.forward(&mut time, &mut spectrum);

        let mut back = vec![0.0f32; 16];
        kernel.inverse(&spectrum, &mut back);
        for sample in back.iter_mut() {
            *sample /= 16.0;
        }
        assert!((back[0] - 1.0).abs() < 1e-4);
        for &s in &back[1..] {
            assert!(s.abs() < 1e-4);
        }
    }

    #[test]
    fn planar_buffer_interleave_round_trips() {
        let mut buf = PlanarAudioBuffer::new(2, 4);
        buf.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        buf.channel_mut(1).copy_from_slice(&[5.0, 6.0, 7.0, 8.0]);

        let mut interleaved = vec![0.0; 8];
        buf.interleave_into(&mut interleaved);

        let mut roundtrip = PlanarAudioBuffer::new(2, 4);
        roundtrip.deinterleave_from(&interleaved);
        assert_eq!(roundtrip.channel(0), buf.channel(0));
        assert_eq!(roundtrip.channel(1), buf.channel(1));
    }
}
