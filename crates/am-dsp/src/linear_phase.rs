//! FFT-based linear-phase EQ: a fixed-length windowed-sinc FIR whose magnitude
//! response is the sum of per-band prototype curves, rebuilt whenever a band
//! changes. Latency is constant at `TAPS / 2` samples regardless of band count.

use am_core::Sample;
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

use crate::{Processor, ProcessorConfig, StereoProcessor};

/// Filter shape for one linear-phase band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearPhaseFilterType {
    Bell,
    LowShelf,
    HighShelf,
    LowCut,
    HighCut,
    Notch,
    BandPass,
    Tilt,
}

/// One band in the linear-phase prototype.
#[derive(Debug, Clone, Copy)]
pub struct LinearPhaseBand {
    pub filter_type: LinearPhaseFilterType,
    pub frequency: f64,
    pub gain: f64,
    pub q: f64,
    pub slope: f64,
    pub enabled: bool,
}

impl LinearPhaseBand {
    /// Linear magnitude at `freq`, matching the minimum-phase band it mirrors
    /// closely enough for the "hybrid" blend mode — only magnitude matters
    /// here since phase is reconstructed as zero by the FIR design below.
    fn magnitude_at(&self, freq: f64) -> f64 {
        if !self.enabled || freq <= 0.0 {
            return 1.0;
        }
        let gain_lin = 10f64.powf(self.gain / 20.0);
        let ratio = freq / self.frequency;

        match self.filter_type {
            LinearPhaseFilterType::Bell => {
                let bw = ratio.ln() * self.q.max(0.1);
                1.0 + (gain_lin - 1.0) / (1.0 + bw * bw)
            }
            LinearPhaseFilterType::LowShelf => {
                let x = ratio.powf(2.0 * self.q.max(0.1));
                (1.0 + gain_lin * x) / (1.0 + x)
            }
            LinearPhaseFilterType::HighShelf => {
                let x = (1.0 / ratio.max(1e-6)).powf(2.0 * self.q.max(0.1));
                (1.0 + gain_lin * x) / (1.0 + x)
            }
            LinearPhaseFilterType::Tilt => {
                let x = ratio.ln();
                (gain_lin.ln() * x.tanh()).exp()
            }
            LinearPhaseFilterType::LowCut => {
                let n = (self.slope / 6.0).max(1.0);
                let x = ratio.powf(2.0 * n);
                (x / (1.0 + x)).sqrt()
            }
            LinearPhaseFilterType::HighCut => {
                let n = (self.slope / 6.0).max(1.0);
                let x = (1.0 / ratio.max(1e-6)).powf(2.0 * n);
                (x / (1.0 + x)).sqrt()
            }
            LinearPhaseFilterType::Notch => {
                let bw = ratio.ln() * self.q.max(0.1);
                1.0 / (1.0 + 1.0 / (bw * bw + 1e-9))
            }
            LinearPhaseFilterType::BandPass => {
                let bw = ratio.ln() * self.q.max(0.1);
                1.0 / (1.0 + bw * bw)
            }
        }
    }
}

const TAPS: usize = 1025; // odd, centered tap => integer-sample latency

/// Zero-phase FIR built from the sum of band magnitude responses, applied by
/// direct time-domain convolution (this path runs outside the per-voice mix
/// tick, so a simple O(taps) convolution is fine).
pub struct LinearPhaseEQ {
    bands: Vec<LinearPhaseBand>,
    sample_rate: f64,
    taps: Vec<Sample>,
    history_l: Vec<Sample>,
    history_r: Vec<Sample>,
    write_pos: usize,
}

impl LinearPhaseEQ {
    pub fn new(sample_rate: f64) -> Self {
        let mut eq = Self {
            bands: Vec::new(),
            sample_rate,
            taps: vec![0.0; TAPS],
            history_l: vec![0.0; TAPS],
            history_r: vec![0.0; TAPS],
            write_pos: 0,
        };
        eq.rebuild();
        eq
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn add_band(&mut self, band: LinearPhaseBand) {
        self.bands.push(band);
        self.rebuild();
    }

    pub fn remove_band(&mut self, index: usize) {
        if index < self.bands.len() {
            self.bands.remove(index);
            self.rebuild();
        }
    }

    /// Sample the combined magnitude response, IFFT it to an impulse, and
    /// apply a Blackman window to taper the truncation to `TAPS`.
    fn rebuild(&mut self) {
        let fft_len = TAPS.next_power_of_two() * 4;
        let mut planner = RealFftPlanner::<f64>::new();
        let ifft = planner.plan_fft_inverse(fft_len);
        let mut spectrum: Vec<Complex<f64>> = (0..fft_len / 2 + 1)
            .map(|bin| {
                let freq = bin as f64 * self.sample_rate / fft_len as f64;
                let mag = self
                    .bands
                    .iter()
                    .filter(|b| b.enabled)
                    .fold(1.0, |acc, b| acc * b.magnitude_at(freq.max(1.0)));
                Complex::new(mag, 0.0)
            })
            .collect();
        let mut time: Vec<f64> = vec![0.0; fft_len];
        if ifft.process(&mut spectrum, &mut time).is_err() {
            self.taps.fill(0.0);
            if let Some(mid) = self.taps.get_mut(TAPS / 2) {
                *mid = 1.0;
            }
            return;
        }

        let half = TAPS / 2;
        for (i, tap) in self.taps.iter_mut().enumerate() {
            let offset = i as isize - half as isize;
            let src = offset.rem_euclid(fft_len as isize) as usize;
            let window = 0.42 - 0.5 * (2.0 * PI * i as f64 / (TAPS - 1) as f64).cos()
                + 0.08 * (4.0 * PI * i as f64 / (TAPS - 1) as f64).cos();
            *tap = time[src] / fft_len as f64 * window;
        }
    }

    fn push_and_convolve(history: &mut [Sample], write_pos: usize, taps: &[Sample], x: Sample) -> Sample {
        history[write_pos] = x;
        let mut acc = 0.0;
        for (i, &tap) in taps.iter().enumerate() {
            let idx = (write_pos + TAPS - i) % TAPS;
            acc += tap * history[idx];
        }
        acc
    }
}

impl Processor for LinearPhaseEQ {
    fn reset(&mut self) {
        self.history_l.fill(0.0);
        self.history_r.fill(0.0);
        self.write_pos = 0;
    }

    fn latency(&self) -> usize {
        TAPS / 2
    }
}

impl StereoProcessor for LinearPhaseEQ {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let out_l = Self::push_and_convolve(&mut self.history_l, self.write_pos, &self.taps, left);
        let out_r = Self::push_and_convolve(&mut self.history_r, self.write_pos, &self.taps, right);
        self.write_pos = (self.write_pos + 1) % TAPS;
        (out_l, out_r)
    }
}

impl ProcessorConfig for LinearPhaseEQ {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.rebuild();
    }
}
