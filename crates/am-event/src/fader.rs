//! `Fader` — a time-driven scalar ramp over a cubic Bézier curve (§4.3).
//!
//! Owns its own `from`/`to`/`start`/`end` and is advanced by the mixer
//! tick, which is what RTPC attack/release and bus `fade_to` actually need.

/// Control points of the cubic Bézier `(0,0), (p1x,p1y), (p2x,p2y), (1,1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaderCurve {
    pub p1x: f64,
    pub p1y: f64,
    pub p2x: f64,
    pub p2y: f64,
}

impl FaderCurve {
    pub const LINEAR: Self = Self { p1x: 0.0, p1y: 0.0, p2x: 1.0, p2y: 1.0 };
    pub const CONSTANT: Self = Self { p1x: 0.0, p1y: 0.0, p2x: 1.0, p2y: 0.0 };
    pub const EASE: Self = Self { p1x: 0.25, p1y: 0.1, p2x: 0.25, p2y: 1.0 };
    pub const EASE_IN: Self = Self { p1x: 0.42, p1y: 0.0, p2x: 1.0, p2y: 1.0 };
    pub const EASE_IN_OUT: Self = Self { p1x: 0.42, p1y: 0.0, p2x: 0.58, p2y: 1.0 };
    pub const EASE_OUT: Self = Self { p1x: 0.0, p1y: 0.0, p2x: 0.58, p2y: 1.0 };
    pub const EXPONENTIAL: Self = Self { p1x: 0.7, p1y: 0.0, p2x: 0.84, p2y: 0.0 };
    pub const S_CURVE: Self = Self { p1x: 0.5, p1y: 0.0, p2x: 0.5, p2y: 1.0 };

    #[inline]
    fn bezier_component(u: f64, p1: f64, p2: f64) -> f64 {
        let one_minus_u = 1.0 - u;
        3.0 * one_minus_u * one_minus_u * u * p1 + 3.0 * one_minus_u * u * u * p2 + u * u * u
    }

    #[inline]
    fn bezier_x(&self, u: f64) -> f64 {
        Self::bezier_component(u, self.p1x, self.p2x)
    }

    #[inline]
    fn bezier_y(&self, u: f64) -> f64 {
        Self::bezier_component(u, self.p1y, self.p2y)
    }

    /// Solve `bezier_x(u) = p` for `u` by bisection, then return `bezier_y(u)`.
    pub fn evaluate(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        if p <= 0.0 {
            return self.bezier_y(0.0);
        }
        if p >= 1.0 {
            return self.bezier_y(1.0);
        }
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        let mut u = p;
        for _ in 0..32 {
            let x = self.bezier_x(u);
            if (x - p).abs() < 1e-9 {
                break;
            }
            if x < p {
                lo = u;
            } else {
                hi = u;
            }
            u = 0.5 * (lo + hi);
        }
        self.bezier_y(u)
    }
}

/// Where a [`Fader`] currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaderState {
    /// Never started; `value()` returns `from`.
    Disabled,
    /// Ramping (or holding, for a `duration == 0` fader) between `start_time`
    /// and `end_time`.
    Active,
    /// Oscillating `from + amplitude * sin(2*pi*p)` indefinitely.
    Lfo,
    /// Past `end_time`; `value()` returns `to` and will keep doing so.
    Stopped,
}

/// A time-driven ramp from `from` to `to` over `[start_time, end_time]`
/// under a [`FaderCurve`].
#[derive(Debug, Clone, Copy)]
pub struct Fader {
    from: f64,
    to: f64,
    start_time: f64,
    end_time: f64,
    curve: FaderCurve,
    state: FaderState,
}

impl Fader {
    /// A fader that never moves; `value()` is always `from`.
    pub fn disabled(value: f64) -> Self {
        Self {
            from: value,
            to: value,
            start_time: 0.0,
            end_time: 0.0,
            curve: FaderCurve::LINEAR,
            state: FaderState::Disabled,
        }
    }

    /// Start a ramp from `from` to `to` lasting `duration` seconds, beginning
    /// at `now`. `duration <= 0` makes the fader instantaneous: `value(t)`
    /// is `to` for any `t >= now`.
    pub fn start(from: f64, to: f64, duration: f64, now: f64, curve: FaderCurve) -> Self {
        let duration = duration.max(0.0);
        Self {
            from,
            to,
            start_time: now,
            end_time: now + duration,
            curve,
            state: if duration <= 0.0 { FaderState::Stopped } else { FaderState::Active },
        }
    }

    /// Start an indefinite LFO oscillating `from + (to - from) * sin(2*pi*p)`
    /// with one full cycle every `period` seconds.
    pub fn start_lfo(from: f64, to: f64, period: f64, now: f64) -> Self {
        Self {
            from,
            to,
            start_time: now,
            end_time: now + period.max(1e-6),
            curve: FaderCurve::LINEAR,
            state: FaderState::Lfo,
        }
    }

    /// Retarget the fader at time `now`. If `now` is earlier than the
    /// previous `start_time` (a rollback), the ramp restarts from the
    /// fader's *current* value at `now` rather than jumping, preserving
    /// continuity.
    pub fn retarget(&mut self, to: f64, duration: f64, now: f64, curve: FaderCurve) {
        self.from = self.value(now);
        self.to = to;
        self.start_time = now;
        let duration = duration.max(0.0);
        self.end_time = now + duration;
        self.curve = curve;
        self.state = if duration <= 0.0 { FaderState::Stopped } else { FaderState::Active };
    }

    pub fn state(&self) -> FaderState {
        self.state
    }

    pub fn is_done(&self, now: f64) -> bool {
        matches!(self.state, FaderState::Disabled) || (matches!(self.state, FaderState::Active | FaderState::Stopped) && now >= self.end_time)
    }

    /// `value(t)`: `from` at `t <= start`, `to` at `t >= end` (exactly, per
    /// §8), otherwise the curve-mapped interpolation.
    pub fn value(&self, t: f64) -> f64 {
        match self.state {
            FaderState::Disabled => self.from,
            FaderState::Stopped => self.to,
            FaderState::Lfo => {
                let period = (self.end_time - self.start_time).max(1e-6);
                let p = ((t - self.start_time) / period).rem_euclid(1.0);
                let amplitude = self.to - self.from;
                self.from + amplitude * (2.0 * std::f64::consts::PI * p).sin()
            }
            FaderState::Active => {
                if t <= self.start_time {
                    return self.from;
                }
                if t >= self.end_time {
                    return self.to;
                }
                let p = (t - self.start_time) / (self.end_time - self.start_time);
                let u = self.curve.evaluate(p);
                self.from + (self.to - self.from) * u
            }
        }
    }

    /// Advance internal bookkeeping for tick `now`; transitions `Active` to
    /// `Stopped` once the ramp completes.
    pub fn advance(&mut self, now: f64) {
        if matches!(self.state, FaderState::Active) && now >= self.end_time {
            self.state = FaderState::Stopped;
        }
    }

    pub fn to(&self) -> f64 {
        self.to
    }

    pub fn from(&self) -> f64 {
        self.from
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn zero_duration_fader_is_instantaneous() {
        let fader = Fader::start(0.0, 1.0, 0.0, 0.0, FaderCurve::LINEAR);
        assert_eq!(fader.value(0.0), 1.0);
        assert_eq!(fader.value(100.0), 1.0);
    }

    #[test]
    fn value_clamps_to_from_and_to_at_boundaries() {
        let fader = Fader::start(2.0, 5.0, 1.0, 0.0, FaderCurve::EASE_IN_OUT);
        assert_eq!(fader.value(-1.0), 2.0);
        assert_eq!(fader.value(0.0), 2.0);
        assert_eq!(fader.value(1.0), 5.0);
        assert_eq!(fader.value(10.0), 5.0);
    }

    #[test]
    fn linear_curve_is_monotonic_and_passes_through_midpoint() {
        let fader = Fader::start(0.0, 1.0, 1.0, 0.0, FaderCurve::LINEAR);
        let mid = fader.value(0.5);
        assert_abs_diff_eq!(mid, 0.5, epsilon = 1e-6);
        let mut prev = fader.value(0.0);
        for i in 1..=10 {
            let t = i as f64 / 10.0;
            let v = fader.value(t);
            assert!(v >= prev - 1e-9);
            prev = v;
        }
    }

    #[test]
    fn rollback_restarts_from_current_value_not_original_from() {
        let mut fader = Fader::start(0.0, 1.0, 10.0, 0.0, FaderCurve::LINEAR);
        let mid_value = fader.value(5.0);
        fader.retarget(0.0, 10.0, 5.0, FaderCurve::LINEAR);
        assert_abs_diff_eq!(fader.from(), mid_value, epsilon = 1e-6);
    }

    #[test]
    fn lfo_oscillates_between_from_and_to() {
        let fader = Fader::start_lfo(-1.0, 1.0, 1.0, 0.0);
        assert_abs_diff_eq!(fader.value(0.0), -1.0, epsilon = 1e-6);
        let quarter = fader.value(0.25);
        assert!((quarter - (-1.0)).abs() < 1.1 && quarter > -1.0);
    }

    #[test]
    fn advance_transitions_active_to_stopped_past_end() {
        let mut fader = Fader::start(0.0, 1.0, 1.0, 0.0, FaderCurve::LINEAR);
        assert_eq!(fader.state(), FaderState::Active);
        fader.advance(2.0);
        assert_eq!(fader.state(), FaderState::Stopped);
        assert_eq!(fader.value(2.0), 1.0);
    }
}
