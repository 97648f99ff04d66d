//! Piecewise curve (§3 "Curve"): the shape consumed by RTPC read-time
//! mapping and by attenuation distance→gain lookups.
//!
//! Distinct from [`am_event::FaderCurve`] (a single cubic Bézier segment
//! driving one [`am_event::Fader`] ramp over time): a [`Curve`] is a list of
//! segments over an arbitrary `x` domain, each itself shaped by a
//! `FaderCurve`, evaluated at read time rather than advanced tick by tick.

use am_event::FaderCurve;

/// One segment of a [`Curve`]: maps `x` in `[start.0, end.0]` to `y` in
/// `[start.1, end.1]` through `fader`'s Bézier shape.
#[derive(Debug, Clone, Copy)]
pub struct CurvePart {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub fader: FaderCurve,
}

impl CurvePart {
    pub fn new(start: (f64, f64), end: (f64, f64), fader: FaderCurve) -> Self {
        Self { start, end, fader }
    }

    fn contains(&self, x: f64) -> bool {
        x >= self.start.0 && x <= self.end.0
    }

    fn evaluate(&self, x: f64) -> f64 {
        let span = self.end.0 - self.start.0;
        let p = if span.abs() < f64::EPSILON {
            0.0
        } else {
            ((x - self.start.0) / span).clamp(0.0, 1.0)
        };
        let u = self.fader.evaluate(p);
        self.start.1 + (self.end.1 - self.start.1) * u
    }
}

/// A piecewise curve: an ordered list of [`CurvePart`]s. Evaluation at `x`
/// locates the containing segment (clamping to the first/last segment's
/// endpoints outside the curve's domain) and returns its fader mapping of
/// the normalized `x` (§3).
#[derive(Debug, Clone)]
pub struct Curve {
    parts: Vec<CurvePart>,
}

impl Curve {
    pub fn new(mut parts: Vec<CurvePart>) -> Self {
        parts.sort_by(|a, b| a.start.0.partial_cmp(&b.start.0).unwrap());
        Self { parts }
    }

    /// A single-segment curve spanning `[x0, x1]` under one `FaderCurve`.
    pub fn single(start: (f64, f64), end: (f64, f64), fader: FaderCurve) -> Self {
        Self::new(vec![CurvePart::new(start, end, fader)])
    }

    /// A curve that returns `y` for every `x` (e.g. an attenuation with no
    /// distance falloff).
    pub fn constant(y: f64) -> Self {
        Self::single((0.0, y), (1.0, y), FaderCurve::CONSTANT)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let Some(first) = self.parts.first() else {
            return 0.0;
        };
        if x <= first.start.0 {
            return first.start.1;
        }
        let last = self.parts.last().unwrap();
        if x >= last.end.0 {
            return last.end.1;
        }
        for part in &self.parts {
            if part.contains(x) {
                return part.evaluate(x);
            }
        }
        // Gap between segments: hold the nearest preceding segment's end.
        self.parts
            .iter()
            .rev()
            .find(|p| p.end.0 <= x)
            .map(|p| p.end.1)
            .unwrap_or(last.end.1)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn evaluate_returns_endpoints_exactly_outside_domain() {
        let curve = Curve::single((0.0, 0.0), (10.0, 1.0), FaderCurve::LINEAR);
        assert_eq!(curve.evaluate(-5.0), 0.0);
        assert_eq!(curve.evaluate(15.0), 1.0);
        assert_eq!(curve.evaluate(0.0), 0.0);
        assert_eq!(curve.evaluate(10.0), 1.0);
    }

    #[test]
    fn linear_single_segment_is_exactly_linear() {
        let curve = Curve::single((0.0, 0.0), (10.0, 100.0), FaderCurve::LINEAR);
        assert_abs_diff_eq!(curve.evaluate(5.0), 50.0, epsilon = 1e-6);
    }

    #[test]
    fn multi_segment_picks_the_containing_part() {
        let curve = Curve::new(vec![
            CurvePart::new((0.0, 0.0), (5.0, 1.0), FaderCurve::LINEAR),
            CurvePart::new((5.0, 1.0), (10.0, 0.0), FaderCurve::LINEAR),
        ]);
        assert_abs_diff_eq!(curve.evaluate(2.5), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(curve.evaluate(7.5), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn constant_curve_holds_value_everywhere() {
        let curve = Curve::constant(0.75);
        assert_eq!(curve.evaluate(0.0), 0.75);
        assert_eq!(curve.evaluate(100.0), 0.75);
    }
}
