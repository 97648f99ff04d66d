//! Attenuation (§3, §4.7 "Attenuation" node): a distance/shape-aware scalar
//! gain for a (source, listener) pair, authored as a [`Curve`] over distance.

use am_core::AttenuationId;
use am_spatial::Position3D;

use crate::curve::Curve;

/// The volume this attenuation's distance falloff is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttenuationShape {
    /// Falloff is radially symmetric distance from `source`.
    Sphere,
    /// Falloff only applies within `half_angle_deg` of `source`'s forward
    /// axis; outside the cone, gain is the curve's value at `max_distance`
    /// (fully attenuated).
    Cone { forward: Position3D, half_angle_deg: f64 },
    /// Falloff is measured as the Chebyshev (max-axis) distance to the
    /// box's half-extents, centered on `source`.
    Box { half_extents: Position3D },
    /// Falloff is measured as the distance to the nearest point on a
    /// segment of length `half_length * 2` centered on `source`, aligned
    /// along `axis`.
    Capsule { axis: Position3D, half_length: f64 },
}

/// `{id, max_distance, gain_curve, shape}` (§3).
pub struct Attenuation {
    pub id: AttenuationId,
    pub max_distance: f64,
    pub gain_curve: Curve,
    pub shape: AttenuationShape,
}

impl Attenuation {
    pub fn new(id: AttenuationId, max_distance: f64, gain_curve: Curve, shape: AttenuationShape) -> Self {
        Self { id, max_distance, gain_curve, shape }
    }

    /// Scalar gain for `source` as heard from `listener`, per §4.7's
    /// Attenuation node contract. The curve is evaluated at the shape's
    /// notion of distance, clamped to `[0, max_distance]` so that
    /// `x = max_distance` always yields exactly the curve's value there.
    pub fn gain(&self, source: Position3D, listener: Position3D) -> f64 {
        let distance = self.shape_distance(source, listener).min(self.max_distance).max(0.0);
        self.gain_curve.evaluate(distance)
    }

    fn shape_distance(&self, source: Position3D, listener: Position3D) -> f64 {
        match self.shape {
            AttenuationShape::Sphere => source.distance_to(&listener) as f64,
            AttenuationShape::Cone { forward, half_angle_deg } => {
                let to_listener = Position3D::new(
                    listener.x - source.x,
                    listener.y - source.y,
                    listener.z - source.z,
                );
                let dist = to_listener.magnitude() as f64;
                if dist < f64::EPSILON {
                    return 0.0;
                }
                let cos_angle = (to_listener.normalize().dot(&forward.normalize())) as f64;
                let half_angle_cos = half_angle_deg.to_radians().cos();
                if cos_angle >= half_angle_cos {
                    dist
                } else {
                    self.max_distance
                }
            }
            AttenuationShape::Box { half_extents } => {
                let dx = (listener.x - source.x).abs() - half_extents.x;
                let dy = (listener.y - source.y).abs() - half_extents.y;
                let dz = (listener.z - source.z).abs() - half_extents.z;
                dx.max(dy).max(dz).max(0.0) as f64
            }
            AttenuationShape::Capsule { axis, half_length } => {
                let axis = axis.normalize();
                let to_listener = Position3D::new(
                    listener.x - source.x,
                    listener.y - source.y,
                    listener.z - source.z,
                );
                let projection = (to_listener.dot(&axis) as f64).clamp(-half_length, half_length);
                let closest = Position3D::new(
                    source.x + axis.x * projection as f32,
                    source.y + axis.y * projection as f32,
                    source.z + axis.z * projection as f32,
                );
                closest.distance_to(&listener) as f64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use am_event::FaderCurve;

    fn falloff(max_distance: f64) -> Attenuation {
        Attenuation::new(
            AttenuationId::new(1),
            max_distance,
            Curve::single((0.0, 1.0), (max_distance, 0.0), FaderCurve::LINEAR),
            AttenuationShape::Sphere,
        )
    }

    #[test]
    fn max_distance_returns_exactly_the_curve_value_there() {
        let att = falloff(10.0);
        let listener = Position3D::new(10.0, 0.0, 0.0);
        assert_eq!(att.gain(Position3D::origin(), listener), 0.0);
    }

    #[test]
    fn beyond_max_distance_clamps_to_the_curve_endpoint() {
        let att = falloff(10.0);
        let listener = Position3D::new(50.0, 0.0, 0.0);
        assert_eq!(att.gain(Position3D::origin(), listener), 0.0);
    }

    #[test]
    fn sphere_gain_at_zero_distance_is_full() {
        let att = falloff(10.0);
        assert_eq!(att.gain(Position3D::origin(), Position3D::origin()), 1.0);
    }

    #[test]
    fn cone_outside_half_angle_is_fully_attenuated() {
        let att = Attenuation::new(
            AttenuationId::new(1),
            10.0,
            Curve::single((0.0, 1.0), (10.0, 0.0), FaderCurve::LINEAR),
            AttenuationShape::Cone {
                forward: Position3D::new(1.0, 0.0, 0.0),
                half_angle_deg: 30.0,
            },
        );
        let behind = Position3D::new(-5.0, 0.0, 0.0);
        assert_eq!(att.gain(Position3D::origin(), behind), 0.0);
    }
}
