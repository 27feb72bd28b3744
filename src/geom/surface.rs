use super::core::{Point3, Tolerance, Vec3};

pub(crate) fn wrap_param(value: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if !span.is_finite() || span == 0.0 {
        return start;
    }
    let mut t = (value - start) % span;
    if t < 0.0 {
        t += span;
    }
    start + t
}

fn orthogonal_unit_vector(reference: Vec3) -> Vec3 {
    let candidate = if reference.x.abs() < reference.y.abs() {
        Vec3::new(0.0, -reference.z, reference.y)
    } else {
        Vec3::new(-reference.z, 0.0, reference.x)
    };

    candidate
        .normalized()
        .unwrap_or_else(|| Vec3::new(1.0, 0.0, 0.0))
}

fn frame_axes_from_xaxis_normal(x_axis: Vec3, normal: Vec3) -> (Vec3, Vec3, Vec3) {
    let z = normal.normalized().unwrap_or_else(|| Vec3::new(0.0, 0.0, 1.0));
    let projected = x_axis.sub(z.mul_scalar(x_axis.dot(z)));
    let x = projected
        .normalized()
        .unwrap_or_else(|| orthogonal_unit_vector(z));
    let y = z.cross(x).normalized().unwrap_or_else(|| Vec3::new(0.0, 1.0, 0.0));
    (x, y, z)
}

/// Curvature of the circle through three points (0 for collinear points).
fn circumcurvature(a: Point3, b: Point3, c: Point3) -> f64 {
    let ab = b.sub_point(a);
    let ac = c.sub_point(a);
    let bc = c.sub_point(b);
    let denom = ab.length() * ac.length() * bc.length();
    if !denom.is_finite() || denom <= 0.0 {
        return 0.0;
    }
    2.0 * ab.cross(ac).length() / denom
}

/// Curvature of the curve through `before`, `p`, `after` in the direction
/// of `normal`, from central differences.
fn normal_curvature(before: Point3, p: Point3, after: Point3, normal: Vec3) -> f64 {
    let chord = after.sub_point(before).length_squared();
    if !chord.is_finite() || chord <= 0.0 {
        return 0.0;
    }
    let second = before
        .to_vec3()
        .add(after.to_vec3())
        .sub(p.to_vec3().mul_scalar(2.0));
    4.0 * second.dot(normal).abs() / chord
}

pub trait Surface {
    fn point_at(&self, u: f64, v: f64) -> Point3;

    #[must_use]
    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_u_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn is_v_closed(&self) -> bool {
        false
    }

    /// The whole `v = v_start` row maps to a single point.
    #[must_use]
    fn pole_v_start(&self) -> bool {
        false
    }

    /// The whole `v = v_end` row maps to a single point.
    #[must_use]
    fn pole_v_end(&self) -> bool {
        false
    }

    #[must_use]
    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();

        let u_span = u1 - u0;
        let v_span = v1 - v0;

        let u = if self.is_u_closed() {
            wrap_param(u, u0, u1)
        } else {
            u.clamp(u0, u1)
        };

        let v = if self.is_v_closed() {
            wrap_param(v, v0, v1)
        } else {
            v.clamp(v0, v1)
        };

        let mut du = Vec3::ZERO;
        let mut dv = Vec3::ZERO;

        if u_span.is_finite() && u_span != 0.0 {
            let h = Tolerance::DERIVATIVE.relative_to(u_span);
            if h.is_finite() && h != 0.0 {
                let ua = if self.is_u_closed() { u - h } else { (u - h).max(u0) };
                let ub = if self.is_u_closed() { u + h } else { (u + h).min(u1) };

                if ua != ub {
                    let pa = self.point_at(ua, v);
                    let pb = self.point_at(ub, v);
                    du = pb.sub_point(pa).mul_scalar(1.0 / (ub - ua));
                }
            }
        }

        if v_span.is_finite() && v_span != 0.0 {
            let h = Tolerance::DERIVATIVE.relative_to(v_span);
            if h.is_finite() && h != 0.0 {
                let va = if self.is_v_closed() { v - h } else { (v - h).max(v0) };
                let vb = if self.is_v_closed() { v + h } else { (v + h).min(v1) };

                if va != vb {
                    let pa = self.point_at(u, va);
                    let pb = self.point_at(u, vb);
                    dv = pb.sub_point(pa).mul_scalar(1.0 / (vb - va));
                }
            }
        }

        (du, dv)
    }

    #[must_use]
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(u, v);
        du.cross(dv).normalized()
    }

    /// Estimates the largest normal curvature along the iso-parameter lines.
    ///
    /// Samples an `n x n` interior grid and takes the second difference
    /// through each point and its neighbours along u and along v, projected
    /// onto the surface normal. Where no normal is defined the curvature of
    /// the circle through the three points is used instead.
    #[must_use]
    fn max_curvature_estimate(&self, samples: usize) -> f64 {
        let n = samples.max(4);
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let du = (u1 - u0) / n as f64;
        let dv = (v1 - v0) / n as f64;

        let mut max_curvature = 0.0_f64;
        for i in 1..n {
            let u = u0 + du * i as f64;
            for j in 1..n {
                let v = v0 + dv * j as f64;
                let p = self.point_at(u, v);
                let normal = self.normal_at(u, v);
                let neighbours = [
                    (self.point_at(u - du, v), self.point_at(u + du, v)),
                    (self.point_at(u, v - dv), self.point_at(u, v + dv)),
                ];
                for (before, after) in neighbours {
                    let k = match normal {
                        Some(normal) => normal_curvature(before, p, after, normal),
                        None => circumcurvature(before, p, after),
                    };
                    if k.is_finite() && k > max_curvature {
                        max_curvature = k;
                    }
                }
            }
        }

        max_curvature
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
}

impl PlaneSurface {
    #[must_use]
    pub const fn new(origin: Point3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
        }
    }
}

impl Surface for PlaneSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(u))
            .add_vec(self.v_axis.mul_scalar(v))
    }

    fn normal_at(&self, _u: f64, _v: f64) -> Option<Vec3> {
        self.u_axis.cross(self.v_axis).normalized()
    }

    fn max_curvature_estimate(&self, _samples: usize) -> f64 {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSurface {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub radius: f64,
}

impl SphereSurface {
    pub fn new(center: Point3, radius: f64) -> Result<Self, String> {
        Self::from_center_xaxis_normal(center, Vec3::X, Vec3::Z, radius)
    }

    pub fn from_center_xaxis_normal(
        center: Point3,
        x_axis: Vec3,
        normal: Vec3,
        radius: f64,
    ) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("sphere radius must be finite and > 0".to_string());
        }

        let (x_axis, y_axis, z_axis) = frame_axes_from_xaxis_normal(x_axis, normal);
        Ok(Self {
            center,
            x_axis,
            y_axis,
            z_axis,
            radius,
        })
    }
}

impl Surface for SphereSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let u = wrap_param(u, 0.0, 1.0);
        let v = v.clamp(0.0, 1.0);

        let theta = std::f64::consts::TAU * u;
        let phi = std::f64::consts::PI * (v - 0.5);

        let cos_phi = phi.cos();
        let sin_phi = phi.sin();

        let x = cos_phi * theta.cos();
        let y = cos_phi * theta.sin();
        let z = sin_phi;

        self.center.add_vec(
            self.x_axis
                .mul_scalar(x)
                .add(self.y_axis.mul_scalar(y))
                .add(self.z_axis.mul_scalar(z))
                .mul_scalar(self.radius),
        )
    }

    fn is_u_closed(&self) -> bool {
        true
    }

    fn pole_v_start(&self) -> bool {
        true
    }

    fn pole_v_end(&self) -> bool {
        true
    }

    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        self.point_at(u, v).sub_point(self.center).normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorusSurface {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl TorusSurface {
    pub fn new(center: Point3, major_radius: f64, minor_radius: f64) -> Result<Self, String> {
        Self::from_center_xaxis_normal(center, Vec3::X, Vec3::Z, major_radius, minor_radius)
    }

    pub fn from_center_xaxis_normal(
        center: Point3,
        x_axis: Vec3,
        normal: Vec3,
        major_radius: f64,
        minor_radius: f64,
    ) -> Result<Self, String> {
        if !major_radius.is_finite() || major_radius <= 0.0 {
            return Err("torus major radius must be finite and > 0".to_string());
        }
        if !minor_radius.is_finite() || minor_radius <= 0.0 {
            return Err("torus minor radius must be finite and > 0".to_string());
        }
        if minor_radius >= major_radius {
            return Err("torus minor radius must be smaller than the major radius".to_string());
        }

        let (x_axis, y_axis, z_axis) = frame_axes_from_xaxis_normal(x_axis, normal);
        Ok(Self {
            center,
            x_axis,
            y_axis,
            z_axis,
            major_radius,
            minor_radius,
        })
    }

    fn radial(&self, u: f64) -> Vec3 {
        let theta = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        self.x_axis
            .mul_scalar(theta.cos())
            .add(self.y_axis.mul_scalar(theta.sin()))
    }
}

impl Surface for TorusSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let phi = std::f64::consts::TAU * wrap_param(v, 0.0, 1.0);

        let radial = self.radial(u);
        let tube = radial.mul_scalar(self.major_radius + self.minor_radius * phi.cos());
        let vertical = self.z_axis.mul_scalar(self.minor_radius * phi.sin());
        self.center.add_vec(tube.add(vertical))
    }

    fn is_u_closed(&self) -> bool {
        true
    }

    fn is_v_closed(&self) -> bool {
        true
    }

    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let tube_center = self
            .center
            .add_vec(self.radial(u).mul_scalar(self.major_radius));
        self.point_at(u, v).sub_point(tube_center).normalized()
    }
}

/// Radially rippled height field `z = amplitude * sin(k r) / (k r)` over a
/// square of half-width `extent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SincSurface {
    pub center: Point3,
    pub extent: f64,
    pub amplitude: f64,
    pub frequency: f64,
}

impl SincSurface {
    pub fn new(
        center: Point3,
        extent: f64,
        amplitude: f64,
        frequency: f64,
    ) -> Result<Self, String> {
        if !extent.is_finite() || extent <= 0.0 {
            return Err("sinc extent must be finite and > 0".to_string());
        }
        if !amplitude.is_finite() {
            return Err("sinc amplitude must be finite".to_string());
        }
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err("sinc frequency must be finite and > 0".to_string());
        }
        Ok(Self {
            center,
            extent,
            amplitude,
            frequency,
        })
    }

    fn height(&self, x: f64, y: f64) -> f64 {
        let kr = self.frequency * (x * x + y * y).sqrt();
        if kr.abs() < 1e-8 {
            self.amplitude
        } else {
            self.amplitude * kr.sin() / kr
        }
    }
}

impl Surface for SincSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let x = (u.clamp(0.0, 1.0) * 2.0 - 1.0) * self.extent;
        let y = (v.clamp(0.0, 1.0) * 2.0 - 1.0) * self.extent;
        self.center.add_vec(Vec3::new(x, y, self.height(x, y)))
    }
}
