//! Tessellation of parametric [`Surface`]s.
//!
//! [`ParametricFunction`] adapts any `Surface` to the [`TessFunction`]
//! contract. The basis is a regular grid over the parameter domain:
//!
//! - closed directions wrap, so the seam column (or row) reuses the vertices
//!   of the first one and the mesh stays watertight across it;
//! - pole rows collapse to a single vertex, and the quads touching them
//!   degenerate to one triangle each.
//!
//! Midpoints are taken the short way around a seam, and a pole vertex
//! borrows the `u` of the other endpoint so that edges leaving a pole follow
//! a meridian.

use super::core::{Point3, Tolerance, Vec3};
use super::function::{TessFunction, Vertex};
use super::surface::{Surface, wrap_param};
use super::tessel::{Basis, VertexKey};
use super::tessellation::TessellationError;

const CURVATURE_SAMPLES: usize = 32;

#[derive(Debug, Clone)]
pub struct ParametricFunction<S> {
    surface: S,
    u_count: usize,
    v_count: usize,
    resolution_scale: f64,
    analytic_normals: bool,
    max_curvature: f64,
}

impl<S: Surface> ParametricFunction<S> {
    /// Wraps `surface` with a default basis grid.
    ///
    /// Closed directions get enough columns to keep the basis from folding
    /// onto itself; surfaces with poles get an extra row so no triangle
    /// touches both poles.
    #[must_use]
    pub fn new(surface: S) -> Self {
        let u_count = if surface.is_u_closed() { 6 } else { 2 };
        let v_count = if surface.is_v_closed() {
            4
        } else if surface.pole_v_start() || surface.pole_v_end() {
            3
        } else {
            2
        };
        let max_curvature = surface.max_curvature_estimate(CURVATURE_SAMPLES);

        Self {
            surface,
            u_count,
            v_count,
            resolution_scale: 1.0,
            analytic_normals: true,
            max_curvature,
        }
    }

    /// Overrides the basis grid size.
    ///
    /// Counts are raised to the smallest grid that still forms a valid basis:
    /// three intervals along a closed direction, two between two poles, one
    /// otherwise.
    #[must_use]
    pub fn with_grid(mut self, u_count: usize, v_count: usize) -> Self {
        self.u_count = u_count.max(self.min_u_count());
        self.v_count = v_count.max(self.min_v_count());
        self
    }

    /// Scales the chord length sampling stops at; smaller values sample more
    /// densely before simplifying.
    #[must_use]
    pub fn with_resolution_scale(mut self, scale: f64) -> Self {
        self.resolution_scale = scale;
        self
    }

    /// Whether to emit the surface's own normals.
    #[must_use]
    pub fn with_analytic_normals(mut self, enabled: bool) -> Self {
        self.analytic_normals = enabled;
        self
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[must_use]
    pub fn grid(&self) -> (usize, usize) {
        (self.u_count, self.v_count)
    }

    /// Largest normal curvature found when the function was created.
    #[must_use]
    pub fn max_curvature(&self) -> f64 {
        self.max_curvature
    }

    fn min_u_count(&self) -> usize {
        if self.surface.is_u_closed() { 3 } else { 1 }
    }

    fn min_v_count(&self) -> usize {
        if self.surface.is_v_closed() {
            3
        } else if self.surface.pole_v_start() && self.surface.pole_v_end() {
            2
        } else {
            1
        }
    }

    fn pole_start(&self) -> bool {
        !self.surface.is_v_closed() && self.surface.pole_v_start()
    }

    fn pole_end(&self) -> bool {
        !self.surface.is_v_closed() && self.surface.pole_v_end()
    }

    #[allow(clippy::float_cmp)]
    fn is_pole(&self, vertex: &Vertex) -> bool {
        let (v0, v1) = self.surface.domain_v();
        (self.pole_start() && vertex.params[1] == v0) || (self.pole_end() && vertex.params[1] == v1)
    }
}

/// Midpoint of two parameters, going the short way across the seam of a
/// closed direction.
fn wrapped_mid(a: f64, b: f64, closed: bool, (start, end): (f64, f64)) -> f64 {
    if !closed {
        return (a + b) * 0.5;
    }
    let span = end - start;
    let mut b = b;
    if b - a > span * 0.5 {
        b -= span;
    } else if a - b > span * 0.5 {
        b += span;
    }
    wrap_param((a + b) * 0.5, start, end)
}

#[allow(clippy::cast_precision_loss)]
fn grid_param((start, end): (f64, f64), index: usize, count: usize) -> f64 {
    start + (end - start) * index as f64 / count as f64
}

impl<S: Surface> TessFunction for ParametricFunction<S> {
    fn define_basis(&self, basis: &mut Basis<'_>) -> Result<(), TessellationError> {
        let u_closed = self.surface.is_u_closed();
        let v_closed = self.surface.is_v_closed();
        let (pole_start, pole_end) = (self.pole_start(), self.pole_end());
        let domain_u = self.surface.domain_u();
        let domain_v = self.surface.domain_v();

        let columns = if u_closed { self.u_count } else { self.u_count + 1 };
        let rows = if v_closed { self.v_count } else { self.v_count + 1 };

        // rows[j][i]; a pole row holds the same key in every column.
        let mut grid: Vec<Vec<VertexKey>> = Vec::with_capacity(rows);
        for j in 0..rows {
            let v = grid_param(domain_v, j, self.v_count);
            let pole = (j == 0 && pole_start) || (j == rows - 1 && pole_end);
            if pole {
                let params = [domain_u.0, v];
                let key = basis.add_vertex(self.surface_pos(params), params)?;
                grid.push(vec![key; columns]);
                continue;
            }
            let mut row = Vec::with_capacity(columns);
            for i in 0..columns {
                let params = [grid_param(domain_u, i, self.u_count), v];
                row.push(basis.add_vertex(self.surface_pos(params), params)?);
            }
            grid.push(row);
        }

        for j in 0..self.v_count {
            let j1 = (j + 1) % rows;
            for i in 0..self.u_count {
                let i1 = (i + 1) % columns;
                let a = grid[j][i];
                let b = grid[j][i1];
                let c = grid[j1][i1];
                let d = grid[j1][i];
                if a == b {
                    basis.add_triangle(a, c, d)?;
                } else if c == d {
                    basis.add_triangle(a, b, c)?;
                } else {
                    basis.add_triangle(a, b, c)?;
                    basis.add_triangle(a, c, d)?;
                }
            }
        }
        Ok(())
    }

    fn surface_pos(&self, params: [f64; 2]) -> Point3 {
        self.surface.point_at(params[0], params[1])
    }

    fn midpoint_params(&self, a: &Vertex, b: &Vertex) -> [f64; 2] {
        let v = wrapped_mid(
            a.params[1],
            b.params[1],
            self.surface.is_v_closed(),
            self.surface.domain_v(),
        );
        let u = match (self.is_pole(a), self.is_pole(b)) {
            (true, false) => b.params[0],
            (false, true) => a.params[0],
            _ => wrapped_mid(
                a.params[0],
                b.params[0],
                self.surface.is_u_closed(),
                self.surface.domain_u(),
            ),
        };
        [u, v]
    }

    fn has_vertex_normals(&self) -> bool {
        self.analytic_normals
    }

    fn vertex_normal(&self, vertex: &Vertex) -> Option<Vec3> {
        if !self.analytic_normals {
            return None;
        }
        let [u, v] = vertex.params;
        self.surface.normal_at(u, v).or_else(|| {
            // Collapsed rows have no normal of their own; step inwards.
            let (v0, v1) = self.surface.domain_v();
            let h = Tolerance::DERIVATIVE.relative_to(v1 - v0);
            let inner = if v - v0 < v1 - v { v + h } else { v - h };
            self.surface.normal_at(u, inner)
        })
    }

    /// Chord length whose sagitta on a circle of the surface's largest
    /// curvature equals `max_error`.
    fn sample_resolution(&self, max_error: f64) -> f64 {
        let k = self.max_curvature;
        if !k.is_finite() || k <= 0.0 {
            return f64::INFINITY;
        }
        self.resolution_scale * 2.0 * (2.0 * max_error / k).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::surface::{PlaneSurface, SincSurface, SphereSurface, TorusSurface};

    fn vertex(u: f64, v: f64) -> Vertex {
        Vertex::new(Point3::ORIGIN, [u, v])
    }

    #[test]
    fn default_grids_follow_topology() {
        let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
        assert_eq!(sphere.grid(), (6, 3));
        let torus = ParametricFunction::new(TorusSurface::new(Point3::ORIGIN, 2.0, 0.5).unwrap());
        assert_eq!(torus.grid(), (6, 4));
        let plane = ParametricFunction::new(PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y));
        assert_eq!(plane.grid(), (2, 2));
    }

    #[test]
    fn grid_is_clamped_to_valid_minimum() {
        let torus = ParametricFunction::new(TorusSurface::new(Point3::ORIGIN, 2.0, 0.5).unwrap())
            .with_grid(1, 0);
        assert_eq!(torus.grid(), (3, 3));
        let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap())
            .with_grid(0, 1);
        assert_eq!(sphere.grid(), (3, 2));
    }

    #[test]
    fn midpoint_crosses_seam_the_short_way() {
        let torus = ParametricFunction::new(TorusSurface::new(Point3::ORIGIN, 2.0, 0.5).unwrap());
        let mid = torus.midpoint_params(&vertex(5.0 / 6.0, 0.0), &vertex(0.0, 0.0));
        assert!((mid[0] - 11.0 / 12.0).abs() < 1e-12, "{mid:?}");
        let mid = torus.midpoint_params(&vertex(0.0, 0.75), &vertex(0.25, 0.0));
        assert!((mid[0] - 0.125).abs() < 1e-12);
        assert!((mid[1] - 0.875).abs() < 1e-12, "{mid:?}");
    }

    #[test]
    fn pole_takes_other_endpoint_u() {
        let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
        let mid = sphere.midpoint_params(&vertex(0.0, 0.0), &vertex(0.5, 1.0 / 3.0));
        assert!((mid[0] - 0.5).abs() < 1e-12);
        assert!((mid[1] - 1.0 / 6.0).abs() < 1e-12);
        let mid = sphere.midpoint_params(&vertex(0.4, 2.0 / 3.0), &vertex(0.0, 1.0));
        assert!((mid[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn open_surface_averages_params() {
        let sinc =
            ParametricFunction::new(SincSurface::new(Point3::ORIGIN, 2.0, 1.0, 3.0).unwrap());
        let mid = sinc.midpoint_params(&vertex(0.0, 0.0), &vertex(1.0, 0.5));
        assert_eq!(mid, [0.5, 0.25]);
    }

    #[test]
    fn resolution_tracks_curvature() {
        let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 2.0).unwrap());
        let k = sphere.max_curvature();
        let expected = 2.0 * (2.0 * 0.01 / k).sqrt();
        assert!((sphere.sample_resolution(0.01) - expected).abs() < 1e-12);

        let finer = sphere.clone().with_resolution_scale(0.5);
        assert!((finer.sample_resolution(0.01) - expected * 0.5).abs() < 1e-12);

        let plane = ParametricFunction::new(PlaneSurface::new(Point3::ORIGIN, Vec3::X, Vec3::Y));
        assert!(plane.sample_resolution(0.01).is_infinite());
    }

    #[test]
    fn analytic_normals_can_be_disabled() {
        let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
        let v = Vertex::new(sphere.surface_pos([0.25, 0.5]), [0.25, 0.5]);
        let n = sphere.vertex_normal(&v).unwrap();
        assert!((n.y - 1.0).abs() < 1e-12);

        let plain = sphere.with_analytic_normals(false);
        assert!(!plain.has_vertex_normals());
        assert!(plain.vertex_normal(&v).is_none());
    }
}
