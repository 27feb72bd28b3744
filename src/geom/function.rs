//! The contracts a surface definition and an error policy must satisfy to be
//! tessellated.
//!
//! A [`TessFunction`] describes *what* surface to mesh: it lays down a coarse
//! basis triangulation, and it can compute the true surface point "between"
//! two existing surface vertices. An [`ErrorBound`] describes *how closely*
//! the mesh must follow that surface at any position.

use super::core::{Point3, Vec3};
use super::tessel::Basis;
use super::tessellation::TessellationError;

/// A point on the surface together with the Function's parameters for it.
///
/// `index` stays `None` until the tessellator assigns output indices after
/// structuring has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3,
    pub params: [f64; 2],
    pub index: Option<u32>,
}

impl Vertex {
    #[must_use]
    pub const fn new(position: Point3, params: [f64; 2]) -> Self {
        Self {
            position,
            params,
            index: None,
        }
    }
}

/// A surface definition the adaptive tessellator can refine.
///
/// Implementors must be deterministic: the same parameters always map to the
/// same position, so that shared edges are refined identically from either
/// side.
pub trait TessFunction {
    /// Populates the initial coarse triangulation.
    fn define_basis(&self, basis: &mut Basis<'_>) -> Result<(), TessellationError>;

    /// Exact point on the surface for the given parameters.
    fn surface_pos(&self, params: [f64; 2]) -> Point3;

    /// Parameters of the point "between" two surface vertices.
    ///
    /// The default averages the parameters; Functions with seams or poles
    /// override this.
    #[must_use]
    fn midpoint_params(&self, a: &Vertex, b: &Vertex) -> [f64; 2] {
        [
            (a.params[0] + b.params[0]) * 0.5,
            (a.params[1] + b.params[1]) * 0.5,
        ]
    }

    /// The surface vertex between `a` and `b`.
    #[must_use]
    fn midpoint(&self, a: &Vertex, b: &Vertex) -> Vertex {
        let params = self.midpoint_params(a, b);
        Vertex::new(self.surface_pos(params), params)
    }

    /// Whether [`vertex_normal`](Self::vertex_normal) returns analytic normals.
    #[must_use]
    fn has_vertex_normals(&self) -> bool {
        false
    }

    /// Analytic surface normal at a vertex, if supported.
    #[must_use]
    fn vertex_normal(&self, _vertex: &Vertex) -> Option<Vec3> {
        None
    }

    /// Chord length below which an edge needs no further sampling for the
    /// given error bound.
    ///
    /// The default of zero samples every edge down to the error scale before
    /// simplifying. Functions that know their curvature can return a larger
    /// value to stop early; `f64::INFINITY` trusts the midpoint correction
    /// alone.
    #[must_use]
    fn sample_resolution(&self, _max_error: f64) -> f64 {
        0.0
    }
}

/// Maximum permissible deviation between the mesh and the true surface.
pub trait ErrorBound {
    fn max_error(&self, position: Point3) -> f64;
}

/// A single global error bound.
impl ErrorBound for f64 {
    fn max_error(&self, _position: Point3) -> f64 {
        *self
    }
}

/// A position-dependent error bound backed by a closure.
///
/// ```ignore
/// // Finer near the origin, coarser further away.
/// let bound = PositionalError(|p: Point3| 0.001 + 0.01 * p.to_vec3().length());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PositionalError<F>(pub F);

impl<F> ErrorBound for PositionalError<F>
where
    F: Fn(Point3) -> f64,
{
    fn max_error(&self, position: Point3) -> f64 {
        (self.0)(position)
    }
}

impl<E: ErrorBound + ?Sized> ErrorBound for &E {
    fn max_error(&self, position: Point3) -> f64 {
        (**self).max_error(position)
    }
}

impl<E: ErrorBound + ?Sized> ErrorBound for Box<E> {
    fn max_error(&self, position: Point3) -> f64 {
        (**self).max_error(position)
    }
}
