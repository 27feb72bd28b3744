use std::collections::HashSet;

use slotmap::SlotMap;

use super::registry::VertexKey;
use crate::geom::core::{Point3, Tolerance};
use crate::geom::function::Vertex;
use crate::geom::tessellation::TessellationError;

/// Builder handed to
/// [`TessFunction::define_basis`](crate::geom::function::TessFunction::define_basis).
///
/// Triangles must be consistently oriented: every directed edge may be used
/// by at most one triangle, and a shared boundary is traversed in opposite
/// directions by its two triangles.
pub struct Basis<'a> {
    vertices: &'a mut SlotMap<VertexKey, Vertex>,
    triangles: Vec<[VertexKey; 3]>,
    directed: HashSet<(VertexKey, VertexKey)>,
}

impl<'a> Basis<'a> {
    pub(crate) fn new(vertices: &'a mut SlotMap<VertexKey, Vertex>) -> Self {
        Self {
            vertices,
            triangles: Vec::new(),
            directed: HashSet::new(),
        }
    }

    /// Registers a surface vertex and returns its key.
    pub fn add_vertex(
        &mut self,
        position: Point3,
        params: [f64; 2],
    ) -> Result<VertexKey, TessellationError> {
        if !position.is_finite() {
            return Err(TessellationError::NonFinitePosition {
                u: params[0],
                v: params[1],
            });
        }
        Ok(self.vertices.insert(Vertex::new(position, params)))
    }

    /// A vertex previously returned by [`add_vertex`](Self::add_vertex).
    #[must_use]
    pub fn vertex(&self, key: VertexKey) -> Option<&Vertex> {
        self.vertices.get(key)
    }

    /// Records the triangle `a -> b -> c`.
    pub fn add_triangle(
        &mut self,
        a: VertexKey,
        b: VertexKey,
        c: VertexKey,
    ) -> Result<(), TessellationError> {
        let pa = self.position(a)?;
        let pb = self.position(b)?;
        let pc = self.position(c)?;

        if a == b || b == c || c == a {
            return Err(TessellationError::MalformedBasis(
                "triangle repeats a vertex".to_string(),
            ));
        }
        let tol = Tolerance::ZERO_LENGTH;
        if tol.approx_eq_point3(pa, pb)
            || tol.approx_eq_point3(pb, pc)
            || tol.approx_eq_point3(pc, pa)
        {
            return Err(TessellationError::MalformedBasis(
                "triangle has coincident vertices".to_string(),
            ));
        }

        let edges = [(a, b), (b, c), (c, a)];
        if edges.iter().any(|edge| self.directed.contains(edge)) {
            return Err(TessellationError::MalformedBasis(
                "directed edge used by more than one triangle; check triangle orientation"
                    .to_string(),
            ));
        }
        self.directed.extend(edges);
        self.triangles.push([a, b, c]);
        Ok(())
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub(crate) fn into_triangles(self) -> Vec<[VertexKey; 3]> {
        self.triangles
    }

    fn position(&self, key: VertexKey) -> Result<Point3, TessellationError> {
        self.vertices
            .get(key)
            .map(|vertex| vertex.position)
            .ok_or_else(|| {
                TessellationError::MalformedBasis(
                    "triangle refers to an unknown vertex".to_string(),
                )
            })
    }
}
