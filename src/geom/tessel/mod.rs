//! Adaptive tessellation engine.
//!
//! A run goes through four phases, each a method on [`Tessellator`]:
//!
//! 1. [`define_basis`](Tessellator::define_basis): the Function lays down a
//!    coarse triangulation; every distinct edge is sampled once into a root
//!    edge and the opposite direction becomes a derived reverse edge.
//! 2. [`structure`](Tessellator::structure): cells are split along the
//!    midpoints of their non-simple edges until every edge is simple.
//! 3. [`assign_indices`](Tessellator::assign_indices): surviving vertices are
//!    numbered in registry order.
//! 4. [`emit`](Tessellator::emit): vertices, optional normals and triangles
//!    are handed to a [`MeshSink`].
//!
//! All state lives in the `Tessellator`, so independent runs share nothing.

mod basis;
mod cell;
mod edge;
mod registry;
mod subdiv;

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

pub use basis::Basis;
pub use registry::VertexKey;

use cell::Cell;
use registry::{EdgeKey, Registries};

use crate::geom::function::{ErrorBound, TessFunction};
use crate::geom::mesh::MeshSink;
use crate::geom::tessellation::{TessellationError, TessellationOptions};

/// Counters collected over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TessellationStats {
    pub basis_triangles: usize,
    /// Root edges sampled, including candidates later discarded.
    pub root_edges: usize,
    /// Candidate root edges that lost to a better split.
    pub discarded_edges: usize,
    pub splits: usize,
    pub cells: usize,
    pub vertices: usize,
    /// Surface midpoint evaluations made while sampling.
    pub surface_evaluations: usize,
    /// Simple edges given a midpoint because they were the longest edge of a
    /// cell that still had to be split.
    pub forced_bisections: usize,
    /// Deepest subdivision level reached by any sampled tree.
    pub deepest_sample: usize,
    /// Vertices emitted without any triangle referring to them.
    pub unreferenced_vertices: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Basis,
    Structured,
    Indexed,
}

/// State of one tessellation run.
pub struct Tessellator<'a, F: ?Sized, E: ?Sized> {
    function: &'a F,
    error_bound: &'a E,
    options: TessellationOptions,
    reg: Registries,
    cells: Vec<Cell>,
    /// Cell holding each directed edge, by end points; kept while structuring.
    owners: HashMap<(VertexKey, VertexKey), usize>,
    stats: TessellationStats,
    phase: Phase,
}

impl<'a, F, E> Tessellator<'a, F, E>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    pub fn new(
        function: &'a F,
        error_bound: &'a E,
        options: TessellationOptions,
    ) -> Result<Self, TessellationError> {
        options.validate()?;
        Ok(Self {
            function,
            error_bound,
            options,
            reg: Registries::default(),
            cells: Vec::new(),
            owners: HashMap::new(),
            stats: TessellationStats::default(),
            phase: Phase::Created,
        })
    }

    #[must_use]
    pub fn stats(&self) -> TessellationStats {
        self.stats
    }

    #[must_use]
    pub fn options(&self) -> &TessellationOptions {
        &self.options
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.reg.vertices.len()
    }

    /// Runs every phase up to, but excluding, emission.
    pub fn run(&mut self) -> Result<(), TessellationError> {
        self.define_basis()?;
        self.structure()?;
        self.assign_indices()
    }

    /// Asks the Function for its basis and turns it into cells.
    pub fn define_basis(&mut self) -> Result<(), TessellationError> {
        self.expect_phase(Phase::Created, "basis already defined")?;

        let function = self.function;
        let mut basis = Basis::new(&mut self.reg.vertices);
        function.define_basis(&mut basis)?;
        let triangles = basis.into_triangles();
        if triangles.is_empty() {
            return Err(TessellationError::EmptyBasis);
        }

        let mut lookup = HashMap::with_capacity(triangles.len() * 3);
        for [a, b, c] in &triangles {
            let edges = [
                self.get_edge(&mut lookup, *a, *b)?,
                self.get_edge(&mut lookup, *b, *c)?,
                self.get_edge(&mut lookup, *c, *a)?,
            ];
            self.cells.push(Cell { edges });
        }

        let open_edges = lookup
            .keys()
            .filter(|(a, b)| !lookup.contains_key(&(*b, *a)))
            .count();
        if open_edges > 0 {
            warn!("basis has {open_edges} boundary edges; the surface is open");
        }

        self.stats.basis_triangles = triangles.len();
        self.phase = Phase::Basis;
        debug!(
            "basis: {} triangles, {} vertices, {} root edges",
            triangles.len(),
            self.reg.vertices.len(),
            self.stats.root_edges
        );
        Ok(())
    }

    /// Edge `a -> b` of the basis, reusing the opposite direction when it
    /// already exists.
    fn get_edge(
        &mut self,
        lookup: &mut HashMap<(VertexKey, VertexKey), EdgeKey>,
        a: VertexKey,
        b: VertexKey,
    ) -> Result<EdgeKey, TessellationError> {
        if let Some(&key) = lookup.get(&(a, b)) {
            return Ok(key);
        }
        let key = match lookup.get(&(b, a)) {
            Some(&opposite) => self.reg.add_reverse_edge(opposite)?,
            None => self.add_root_edge(a, b)?,
        };
        lookup.insert((a, b), key);
        Ok(key)
    }

    /// Numbers the surviving vertices in registry order.
    pub fn assign_indices(&mut self) -> Result<(), TessellationError> {
        self.expect_phase(Phase::Structured, "structure the cells before indexing")?;

        for (index, vertex) in self.reg.vertices.values_mut().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| TessellationError::Internal("vertex count exceeds u32 indices"))?;
            vertex.index = Some(index);
        }
        self.stats.vertices = self.reg.vertices.len();
        self.phase = Phase::Indexed;
        Ok(())
    }

    /// Hands the finished mesh to `sink`.
    ///
    /// Vertices are emitted in index order, each followed by its normal when
    /// the Function supplies one, then every cell as a triangle.
    pub fn emit<S: MeshSink>(&mut self, sink: &mut S) -> Result<(), TessellationError> {
        self.expect_phase(Phase::Indexed, "assign indices before emitting")?;

        let normals = self.function.has_vertex_normals();
        let mut handles = SecondaryMap::with_capacity(self.reg.vertices.len());
        for (key, vertex) in &self.reg.vertices {
            let handle = sink.add_vertex(vertex.position);
            sink.add_vertex_params(handle, vertex.params);
            if normals {
                if let Some(normal) = self.function.vertex_normal(vertex) {
                    sink.add_vertex_normal(handle, normal);
                }
            }
            handles.insert(key, handle);
        }

        let mut referenced = SecondaryMap::with_capacity(self.reg.vertices.len());
        for cell in &self.cells {
            let corners = self.cell_corners(cell)?;
            let [a, b, c] = corners.map(|key| handles.get(key).copied());
            let (Some(a), Some(b), Some(c)) = (a, b, c) else {
                return Err(TessellationError::Internal("cell refers to a freed vertex"));
            };
            sink.add_triangle(a, b, c);
            for key in corners {
                referenced.insert(key, ());
            }
        }

        self.stats.unreferenced_vertices = self.reg.vertices.len() - referenced.len();
        if self.stats.unreferenced_vertices > 0 {
            debug!(
                "{} vertices are not used by any triangle",
                self.stats.unreferenced_vertices
            );
        }
        Ok(())
    }

    fn expect_phase(&self, phase: Phase, message: &'static str) -> Result<(), TessellationError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(TessellationError::Internal(message))
        }
    }
}

#[cfg(test)]
mod tests;
