//! Root and derived edges.
//!
//! A root edge is sampled once and owns the resulting tree. Every other view
//! of the same geometry (the reversed edge, the halves either side of the
//! midpoint) is a derived edge that points into the root's trees, so both
//! cells sharing a boundary see the very same midpoint vertices.

use log::trace;

use super::Tessellator;
use super::registry::{
    Edge, EdgeKey, EdgeKind, ParentSlots, Registries, Side, Subdiv, SubdivKey, VertexKey,
};
use super::subdiv;
use crate::geom::core::Tolerance;
use crate::geom::function::{ErrorBound, TessFunction};
use crate::geom::tessellation::TessellationError;

impl<F, E> Tessellator<'_, F, E>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    /// Samples, simplifies and registers a new edge `v1 -> v2`.
    ///
    /// The edge records the error of its tree as sampled, before any leaves
    /// were simplified away; that is what split hypotheses are ranked by.
    pub(crate) fn add_root_edge(
        &mut self,
        v1: VertexKey,
        v2: VertexKey,
    ) -> Result<EdgeKey, TessellationError> {
        let (fwd, error) = self.sample_span(v1, v2, 0)?;
        let rev = subdiv::reverse(&mut self.reg, fwd)?;

        self.stats.root_edges += 1;
        Ok(self.reg.add_edge(Edge {
            beg: v1,
            end: v2,
            fwd,
            rev,
            error,
            kind: EdgeKind::Root,
            parent: None,
        }))
    }

    /// Puts a midpoint on a simple edge and samples both halves afresh.
    ///
    /// The new trees go to the edge and to the parent slots it was cut from.
    /// Returns them with their error so the caller can hand the mirrored
    /// pair to the opposite edge.
    pub(crate) fn bisect_simple_edge(
        &mut self,
        key: EdgeKey,
    ) -> Result<(SubdivKey, SubdivKey, f64), TessellationError> {
        let edge = self.reg.edge(key)?;
        let a = self.reg.vertex(edge.beg)?;
        let b = self.reg.vertex(edge.end)?;
        let mid = self.function.midpoint(&a, &b);
        self.stats.surface_evaluations += 1;
        if !mid.position.is_finite() {
            return Err(TessellationError::NonFinitePosition {
                u: mid.params[0],
                v: mid.params[1],
            });
        }

        let correction = mid.position.distance_to(a.position.midpoint(b.position));
        let mid_key = self.reg.add_vertex(mid);
        let (before, before_error) = self.sample_span(edge.beg, mid_key, 1)?;
        let (after, after_error) = self.sample_span(mid_key, edge.end, 1)?;
        let error = correction.max(before_error).max(after_error);

        let fwd = self.reg.add_subdiv(Subdiv {
            mid: mid_key,
            correction,
            before,
            after,
            error,
        });
        let rev = subdiv::reverse(&mut self.reg, Some(fwd))?
            .ok_or(TessellationError::Internal("reversed tree is empty"))?;
        self.reg.attach_trees(key, fwd, rev, error)?;

        self.stats.forced_bisections += 1;
        trace!("bisected simple edge: correction {correction:.6}, error {error:.6}");
        Ok((fwd, rev, error))
    }

    /// Sampled and simplified tree of `v1 -> v2`, with its error as sampled.
    fn sample_span(
        &mut self,
        v1: VertexKey,
        v2: VertexKey,
        depth: usize,
    ) -> Result<(Option<SubdivKey>, f64), TessellationError> {
        let a = self.reg.vertex(v1)?;
        let b = self.reg.vertex(v2)?;
        let sep = a.position.distance_to(b.position);
        if sep <= Tolerance::ZERO_LENGTH.eps {
            return Err(TessellationError::DegenerateCell(format!(
                "zero-length edge between parameters {:?} and {:?}",
                a.params, b.params
            )));
        }

        let max_error = self.max_error_at(a.position.midpoint(b.position))?;
        let resolution = self.function.sample_resolution(max_error);
        let sampled = self.sample(v1, v2, sep, resolution, depth)?;
        let error = self.reg.tree_error(sampled)?;
        let tree = subdiv::simplify(&mut self.reg, self.error_bound, sampled)?;
        trace!("span sampled: length {sep:.6}, error {error:.6}");
        Ok((tree, error))
    }
}

impl Registries {
    /// The same edge traversed the other way.
    pub(crate) fn add_reverse_edge(&mut self, key: EdgeKey) -> Result<EdgeKey, TessellationError> {
        let edge = self.edge(key)?;
        Ok(self.add_edge(Edge {
            beg: edge.end,
            end: edge.beg,
            fwd: edge.rev,
            rev: edge.fwd,
            error: edge.error,
            kind: EdgeKind::Derived,
            parent: edge.parent.map(ParentSlots::reversed),
        }))
    }

    /// The half of a non-simple edge from its start to its midpoint.
    pub(crate) fn add_edge_before_midpoint(
        &mut self,
        key: EdgeKey,
    ) -> Result<EdgeKey, TessellationError> {
        let edge = self.edge(key)?;
        let (fwd, rev, parent) = self.split_trees(&edge, Side::Before)?;
        let half = Edge {
            beg: edge.beg,
            end: fwd.mid,
            fwd: fwd.before,
            rev: rev.after,
            error: self.tree_error(fwd.before)?,
            kind: EdgeKind::Derived,
            parent: Some(parent),
        };
        Ok(self.add_edge(half))
    }

    /// The half of a non-simple edge from its midpoint to its end.
    pub(crate) fn add_edge_after_midpoint(
        &mut self,
        key: EdgeKey,
    ) -> Result<EdgeKey, TessellationError> {
        let edge = self.edge(key)?;
        let (fwd, rev, parent) = self.split_trees(&edge, Side::After)?;
        let half = Edge {
            beg: fwd.mid,
            end: edge.end,
            fwd: fwd.after,
            rev: rev.before,
            error: self.tree_error(fwd.after)?,
            kind: EdgeKind::Derived,
            parent: Some(parent),
        };
        Ok(self.add_edge(half))
    }

    /// Discards a root edge that ended up unused, together with everything
    /// sampled for it. Only the forward tree owns vertices.
    pub(crate) fn remove_root_edge(&mut self, key: EdgeKey) -> Result<(), TessellationError> {
        let edge = self.edge(key)?;
        if edge.kind != EdgeKind::Root {
            return Err(TessellationError::Internal("only root edges can be removed"));
        }
        subdiv::prune(self, edge.fwd, true)?;
        subdiv::prune(self, edge.rev, false)?;
        self.retire_edge(key);
        Ok(())
    }

    /// Midpoint vertex of a non-simple edge.
    pub(crate) fn edge_midpoint(&self, key: EdgeKey) -> Result<VertexKey, TessellationError> {
        let edge = self.edge(key)?;
        let fwd = edge
            .fwd
            .ok_or(TessellationError::Internal("simple edge has no midpoint"))?;
        Ok(self.subdiv(fwd)?.mid)
    }

    fn split_trees(
        &self,
        edge: &Edge,
        side: Side,
    ) -> Result<(Subdiv, Subdiv, ParentSlots), TessellationError> {
        match (edge.fwd, edge.rev) {
            (Some(fwd), Some(rev)) => Ok((
                self.subdiv(fwd)?,
                self.subdiv(rev)?,
                ParentSlots { fwd, rev, side },
            )),
            _ => Err(TessellationError::Internal("cannot split a simple edge")),
        }
    }
}
