//! Sampling and maintenance of edge subdivision trees.

use super::Tessellator;
use super::registry::{Registries, Subdiv, SubdivKey, VertexKey};
use crate::geom::core::Point3;
use crate::geom::function::{ErrorBound, TessFunction};
use crate::geom::tessellation::TessellationError;

impl<F, E> Tessellator<'_, F, E>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    /// Validated error bound at `position`.
    pub(crate) fn max_error_at(&self, position: Point3) -> Result<f64, TessellationError> {
        let value = self.error_bound.max_error(position);
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(TessellationError::InvalidErrorBound { value })
        }
    }

    /// Builds the refinement tree of the edge `v1 -> v2`.
    ///
    /// `sep` is the separation between the end points at this level: the
    /// chord length at the root, halved per level. Returns `None` once the
    /// separation is within twice the local error bound, since no surface
    /// detail between the end points can then push the chord further than
    /// the bound. Children are only sampled where the midpoint correction
    /// exceeds the bound or the separation is still above `resolution`.
    pub(crate) fn sample(
        &mut self,
        v1: VertexKey,
        v2: VertexKey,
        sep: f64,
        resolution: f64,
        depth: usize,
    ) -> Result<Option<SubdivKey>, TessellationError> {
        let a = self.reg.vertex(v1)?;
        let b = self.reg.vertex(v2)?;
        let naive = a.position.midpoint(b.position);
        let max_error = self.max_error_at(naive)?;
        if sep <= 2.0 * max_error {
            return Ok(None);
        }
        if depth >= self.options.max_depth {
            return Err(TessellationError::RecursionLimit {
                max_depth: self.options.max_depth,
            });
        }

        let mid = self.function.midpoint(&a, &b);
        self.stats.surface_evaluations += 1;
        if !mid.position.is_finite() {
            return Err(TessellationError::NonFinitePosition {
                u: mid.params[0],
                v: mid.params[1],
            });
        }
        self.stats.deepest_sample = self.stats.deepest_sample.max(depth + 1);

        let correction = mid.position.distance_to(naive);
        let mid_key = self.reg.add_vertex(mid);

        let (before, after) = if correction > max_error || sep > resolution {
            let half = sep * 0.5;
            let before = self.sample(v1, mid_key, half, resolution, depth + 1)?;
            let after = self.sample(mid_key, v2, half, resolution, depth + 1)?;
            (before, after)
        } else {
            (None, None)
        };

        let error = correction
            .max(self.reg.tree_error(before)?)
            .max(self.reg.tree_error(after)?);
        Ok(Some(self.reg.add_subdiv(Subdiv {
            mid: mid_key,
            correction,
            before,
            after,
            error,
        })))
    }
}

/// Removes leaves whose correction is within the bound, bottom-up.
///
/// A node only collapses once both of its sub-trees have collapsed, so the
/// surviving tree never skips over a vertex that was needed. Collapsed nodes
/// and their midpoint vertices are returned to the pools.
pub(crate) fn simplify<E: ErrorBound + ?Sized>(
    reg: &mut Registries,
    error_bound: &E,
    tree: Option<SubdivKey>,
) -> Result<Option<SubdivKey>, TessellationError> {
    let Some(key) = tree else {
        return Ok(None);
    };
    let node = reg.subdiv(key)?;
    let before = simplify(reg, error_bound, node.before)?;
    let after = simplify(reg, error_bound, node.after)?;

    if before.is_none() && after.is_none() {
        let mid = reg.vertex(node.mid)?;
        if node.correction <= error_bound.max_error(mid.position) {
            reg.free_vertex(node.mid);
            reg.free_subdiv(key);
            return Ok(None);
        }
    }

    let slot = reg.subdiv_mut(key)?;
    slot.before = before;
    slot.after = after;
    Ok(Some(key))
}

/// Returns every node of `tree` to the pool, and its midpoint vertices too
/// when `free_vertices` is set.
pub(crate) fn prune(
    reg: &mut Registries,
    tree: Option<SubdivKey>,
    free_vertices: bool,
) -> Result<(), TessellationError> {
    let Some(key) = tree else {
        return Ok(());
    };
    let node = reg.subdiv(key)?;
    prune(reg, node.before, free_vertices)?;
    prune(reg, node.after, free_vertices)?;
    if free_vertices {
        reg.free_vertex(node.mid);
    }
    reg.free_subdiv(key);
    Ok(())
}

/// Mirror image of `tree`, describing the same edge traversed backwards.
///
/// The copy has fresh nodes but shares every midpoint vertex with the
/// original, which is left untouched.
pub(crate) fn reverse(
    reg: &mut Registries,
    tree: Option<SubdivKey>,
) -> Result<Option<SubdivKey>, TessellationError> {
    let Some(key) = tree else {
        return Ok(None);
    };
    let node = reg.subdiv(key)?;
    let before = reverse(reg, node.after)?;
    let after = reverse(reg, node.before)?;
    Ok(Some(reg.add_subdiv(Subdiv {
        mid: node.mid,
        correction: node.correction,
        before,
        after,
        error: node.error,
    })))
}

/// Largest depth of `tree`; 0 for a simple edge.
pub(crate) fn depth(reg: &Registries, tree: Option<SubdivKey>) -> Result<usize, TessellationError> {
    let Some(key) = tree else {
        return Ok(0);
    };
    let node = reg.subdiv(key)?;
    Ok(1 + depth(reg, node.before)?.max(depth(reg, node.after)?))
}

/// Midpoint vertices of `tree` in order along the edge.
pub(crate) fn vertices_in_order(
    reg: &Registries,
    tree: Option<SubdivKey>,
    out: &mut Vec<VertexKey>,
) -> Result<(), TessellationError> {
    let Some(key) = tree else {
        return Ok(());
    };
    let node = reg.subdiv(key)?;
    vertices_in_order(reg, node.before, out)?;
    out.push(node.mid);
    vertices_in_order(reg, node.after, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::function::Vertex;

    /// Balanced tree of the given depth over fresh vertices, with every
    /// correction set to `correction`.
    fn build(reg: &mut Registries, depth_left: usize, correction: f64) -> Option<SubdivKey> {
        if depth_left == 0 {
            return None;
        }
        let mid = reg.add_vertex(Vertex::new(Point3::ORIGIN, [0.0, 0.0]));
        let before = build(reg, depth_left - 1, correction);
        let after = build(reg, depth_left - 1, correction);
        Some(reg.add_subdiv(Subdiv {
            mid,
            correction,
            before,
            after,
            error: correction,
        }))
    }

    #[test]
    fn reverse_mirrors_order_and_shares_vertices() {
        let mut reg = Registries::default();
        let tree = build(&mut reg, 3, 0.5);
        let nodes_before = reg.subdivs.len();
        let original = reg.subdivs.clone();

        let reversed = reverse(&mut reg, tree).unwrap();

        let mut forward = Vec::new();
        vertices_in_order(&reg, tree, &mut forward).unwrap();
        let mut backward = Vec::new();
        vertices_in_order(&reg, reversed, &mut backward).unwrap();
        backward.reverse();

        assert_eq!(forward, backward);
        assert_eq!(reg.subdivs.len(), nodes_before * 2);
        assert_eq!(reg.vertices.len(), forward.len());
        for (key, node) in &original {
            assert_eq!(reg.subdivs.get(key), Some(node));
        }
    }

    #[test]
    fn prune_respects_vertex_flag() {
        let mut reg = Registries::default();
        let tree = build(&mut reg, 2, 0.5);
        let mirror = reverse(&mut reg, tree).unwrap();

        prune(&mut reg, mirror, false).unwrap();
        assert_eq!(reg.subdivs.len(), 3);
        assert_eq!(reg.vertices.len(), 3);

        prune(&mut reg, tree, true).unwrap();
        assert!(reg.subdivs.is_empty());
        assert!(reg.vertices.is_empty());
    }

    #[test]
    fn simplify_collapses_small_leaves_bottom_up() {
        let mut reg = Registries::default();
        let tree = build(&mut reg, 3, 0.01);
        // Keep the root significant; everything below it is within bound.
        let root = tree.unwrap();
        reg.subdiv_mut(root).unwrap().correction = 0.5;

        let simplified = simplify(&mut reg, &0.1, tree).unwrap();
        assert_eq!(simplified, Some(root));
        assert_eq!(depth(&reg, simplified).unwrap(), 1);
        assert_eq!(reg.subdivs.len(), 1);
        assert_eq!(reg.vertices.len(), 1);
    }

    #[test]
    fn simplify_keeps_ancestors_of_significant_nodes() {
        let mut reg = Registries::default();
        let tree = build(&mut reg, 3, 0.01);
        let root = reg.subdiv(tree.unwrap()).unwrap();
        let deep = reg.subdiv(root.before.unwrap()).unwrap().after.unwrap();
        reg.subdiv_mut(deep).unwrap().correction = 0.5;

        let simplified = simplify(&mut reg, &0.1, tree).unwrap();
        assert_eq!(depth(&reg, simplified).unwrap(), 3);
        // Root, its `before` child and the significant grandchild survive.
        assert_eq!(reg.subdivs.len(), 3);
    }

    #[test]
    fn simplify_is_idempotent() {
        let mut reg = Registries::default();
        let tree = build(&mut reg, 4, 0.05);
        let root = reg.subdiv(tree.unwrap()).unwrap();
        reg.subdiv_mut(root.after.unwrap()).unwrap().correction = 0.3;

        let once = simplify(&mut reg, &0.1, tree).unwrap();
        let snapshot = reg.subdivs.clone();
        let twice = simplify(&mut reg, &0.1, once).unwrap();

        assert_eq!(once, twice);
        assert_eq!(reg.subdivs.len(), snapshot.len());
        for (key, node) in &snapshot {
            assert_eq!(reg.subdivs.get(key), Some(node));
        }
    }
}
