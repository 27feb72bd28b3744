//! Per-run object pools for vertices, edges and subdivision nodes.
//!
//! Each pool is a [`SlotMap`]: removing an object returns its slot to the
//! pool for reuse, and the generation stored in every key guarantees that a
//! key to a removed object never resolves to whatever reuses the slot.

use slotmap::{SlotMap, new_key_type};

use crate::geom::function::Vertex;
use crate::geom::tessellation::TessellationError;

new_key_type! {
    /// Identity of a vertex in a tessellation run.
    pub struct VertexKey;
}

new_key_type! {
    /// Identity of a directed edge in a tessellation run.
    pub struct EdgeKey;
}

new_key_type! {
    /// Identity of a subdivision-tree node in a tessellation run.
    pub struct SubdivKey;
}

/// One level of refinement of an edge.
///
/// `error` is the largest correction anywhere in the sampled sub-tree, so it
/// is never smaller than either child's `error`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Subdiv {
    pub mid: VertexKey,
    pub correction: f64,
    pub before: Option<SubdivKey>,
    pub after: Option<SubdivKey>,
    pub error: f64,
}

impl Subdiv {
    pub fn set_child(&mut self, side: Side, tree: Option<SubdivKey>) {
        match side {
            Side::Before => self.before = tree,
            Side::After => self.after = tree,
        }
    }
}

/// A child slot of a subdivision node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Before,
    After,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Before => Self::After,
            Self::After => Self::Before,
        }
    }
}

/// Where a half edge was cut from: its forward tree hangs in slot `side` of
/// `fwd`, its reverse tree in the opposite slot of `rev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParentSlots {
    pub fwd: SubdivKey,
    pub rev: SubdivKey,
    pub side: Side,
}

impl ParentSlots {
    /// The same slots seen from the reversed edge.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            fwd: self.rev,
            rev: self.fwd,
            side: self.side.opposite(),
        }
    }
}

/// Whether an edge owns its subdivision trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeKind {
    /// Freshly sampled; owns its forward tree (and that tree's vertices) and
    /// the mirrored reverse tree.
    Root,
    /// A reversal or half of another edge; borrows sub-trees it does not own.
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub beg: VertexKey,
    pub end: VertexKey,
    pub fwd: Option<SubdivKey>,
    pub rev: Option<SubdivKey>,
    pub error: f64,
    pub kind: EdgeKind,
    pub parent: Option<ParentSlots>,
}

impl Edge {
    /// An edge without a subdivision tree is already within tolerance.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.fwd.is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registries {
    pub vertices: SlotMap<VertexKey, Vertex>,
    pub edges: SlotMap<EdgeKey, Edge>,
    pub subdivs: SlotMap<SubdivKey, Subdiv>,
}

impl Registries {
    pub fn vertex(&self, key: VertexKey) -> Result<Vertex, TessellationError> {
        self.vertices
            .get(key)
            .copied()
            .ok_or(TessellationError::Internal("stale vertex key"))
    }

    pub fn edge(&self, key: EdgeKey) -> Result<Edge, TessellationError> {
        self.edges
            .get(key)
            .copied()
            .ok_or(TessellationError::Internal("stale edge key"))
    }

    pub fn subdiv(&self, key: SubdivKey) -> Result<Subdiv, TessellationError> {
        self.subdivs
            .get(key)
            .copied()
            .ok_or(TessellationError::Internal("stale subdivision key"))
    }

    pub fn subdiv_mut(&mut self, key: SubdivKey) -> Result<&mut Subdiv, TessellationError> {
        self.subdivs
            .get_mut(key)
            .ok_or(TessellationError::Internal("stale subdivision key"))
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexKey {
        self.vertices.insert(vertex)
    }

    pub fn free_vertex(&mut self, key: VertexKey) {
        self.vertices.remove(key);
    }

    pub fn add_subdiv(&mut self, node: Subdiv) -> SubdivKey {
        self.subdivs.insert(node)
    }

    pub fn free_subdiv(&mut self, key: SubdivKey) {
        self.subdivs.remove(key);
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeKey {
        self.edges.insert(edge)
    }

    /// Drops an edge object without touching the trees it refers to.
    pub fn retire_edge(&mut self, key: EdgeKey) {
        self.edges.remove(key);
    }

    /// Gives a simple edge the trees `fwd` and `rev`.
    ///
    /// The trees are also hung in the parent slots the edge was cut from, so
    /// a neighbour still holding the longer parent edge meets the new
    /// midpoint when it splits.
    pub fn attach_trees(
        &mut self,
        key: EdgeKey,
        fwd: SubdivKey,
        rev: SubdivKey,
        error: f64,
    ) -> Result<(), TessellationError> {
        let edge = self
            .edges
            .get_mut(key)
            .ok_or(TessellationError::Internal("stale edge key"))?;
        if !edge.is_simple() {
            return Err(TessellationError::Internal("edge already has trees"));
        }
        edge.fwd = Some(fwd);
        edge.rev = Some(rev);
        edge.error = error;
        if let Some(parent) = edge.parent {
            self.subdiv_mut(parent.fwd)?.set_child(parent.side, Some(fwd));
            self.subdiv_mut(parent.rev)?
                .set_child(parent.side.opposite(), Some(rev));
        }
        Ok(())
    }

    /// Error recorded for an optional sub-tree (0 when simple).
    pub fn tree_error(&self, tree: Option<SubdivKey>) -> Result<f64, TessellationError> {
        match tree {
            Some(key) => Ok(self.subdiv(key)?.error),
            None => Ok(0.0),
        }
    }
}
