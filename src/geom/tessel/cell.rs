//! Structuring: recursive splitting of cells along the midpoints of their
//! non-simple edges until every edge is within tolerance.
//!
//! Every split goes through the midpoint of the cell's longest edge. When
//! that edge is simple it is bisected first, on both sides, so sub-cells
//! always shrink and no cell fans out into ever thinner slivers.

use std::collections::hash_map::Entry;

use log::{debug, trace};

use super::{Phase, Tessellator};
use super::registry::{EdgeKey, VertexKey};
use crate::geom::core::Tolerance;
use crate::geom::function::{ErrorBound, TessFunction};
use crate::geom::tessellation::{SplitTieBreak, TessellationError};

/// A triangle, as three directed edges forming a closed loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cell {
    pub edges: [EdgeKey; 3],
}

/// Which neighbour of the primary edge is split too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Neighbour {
    Next,
    Prev,
}

/// A way to split a cell, identified by the edge(s) it splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    /// Two cells: primary midpoint to the opposite corner.
    Single { edge: usize },
    /// Three cells: also joins the primary midpoint to a neighbour's.
    Pair { edge: usize, neighbour: Neighbour },
}

impl Split {
    fn edge(self) -> usize {
        match self {
            Self::Single { edge } | Self::Pair { edge, .. } => edge,
        }
    }
}

/// Ranking of a hypothesis: the largest error of its new root edges, then
/// their total length.
#[derive(Debug, Clone, Copy, Default)]
struct SplitCost {
    error: f64,
    length: f64,
}

/// Root edges sampled while evaluating the hypotheses of one split, keyed by
/// their end points. A request for the reversed direction is served by a
/// reverse edge created on demand.
#[derive(Debug, Default)]
struct Candidates {
    entries: Vec<Candidate>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    beg: VertexKey,
    end: VertexKey,
    root: EdgeKey,
    reverse: Option<EdgeKey>,
    used: bool,
}

/// Corners and midpoints of the cell being split, in primary-edge order:
/// `edges[0]` runs A -> B, `edges[1]` B -> C and `edges[2]` C -> A.
struct Frame {
    edges: [EdgeKey; 3],
    corners: [VertexKey; 3],
    mids: [Option<VertexKey>; 3],
}

impl Frame {
    fn rotated(
        cell: &Cell,
        corners: [VertexKey; 3],
        mids: [Option<VertexKey>; 3],
        by: usize,
    ) -> Self {
        Self {
            edges: [0, 1, 2].map(|k| cell.edges[(by + k) % 3]),
            corners: [0, 1, 2].map(|k| corners[(by + k) % 3]),
            mids: [0, 1, 2].map(|k| mids[(by + k) % 3]),
        }
    }

    fn mid(&self, k: usize) -> Result<VertexKey, TessellationError> {
        self.mids[k].ok_or(TessellationError::Internal("split edge has no midpoint"))
    }
}

impl<F, E> Tessellator<'_, F, E>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    /// Splits cells until every edge of every cell is simple.
    ///
    /// Newly created cells are appended and visited by the same loop, so the
    /// list is processed by index while it grows. A cell already visited is
    /// queued again when a neighbour bisects one of its edges.
    pub fn structure(&mut self) -> Result<(), TessellationError> {
        self.expect_phase(Phase::Basis, "define the basis before structuring")?;
        self.owners.clear();
        for index in 0..self.cells.len() {
            self.own_cell(index)?;
        }

        let mut revisit = Vec::new();
        let mut index = 0;
        while index < self.cells.len() {
            self.structure_cell(index, index, &mut revisit)?;
            while let Some(earlier) = revisit.pop() {
                self.structure_cell(earlier, index, &mut revisit)?;
            }
            index += 1;
        }
        self.owners.clear();

        self.stats.cells = self.cells.len();
        self.phase = Phase::Structured;
        debug!(
            "structured: {} cells, {} vertices, {} splits, {} forced bisections, \
             {} candidate edges discarded",
            self.cells.len(),
            self.reg.vertices.len(),
            self.stats.splits,
            self.stats.forced_bisections,
            self.stats.discarded_edges
        );
        Ok(())
    }

    /// Splits cell `index` until it is simple. `visited` is the last index
    /// the main loop has reached.
    fn structure_cell(
        &mut self,
        index: usize,
        visited: usize,
        revisit: &mut Vec<usize>,
    ) -> Result<(), TessellationError> {
        loop {
            let cell = *self
                .cells
                .get(index)
                .ok_or(TessellationError::Internal("cell index out of range"))?;
            let corners = self.cell_corners(&cell)?;
            self.check_cell(corners)?;

            let mut mids = [None; 3];
            for (slot, &edge) in mids.iter_mut().zip(&cell.edges) {
                if !self.reg.edge(edge)?.is_simple() {
                    *slot = Some(self.reg.edge_midpoint(edge)?);
                }
            }
            if mids.iter().all(Option::is_none) {
                return Ok(());
            }
            let longest = self.longest_edge(corners)?;
            if mids[longest].is_none() {
                self.bisect_cell_edge(index, longest, visited, revisit)?;
                continue;
            }

            let hypotheses = hypotheses(&mids, longest);
            let mut candidates = Candidates::default();
            let mut best: Option<(Split, SplitCost)> = None;
            for &split in &hypotheses {
                let cost = self.split_cost(&cell, corners, mids, split, &mut candidates)?;
                best = match best {
                    Some((_, current)) if !self.prefers(cost, current) => best,
                    _ => Some((split, cost)),
                };
            }
            let Some((split, cost)) = best else {
                return Err(TessellationError::Internal("no split hypothesis chosen"));
            };
            trace!(
                "cell {index}: {split:?} of {} hypotheses, error {:.6}",
                hypotheses.len(),
                cost.error
            );

            let sub_cells = self.apply_split(&cell, corners, mids, split, &mut candidates)?;
            self.discard_unused(&candidates)?;
            self.stats.splits += 1;

            let [first, rest @ ..] = sub_cells.as_slice() else {
                return Err(TessellationError::Internal("split produced no cells"));
            };
            self.disown_cell(corners);
            self.cells[index] = *first;
            self.own_cell(index)?;
            for sub_cell in rest {
                self.cells.push(*sub_cell);
                self.own_cell(self.cells.len() - 1)?;
            }
            if self.cells.len() > self.options.max_cells {
                return Err(TessellationError::RefinementLimit {
                    max_cells: self.options.max_cells,
                });
            }
        }
    }

    /// Slot of the longest edge by chord length; the first slot wins ties.
    fn longest_edge(&self, corners: [VertexKey; 3]) -> Result<usize, TessellationError> {
        let tol = Tolerance::DEFAULT;
        let mut longest = (0, 0.0);
        for k in 0..3 {
            let a = self.reg.vertex(corners[k])?.position;
            let b = self.reg.vertex(corners[(k + 1) % 3])?.position;
            let length = a.distance_to(b);
            if length > longest.1 * (1.0 + tol.eps) {
                longest = (k, length);
            }
        }
        Ok(longest.0)
    }

    /// Bisects the simple edge in `slot` of cell `index` and hands the new
    /// trees to the opposite edge, queueing its cell if already visited.
    fn bisect_cell_edge(
        &mut self,
        index: usize,
        slot: usize,
        visited: usize,
        revisit: &mut Vec<usize>,
    ) -> Result<(), TessellationError> {
        let key = self.cells[index].edges[slot];
        let edge = self.reg.edge(key)?;
        let (fwd, rev, error) = self.bisect_simple_edge(key)?;

        // Boundary edges of an open surface have no opposite.
        let Some(&neighbour) = self.owners.get(&(edge.end, edge.beg)) else {
            return Ok(());
        };
        let mut twin = None;
        for &candidate in &self.cells[neighbour].edges {
            let other = self.reg.edge(candidate)?;
            if other.beg == edge.end && other.end == edge.beg {
                twin = Some(candidate);
            }
        }
        let twin = twin.ok_or(TessellationError::Internal("opposite edge left its cell"))?;
        self.reg.attach_trees(twin, rev, fwd, error)?;
        if neighbour != index && neighbour <= visited {
            revisit.push(neighbour);
        }
        Ok(())
    }

    /// Records cell `index` as the holder of its directed edges.
    fn own_cell(&mut self, index: usize) -> Result<(), TessellationError> {
        let corners = self.cell_corners(&self.cells[index])?;
        for k in 0..3 {
            match self.owners.entry((corners[k], corners[(k + 1) % 3])) {
                Entry::Occupied(_) => {
                    return Err(TessellationError::Internal("directed edge held by two cells"));
                }
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }
        Ok(())
    }

    fn disown_cell(&mut self, corners: [VertexKey; 3]) {
        for k in 0..3 {
            self.owners.remove(&(corners[k], corners[(k + 1) % 3]));
        }
    }

    pub(super) fn cell_corners(&self, cell: &Cell) -> Result<[VertexKey; 3], TessellationError> {
        Ok([
            self.reg.edge(cell.edges[0])?.beg,
            self.reg.edge(cell.edges[1])?.beg,
            self.reg.edge(cell.edges[2])?.beg,
        ])
    }

    fn check_cell(&self, corners: [VertexKey; 3]) -> Result<(), TessellationError> {
        let tol = Tolerance::ZERO_LENGTH;
        for k in 0..3 {
            let a = self.reg.vertex(corners[k])?;
            let b = self.reg.vertex(corners[(k + 1) % 3])?;
            if corners[k] == corners[(k + 1) % 3] || tol.approx_eq_point3(a.position, b.position) {
                return Err(TessellationError::DegenerateCell(format!(
                    "coincident vertices at parameters {:?} and {:?}",
                    a.params, b.params
                )));
            }
        }
        Ok(())
    }

    /// Whether a hypothesis costing `cost` beats the current best.
    fn prefers(&self, cost: SplitCost, current: SplitCost) -> bool {
        let tol = Tolerance::DEFAULT;
        if !tol.approx_eq_f64(cost.error, current.error) {
            return cost.error < current.error;
        }
        match self.options.tie_break {
            SplitTieBreak::FirstCandidate => false,
            SplitTieBreak::ShortestSplit => cost.length < current.length - tol.eps,
        }
    }

    /// New interior segments a split introduces, as (from, to) pairs.
    fn split_segments(
        frame: &Frame,
        split: Split,
    ) -> Result<Vec<(VertexKey, VertexKey)>, TessellationError> {
        let m = frame.mid(0)?;
        let c = frame.corners[2];
        Ok(match split {
            Split::Single { .. } => vec![(m, c)],
            Split::Pair {
                neighbour: Neighbour::Next,
                ..
            } => vec![(m, c), (m, frame.mid(1)?)],
            Split::Pair {
                neighbour: Neighbour::Prev,
                ..
            } => vec![(m, c), (m, frame.mid(2)?)],
        })
    }

    /// Largest sampled error over the new root edges of a split.
    fn split_cost(
        &mut self,
        cell: &Cell,
        corners: [VertexKey; 3],
        mids: [Option<VertexKey>; 3],
        split: Split,
        candidates: &mut Candidates,
    ) -> Result<SplitCost, TessellationError> {
        let frame = Frame::rotated(cell, corners, mids, split.edge());
        let mut cost = SplitCost::default();
        for (from, to) in Self::split_segments(&frame, split)? {
            let key = self.candidate_edge(candidates, from, to)?;
            let edge = self.reg.edge(key)?;
            let a = self.reg.vertex(edge.beg)?.position;
            let b = self.reg.vertex(edge.end)?.position;
            cost.error = cost.error.max(edge.error);
            cost.length += a.distance_to(b);
        }
        Ok(cost)
    }

    /// Builds the sub-cells of the chosen split, all oriented like the cell.
    fn apply_split(
        &mut self,
        cell: &Cell,
        corners: [VertexKey; 3],
        mids: [Option<VertexKey>; 3],
        split: Split,
        candidates: &mut Candidates,
    ) -> Result<Vec<Cell>, TessellationError> {
        let frame = Frame::rotated(cell, corners, mids, split.edge());
        let [e_ab, e_bc, e_ca] = frame.edges;
        let [_, _, c] = frame.corners;
        let m = frame.mid(0)?;

        for (from, to) in Self::split_segments(&frame, split)? {
            candidates.mark_used(from, to);
        }

        let a_m = self.reg.add_edge_before_midpoint(e_ab)?;
        let m_b = self.reg.add_edge_after_midpoint(e_ab)?;
        let m_c = self.candidate_edge(candidates, m, c)?;
        let c_m = self.candidate_edge(candidates, c, m)?;

        let cells = match split {
            Split::Single { .. } => {
                self.reg.retire_edge(e_ab);
                vec![
                    Cell { edges: [a_m, m_c, e_ca] },
                    Cell { edges: [m_b, e_bc, c_m] },
                ]
            }
            Split::Pair {
                neighbour: Neighbour::Next,
                ..
            } => {
                let n = frame.mid(1)?;
                let b_n = self.reg.add_edge_before_midpoint(e_bc)?;
                let n_c = self.reg.add_edge_after_midpoint(e_bc)?;
                let m_n = self.candidate_edge(candidates, m, n)?;
                let n_m = self.candidate_edge(candidates, n, m)?;
                self.reg.retire_edge(e_ab);
                self.reg.retire_edge(e_bc);
                vec![
                    Cell { edges: [a_m, m_c, e_ca] },
                    Cell { edges: [m_b, b_n, n_m] },
                    Cell { edges: [m_n, n_c, c_m] },
                ]
            }
            Split::Pair {
                neighbour: Neighbour::Prev,
                ..
            } => {
                let p = frame.mid(2)?;
                let c_p = self.reg.add_edge_before_midpoint(e_ca)?;
                let p_a = self.reg.add_edge_after_midpoint(e_ca)?;
                let m_p = self.candidate_edge(candidates, m, p)?;
                let p_m = self.candidate_edge(candidates, p, m)?;
                self.reg.retire_edge(e_ab);
                self.reg.retire_edge(e_ca);
                vec![
                    Cell { edges: [p_a, a_m, m_p] },
                    Cell { edges: [m_b, e_bc, c_m] },
                    Cell { edges: [m_c, c_p, p_m] },
                ]
            }
        };
        Ok(cells)
    }

    /// Root edge `from -> to` for this split, sampling it on first request.
    fn candidate_edge(
        &mut self,
        candidates: &mut Candidates,
        from: VertexKey,
        to: VertexKey,
    ) -> Result<EdgeKey, TessellationError> {
        if let Some(entry) = candidates
            .entries
            .iter_mut()
            .find(|entry| entry.beg == from && entry.end == to)
        {
            return Ok(entry.root);
        }
        if let Some(entry) = candidates
            .entries
            .iter_mut()
            .find(|entry| entry.beg == to && entry.end == from)
        {
            if let Some(reverse) = entry.reverse {
                return Ok(reverse);
            }
            let reverse = self.reg.add_reverse_edge(entry.root)?;
            entry.reverse = Some(reverse);
            return Ok(reverse);
        }

        let root = self.add_root_edge(from, to)?;
        candidates.entries.push(Candidate {
            beg: from,
            end: to,
            root,
            reverse: None,
            used: false,
        });
        Ok(root)
    }

    /// Frees the root edges that only losing hypotheses needed.
    fn discard_unused(&mut self, candidates: &Candidates) -> Result<(), TessellationError> {
        for entry in candidates.entries.iter().filter(|entry| !entry.used) {
            if let Some(reverse) = entry.reverse {
                self.reg.retire_edge(reverse);
            }
            self.reg.remove_root_edge(entry.root)?;
            self.stats.discarded_edges += 1;
        }
        Ok(())
    }
}

impl Candidates {
    fn mark_used(&mut self, from: VertexKey, to: VertexKey) {
        for entry in &mut self.entries {
            if (entry.beg == from && entry.end == to) || (entry.beg == to && entry.end == from) {
                entry.used = true;
            }
        }
    }
}

/// Split hypotheses through the midpoint of `edge`, which must be
/// non-simple: paired with the next neighbour, then with the previous one,
/// or alone when both neighbours are simple.
fn hypotheses(mids: &[Option<VertexKey>; 3], edge: usize) -> Vec<Split> {
    let mut out = Vec::with_capacity(2);
    if mids[(edge + 1) % 3].is_some() {
        out.push(Split::Pair {
            edge,
            neighbour: Neighbour::Next,
        });
    }
    if mids[(edge + 2) % 3].is_some() {
        out.push(Split::Pair {
            edge,
            neighbour: Neighbour::Prev,
        });
    }
    if out.is_empty() {
        out.push(Split::Single { edge });
    }
    out
}
