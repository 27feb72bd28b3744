//! Mesh diagnostics for tessellation runs.
//!
//! Every tessellation entry point returns a [`GeomMeshDiagnostics`] next to
//! the mesh. It combines the topology of the output (which should always be
//! watertight for a closed basis) with counters from the refinement itself.
//!
//! ```ignore
//! use ghx_tessellate::geom::{tessellate, ParametricFunction, SphereSurface, Point3};
//!
//! let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0)?);
//! let (mesh, diagnostics) = tessellate(&sphere, &0.01)?;
//! assert!(diagnostics.is_watertight());
//! println!("{}", diagnostics.summary());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::metrics::GeomTimingReport;
use super::tessel::TessellationStats;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomMeshDiagnostics {
    /// Total number of vertices in the final mesh.
    pub vertex_count: usize,

    /// Total number of triangles in the final mesh.
    pub triangle_count: usize,

    /// Triangles with zero area or repeated corners.
    ///
    /// These are reported, never removed.
    pub degenerate_triangle_count: usize,

    /// Number of open (boundary) edges in the mesh.
    ///
    /// Zero for any closed basis; an open basis keeps its boundary.
    pub open_edge_count: usize,

    /// Edges shared by more than two triangles.
    pub non_manifold_edge_count: usize,

    /// Signed volume enclosed by a closed mesh; positive when outward-facing.
    pub enclosed_volume: Option<f64>,

    /// Triangles the Function's basis started from.
    pub basis_triangle_count: usize,

    /// Root edges sampled, including discarded split candidates.
    pub root_edge_count: usize,

    /// Candidate root edges sampled for a losing split hypothesis.
    pub discarded_edge_count: usize,

    /// Cell splits performed during structuring.
    pub split_count: usize,

    /// Simple edges bisected because they were the longest edge of a cell
    /// being split.
    pub forced_bisection_count: usize,

    /// Surface midpoint evaluations.
    pub surface_evaluations: usize,

    /// Deepest subdivision level reached while sampling any edge.
    pub max_sample_depth: usize,

    /// Only populated when the `mesh_engine_metrics` feature is enabled
    /// and the target is not WASM.
    pub timing: Option<GeomTimingReport>,

    /// Human-readable warnings, e.g. "mesh has open edges".
    pub warnings: Vec<String>,
}

impl GeomMeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the mesh has no open edges.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.open_edge_count == 0
    }

    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    /// Returns `true` if the mesh is both watertight and manifold.
    #[must_use]
    pub fn is_valid_solid(&self) -> bool {
        self.is_watertight() && self.is_manifold()
    }

    /// Returns `true` if the mesh is a valid solid without degenerate
    /// triangles or warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.is_valid_solid() && self.degenerate_triangle_count == 0 && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns the total number of topology issues (open + non-manifold edges).
    #[must_use]
    pub fn topology_issue_count(&self) -> usize {
        self.open_edge_count + self.non_manifold_edge_count
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Copies the refinement counters of a run.
    pub fn record_stats(&mut self, stats: &TessellationStats) {
        self.basis_triangle_count = stats.basis_triangles;
        self.root_edge_count = stats.root_edges;
        self.discarded_edge_count = stats.discarded_edges;
        self.split_count = stats.splits;
        self.forced_bisection_count = stats.forced_bisections;
        self.surface_evaluations = stats.surface_evaluations;
        self.max_sample_depth = stats.deepest_sample;
        if stats.unreferenced_vertices > 0 {
            self.add_warning(format!(
                "{} vertices are not used by any triangle",
                stats.unreferenced_vertices
            ));
        }
    }

    /// Merges diagnostics of another mesh, e.g. across a batch.
    ///
    /// Counts are summed, depths maxed and warnings appended. Volume and
    /// timing are dropped since they no longer describe a single mesh.
    pub fn merge(&mut self, other: &GeomMeshDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.degenerate_triangle_count += other.degenerate_triangle_count;
        self.open_edge_count += other.open_edge_count;
        self.non_manifold_edge_count += other.non_manifold_edge_count;
        self.basis_triangle_count += other.basis_triangle_count;
        self.root_edge_count += other.root_edge_count;
        self.discarded_edge_count += other.discarded_edge_count;
        self.split_count += other.split_count;
        self.forced_bisection_count += other.forced_bisection_count;
        self.surface_evaluations += other.surface_evaluations;
        self.max_sample_depth = self.max_sample_depth.max(other.max_sample_depth);
        self.enclosed_volume = None;
        self.timing = None;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Returns a short summary string suitable for logging.
    ///
    /// Format: `"V:{vertices} T:{triangles} [details...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} T:{}", self.vertex_count, self.triangle_count)];

        if self.split_count > 0 {
            parts.push(format!("splits:{}", self.split_count));
        }
        if self.max_sample_depth > 0 {
            parts.push(format!("depth:{}", self.max_sample_depth));
        }
        if self.degenerate_triangle_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_triangle_count));
        }
        if self.open_edge_count > 0 {
            parts.push(format!("open:{}", self.open_edge_count));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }

        parts.join(" ")
    }
}

impl fmt::Display for GeomMeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        if let Some(volume) = self.enclosed_volume {
            writeln!(f, "  Enclosed volume: {volume:.6}")?;
        }

        writeln!(f, "  Refinement:")?;
        writeln!(f, "    - Basis triangles: {}", self.basis_triangle_count)?;
        writeln!(f, "    - Splits: {}", self.split_count)?;
        writeln!(
            f,
            "    - Root edges: {} ({} discarded)",
            self.root_edge_count, self.discarded_edge_count
        )?;
        writeln!(f, "    - Surface evaluations: {}", self.surface_evaluations)?;
        writeln!(f, "    - Max sample depth: {}", self.max_sample_depth)?;

        if self.topology_issue_count() > 0 || self.degenerate_triangle_count > 0 {
            writeln!(f, "  Topology issues:")?;
            if self.open_edge_count > 0 {
                writeln!(f, "    - Open edges: {}", self.open_edge_count)?;
            }
            if self.non_manifold_edge_count > 0 {
                writeln!(f, "    - Non-manifold edges: {}", self.non_manifold_edge_count)?;
            }
            if self.degenerate_triangle_count > 0 {
                writeln!(f, "    - Degenerate triangles: {}", self.degenerate_triangle_count)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }

        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }

        let status = if self.is_clean() {
            "CLEAN"
        } else if self.is_valid_solid() {
            "VALID (with warnings)"
        } else {
            "OPEN OR NON-MANIFOLD"
        };
        writeln!(f, "  Status: {status}")?;

        Ok(())
    }
}
