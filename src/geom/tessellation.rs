//! Entry points for adaptive surface tessellation.
//!
//! A tessellation turns a [`TessFunction`] (the surface) and an
//! [`ErrorBound`] (how closely to follow it) into a watertight triangle mesh
//! whose every edge lies within the bound of the true surface.
//!
//! ```ignore
//! use ghx_tessellate::geom::{ParametricFunction, Point3, SphereSurface, tessellate};
//!
//! let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0)?);
//! let (mesh, diagnostics) = tessellate(&sphere, &0.01)?;
//! assert!(diagnostics.is_watertight());
//! ```
//!
//! # Errors
//!
//! A run either completes or fails with a [`TessellationError`]; there is no
//! partially refined output. Every error is a configuration problem: a
//! malformed basis, a surface that evaluates to NaN, an error bound that is
//! not strictly positive, or a surface too detailed for the configured
//! [`TessellationOptions`] limits.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::diagnostics::GeomMeshDiagnostics;
use super::function::{ErrorBound, TessFunction};
use super::mesh::{GeomContext, GeomMesh, MeshSink, mesh_diagnostics};
use super::metrics::TimingBucket;
use super::tessel::{TessellationStats, Tessellator};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TessellationError {
    #[error("basis defines no triangles")]
    EmptyBasis,
    #[error("malformed basis: {0}")]
    MalformedBasis(String),
    #[error("degenerate cell: {0}")]
    DegenerateCell(String),
    #[error("surface position is not finite at parameters ({u}, {v})")]
    NonFinitePosition { u: f64, v: f64 },
    #[error("error bound must be finite and greater than zero, got {value}")]
    InvalidErrorBound { value: f64 },
    #[error("edge sampling exceeded the maximum depth of {max_depth}")]
    RecursionLimit { max_depth: usize },
    #[error("structuring exceeded the maximum of {max_cells} cells")]
    RefinementLimit { max_cells: usize },
    #[error("invalid tessellation options: {0}")]
    InvalidOptions(String),
    #[error("tessellator invariant violated: {0}")]
    Internal(&'static str),
}

/// How to choose between split hypotheses whose costs tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTieBreak {
    /// Keep the first hypothesis evaluated.
    #[default]
    FirstCandidate,
    /// Prefer the hypothesis whose new edges are shortest in total.
    ShortestSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationOptions {
    /// Deepest subdivision level an edge may be sampled to.
    pub max_depth: usize,
    /// Upper bound on the number of cells structuring may create.
    pub max_cells: usize,
    pub tie_break: SplitTieBreak,
    /// Fill in smooth normals when the Function has no analytic ones.
    pub compute_missing_normals: bool,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_cells: 4_000_000,
            tie_break: SplitTieBreak::FirstCandidate,
            compute_missing_normals: true,
        }
    }
}

impl TessellationOptions {
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    #[must_use]
    pub const fn with_tie_break(mut self, tie_break: SplitTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn validate(&self) -> Result<(), TessellationError> {
        if self.max_depth == 0 {
            return Err(TessellationError::InvalidOptions(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.max_cells == 0 {
            return Err(TessellationError::InvalidOptions(
                "max_cells must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tessellates `function` to within `error_bound` with default options.
pub fn tessellate<F, E>(
    function: &F,
    error_bound: &E,
) -> Result<(GeomMesh, GeomMeshDiagnostics), TessellationError>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    tessellate_with_options(function, error_bound, TessellationOptions::default())
}

pub fn tessellate_with_options<F, E>(
    function: &F,
    error_bound: &E,
    options: TessellationOptions,
) -> Result<(GeomMesh, GeomMeshDiagnostics), TessellationError>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    let mut ctx = GeomContext::new();
    tessellate_with_context(function, error_bound, options, &mut ctx)
}

/// Tessellates into a [`GeomMesh`], timing each phase in `ctx.metrics`.
pub fn tessellate_with_context<F, E>(
    function: &F,
    error_bound: &E,
    options: TessellationOptions,
    ctx: &mut GeomContext,
) -> Result<(GeomMesh, GeomMeshDiagnostics), TessellationError>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    ctx.metrics.begin();

    let mut tess = Tessellator::new(function, error_bound, options)?;
    ctx.metrics.time(TimingBucket::Basis, || tess.define_basis())?;
    ctx.metrics.time(TimingBucket::Structuring, || tess.structure())?;
    ctx.metrics.time(TimingBucket::Indexing, || tess.assign_indices())?;

    let mut mesh = GeomMesh::default();
    ctx.metrics.time(TimingBucket::Emission, || tess.emit(&mut mesh))?;
    if mesh.normals.is_none() && options.compute_missing_normals {
        ctx.metrics.time(TimingBucket::Normals, || mesh.compute_smooth_normals());
    }

    let tol = ctx.tolerance;
    let mut diagnostics = ctx
        .metrics
        .time(TimingBucket::Diagnostics, || mesh_diagnostics(&mesh, tol));
    diagnostics.record_stats(&tess.stats());
    diagnostics.timing = ctx.metrics.end();

    debug!("tessellated: {}", diagnostics.summary());
    Ok((mesh, diagnostics))
}

/// Tessellates straight into a caller-provided sink.
///
/// No normals are synthesized and no diagnostics are computed; the sink
/// receives exactly what the Function provides.
pub fn tessellate_into<F, E, S>(
    function: &F,
    error_bound: &E,
    options: TessellationOptions,
    sink: &mut S,
) -> Result<TessellationStats, TessellationError>
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
    S: MeshSink,
{
    let mut tess = Tessellator::new(function, error_bound, options)?;
    tess.run()?;
    tess.emit(sink)?;
    Ok(tess.stats())
}

/// Tessellates independent surfaces on the rayon thread pool.
///
/// Runs share nothing, so results are identical to tessellating each
/// surface on its own and come back in input order.
#[cfg(feature = "parallel")]
pub fn tessellate_batch<F, E>(
    functions: &[&F],
    error_bound: &E,
    options: TessellationOptions,
) -> Vec<Result<(GeomMesh, GeomMeshDiagnostics), TessellationError>>
where
    F: TessFunction + Sync + ?Sized,
    E: ErrorBound + Sync + ?Sized,
{
    use rayon::prelude::*;

    functions
        .par_iter()
        .map(|function| tessellate_with_options(*function, error_bound, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        let options = TessellationOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.tie_break, SplitTieBreak::FirstCandidate);
        assert!(options.compute_missing_normals);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let depth = TessellationOptions::default().with_max_depth(0);
        assert!(matches!(depth.validate(), Err(TessellationError::InvalidOptions(_))));
        let cells = TessellationOptions::default().with_max_cells(0);
        assert!(matches!(cells.validate(), Err(TessellationError::InvalidOptions(_))));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: TessellationOptions =
            serde_json::from_str(r#"{"max_depth": 12, "tie_break": "shortest_split"}"#).unwrap();
        assert_eq!(options.max_depth, 12);
        assert_eq!(options.tie_break, SplitTieBreak::ShortestSplit);
        assert_eq!(options.max_cells, TessellationOptions::default().max_cells);
    }

    #[test]
    fn error_messages_name_the_problem() {
        let err = TessellationError::InvalidErrorBound { value: -1.0 };
        assert!(err.to_string().contains("-1"));
        let err = TessellationError::RefinementLimit { max_cells: 10 };
        assert!(err.to_string().contains("10 cells"));
    }
}
