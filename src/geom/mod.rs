mod core;
mod diagnostics;
mod function;
mod mesh;
mod metrics;
mod parametric;
mod presets;
mod surface;
mod tessel;
mod tessellation;

pub use core::{Point3, Tolerance, Vec3};
pub use diagnostics::GeomMeshDiagnostics;
pub use function::{ErrorBound, PositionalError, TessFunction, Vertex};
pub use mesh::{GeomContext, GeomMesh, MeshSink};
pub use metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
pub use parametric::ParametricFunction;
pub use presets::SurfacePreset;
pub use surface::{PlaneSurface, SincSurface, SphereSurface, Surface, TorusSurface};
pub use tessel::{Basis, TessellationStats, Tessellator, VertexKey};
pub use tessellation::{
    SplitTieBreak, TessellationError, TessellationOptions, tessellate, tessellate_into,
    tessellate_with_context, tessellate_with_options,
};

#[cfg(feature = "parallel")]
pub use tessellation::tessellate_batch;

#[cfg(test)]
mod tests;
