//! Opt-in timing hooks for tessellation runs.
//!
//! Timing is only collected when the `mesh_engine_metrics` feature is enabled
//! and the target is not WASM (`std::time::Instant` is unavailable there).
//! Otherwise every call compiles down to running the closure.
//!
//! ```ignore
//! let mut ctx = GeomContext::new();
//! let options = TessellationOptions::default();
//! let (_, diagnostics) = tessellate_with_context(&sphere, &0.01, options, &mut ctx)?;
//! if let Some(report) = diagnostics.timing {
//!     println!("structuring: {} ns", report.structuring_ns);
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Phases of a tessellation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Basis definition and sampling of the basis edges.
    Basis,
    /// Cell splitting, including candidate edge sampling.
    Structuring,
    /// Output index assignment.
    Indexing,
    /// Handing vertices and triangles to the sink.
    Emission,
    /// Smooth normal computation for Functions without analytic normals.
    Normals,
    /// Topology checks on the finished mesh.
    Diagnostics,
}

/// Cumulative nanoseconds spent per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeomTimingReport {
    pub basis_ns: u64,
    pub structuring_ns: u64,
    pub indexing_ns: u64,
    pub emission_ns: u64,
    pub normals_ns: u64,
    pub diagnostics_ns: u64,
}

impl GeomTimingReport {
    /// Returns the total time across all buckets in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.basis_ns
            .saturating_add(self.structuring_ns)
            .saturating_add(self.indexing_ns)
            .saturating_add(self.emission_ns)
            .saturating_add(self.normals_ns)
            .saturating_add(self.diagnostics_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    fn bucket_mut(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Basis => &mut self.basis_ns,
            TimingBucket::Structuring => &mut self.structuring_ns,
            TimingBucket::Indexing => &mut self.indexing_ns,
            TimingBucket::Emission => &mut self.emission_ns,
            TimingBucket::Normals => &mut self.normals_ns,
            TimingBucket::Diagnostics => &mut self.diagnostics_ns,
        }
    }

    /// Adds `nanos` to `bucket`, saturating.
    pub fn add(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = self.bucket_mut(bucket);
        *slot = slot.saturating_add(nanos);
    }
}

/// Accumulator for timing tessellation phases.
///
/// Call [`begin`](Self::begin) to reset, wrap phases with
/// [`time`](Self::time), and call [`end`](Self::end) for the report.
#[derive(Debug, Default)]
pub struct GeomMetrics {
    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    report: GeomTimingReport,
}

impl GeomMetrics {
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = GeomTimingReport::default();
        }
    }

    /// Returns the accumulated report, or `None` if metrics are disabled.
    #[must_use]
    pub fn end(&self) -> Option<GeomTimingReport> {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Times `f` and accumulates the elapsed time in `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.report.add(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}
