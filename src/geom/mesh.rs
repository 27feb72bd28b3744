use std::collections::HashMap;

use super::diagnostics::GeomMeshDiagnostics;
use super::metrics::GeomMetrics;
use super::{Point3, Tolerance, Vec3};

/// Receiver of a finished tessellation.
///
/// Vertices are delivered first, in index order, each optionally followed
/// by its normal and parameters; triangles follow once every vertex is known.
pub trait MeshSink {
    /// Whatever the sink uses to refer back to a vertex it received.
    type Handle: Copy;

    fn add_vertex(&mut self, position: Point3) -> Self::Handle;

    fn add_vertex_normal(&mut self, vertex: Self::Handle, normal: Vec3);

    /// Surface parameters of a vertex. Ignored unless the sink keeps them.
    fn add_vertex_params(&mut self, _vertex: Self::Handle, _params: [f64; 2]) {}

    fn add_triangle(&mut self, a: Self::Handle, b: Self::Handle, c: Self::Handle);
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    /// Surface parameters of each vertex.
    pub uvs: Option<Vec<[f64; 2]>>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl GeomMesh {
    /// Create a new mesh with positions and indices only.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            uvs: None,
            normals: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Returns true if all vertex indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len();
        self.indices.iter().all(|&i| (i as usize) < n)
    }

    #[must_use]
    pub fn has_triangle_indices(&self) -> bool {
        self.indices.len() % 3 == 0
    }

    /// Returns true if all optional vertex attribute buffers match `positions.len()`.
    #[must_use]
    pub fn has_valid_attribute_lengths(&self) -> bool {
        let n = self.positions.len();
        self.uvs.as_ref().is_none_or(|uvs| uvs.len() == n)
            && self.normals.as_ref().is_none_or(|normals| normals.len() == n)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.has_triangle_indices() {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if !self.has_valid_attribute_lengths() {
            return Err("mesh attribute buffers do not match vertex count".to_string());
        }
        Ok(())
    }

    /// Position buffer as `[x0, y0, z0, x1, ...]`, for packed JS buffers.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        self.positions.as_flattened()
    }

    #[must_use]
    pub fn uvs_flat(&self) -> Option<&[f64]> {
        self.uvs.as_deref().map(<[[f64; 2]]>::as_flattened)
    }

    #[must_use]
    pub fn normals_flat(&self) -> Option<&[f64]> {
        self.normals.as_deref().map(<[[f64; 3]]>::as_flattened)
    }

    #[must_use]
    pub fn position(&self, index: u32) -> Option<Point3> {
        self.positions.get(index as usize).copied().map(Point3::from)
    }

    /// Triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| [tri[0], tri[1], tri[2]])
    }

    /// Replaces the normals with area-weighted vertex normals.
    pub fn compute_smooth_normals(&mut self) {
        self.normals = Some(compute_smooth_normals(&self.positions, &self.indices));
    }
}

impl MeshSink for GeomMesh {
    type Handle = u32;

    fn add_vertex(&mut self, position: Point3) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        if let Some(normals) = self.normals.as_mut() {
            normals.push([0.0, 0.0, 0.0]);
        }
        if let Some(uvs) = self.uvs.as_mut() {
            uvs.push([0.0, 0.0]);
        }
        index
    }

    fn add_vertex_normal(&mut self, vertex: u32, normal: Vec3) {
        let n = self.positions.len();
        let normals = self.normals.get_or_insert_with(Vec::new);
        if normals.len() < n {
            normals.resize(n, [0.0, 0.0, 0.0]);
        }
        if let Some(slot) = normals.get_mut(vertex as usize) {
            *slot = normal.to_array();
        }
    }

    fn add_vertex_params(&mut self, vertex: u32, params: [f64; 2]) {
        let n = self.positions.len();
        let uvs = self.uvs.get_or_insert_with(Vec::new);
        if uvs.len() < n {
            uvs.resize(n, [0.0, 0.0]);
        }
        if let Some(slot) = uvs.get_mut(vertex as usize) {
            *slot = params;
        }
    }

    fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }
}

#[derive(Debug)]
pub struct GeomContext {
    pub tolerance: Tolerance,
    pub metrics: GeomMetrics,
}

impl GeomContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT,
            metrics: GeomMetrics::default(),
        }
    }
}

impl Default for GeomContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Topology and quality report for a finished mesh.
pub(crate) fn mesh_diagnostics(mesh: &GeomMesh, tol: Tolerance) -> GeomMeshDiagnostics {
    let (open_edge_count, non_manifold_edge_count) = count_edge_topology(&mesh.indices);
    let degenerate_triangle_count = count_degenerate_triangles(&mesh.positions, &mesh.indices, tol);

    let mut diagnostics = GeomMeshDiagnostics {
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        degenerate_triangle_count,
        open_edge_count,
        non_manifold_edge_count,
        ..GeomMeshDiagnostics::default()
    };

    if open_edge_count == 0 && non_manifold_edge_count == 0 && mesh.triangle_count() > 0 {
        let volume = signed_volume(&mesh.positions, &mesh.indices);
        diagnostics.enclosed_volume = Some(volume);
        if volume.is_finite() && volume < 0.0 {
            diagnostics.add_warning("mesh orientation is inward (negative volume)");
        }
    }
    if open_edge_count > 0 {
        diagnostics.add_warning("mesh has open edges");
    }
    if non_manifold_edge_count > 0 {
        diagnostics.add_warning("mesh has non-manifold edges");
    }
    if degenerate_triangle_count > 0 {
        diagnostics.add_warning("mesh has degenerate triangles");
    }
    diagnostics
}

/// Counts edges used by exactly one triangle (open) and by more than two
/// (non-manifold).
pub(crate) fn count_edge_topology(indices: &[u32]) -> (usize, usize) {
    let mut edge_counts: HashMap<(u32, u32), u32> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let i0 = tri[0];
        let i1 = tri[1];
        let i2 = tri[2];

        if i0 == i1 || i1 == i2 || i0 == i2 {
            continue;
        }

        let edges = [(i0, i1), (i1, i2), (i2, i0)];
        for (ea, eb) in edges {
            let (lo, hi) = if ea <= eb { (ea, eb) } else { (eb, ea) };
            *edge_counts.entry((lo, hi)).or_insert(0) += 1;
        }
    }

    let mut open_edge_count = 0usize;
    let mut non_manifold_edge_count = 0usize;
    for count in edge_counts.into_values() {
        if count == 1 {
            open_edge_count += 1;
        } else if count > 2 {
            non_manifold_edge_count += 1;
        }
    }

    (open_edge_count, non_manifold_edge_count)
}

/// Triangles with repeated indices, coincident corners or zero area.
pub(crate) fn count_degenerate_triangles(
    positions: &[[f64; 3]],
    indices: &[u32],
    tol: Tolerance,
) -> usize {
    let area_eps = tol.eps * tol.eps;
    indices
        .chunks_exact(3)
        .filter(|tri| {
            let [i0, i1, i2] = [tri[0], tri[1], tri[2]];
            if i0 == i1 || i1 == i2 || i0 == i2 {
                return true;
            }
            let (Some(a), Some(b), Some(c)) = (
                positions.get(i0 as usize).copied().map(Point3::from),
                positions.get(i1 as usize).copied().map(Point3::from),
                positions.get(i2 as usize).copied().map(Point3::from),
            ) else {
                return true;
            };
            let area2 = b.sub_point(a).cross(c.sub_point(a)).length_squared();
            !area2.is_finite() || area2 <= area_eps * area_eps
        })
        .count()
}

fn signed_volume(positions: &[[f64; 3]], indices: &[u32]) -> f64 {
    let mut volume = 0.0;
    for tri in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            positions.get(tri[0] as usize),
            positions.get(tri[1] as usize),
            positions.get(tri[2] as usize),
        ) else {
            continue;
        };

        let av = Vec3::new(a[0], a[1], a[2]);
        let bv = Vec3::new(b[0], b[1], b[2]);
        let cv = Vec3::new(c[0], c[1], c[2]);
        volume += av.dot(bv.cross(cv));
    }

    volume / 6.0
}

fn compute_smooth_normals(positions: &[[f64; 3]], indices: &[u32]) -> Vec<[f64; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let i0 = tri[0] as usize;
        let i1 = tri[1] as usize;
        let i2 = tri[2] as usize;

        let (Some(&a), Some(&b), Some(&c)) =
            (positions.get(i0), positions.get(i1), positions.get(i2))
        else {
            continue;
        };
        let (a, b, c) = (Point3::from(a), Point3::from(b), Point3::from(c));
        let n = b.sub_point(a).cross(c.sub_point(a));

        normals[i0] = normals[i0] + n;
        normals[i1] = normals[i1] + n;
        normals[i2] = normals[i2] + n;
    }

    normals
        .into_iter()
        .map(|n| n.normalized().unwrap_or(Vec3::Z).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit tetrahedron, outward-facing.
    fn tetrahedron() -> GeomMesh {
        GeomMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            vec![0, 2, 1, 0, 1, 3, 1, 2, 3, 0, 3, 2],
        )
    }

    #[test]
    fn closed_mesh_reports_volume_and_no_open_edges() {
        let mesh = tetrahedron();
        let diagnostics = mesh_diagnostics(&mesh, Tolerance::DEFAULT);
        assert_eq!(diagnostics.open_edge_count, 0);
        assert_eq!(diagnostics.non_manifold_edge_count, 0);
        let volume = diagnostics.enclosed_volume.unwrap();
        assert!((volume - 1.0 / 6.0).abs() < 1e-12, "volume {volume}");
        assert!(!diagnostics.has_warnings());
    }

    #[test]
    fn missing_face_leaves_three_open_edges() {
        let mut mesh = tetrahedron();
        mesh.indices.truncate(9);
        let diagnostics = mesh_diagnostics(&mesh, Tolerance::DEFAULT);
        assert_eq!(diagnostics.open_edge_count, 3);
        assert!(diagnostics.enclosed_volume.is_none());
        assert!(diagnostics.has_warnings());
    }

    #[test]
    fn sink_keeps_attributes_aligned() {
        let mut mesh = GeomMesh::default();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        mesh.add_vertex_params(a, [0.0, 0.0]);
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        mesh.add_vertex_params(b, [1.0, 0.0]);
        mesh.add_vertex_normal(b, Vec3::Z);
        let c = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.add_vertex_params(c, [0.0, 1.0]);
        mesh.add_vertex_normal(c, Vec3::Z);
        mesh.add_triangle(a, b, c);

        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.uvs_flat().unwrap(), &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.normals.as_ref().unwrap()[2], [0.0, 0.0, 1.0]);
        assert_eq!(mesh.positions_flat().len(), 9);

        // A trailing vertex without a normal still gets a slot.
        mesh.add_vertex(Point3::new(1.0, 1.0, 0.0));
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.normals.as_ref().unwrap()[3], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn smooth_normals_follow_winding() {
        let mut mesh = GeomMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        );
        mesh.compute_smooth_normals();
        for n in mesh.normals.unwrap() {
            assert_eq!(n, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn degenerate_triangles_are_counted() {
        let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let indices = vec![0, 1, 2, 0, 0, 3, 0, 1, 3];
        assert_eq!(count_degenerate_triangles(&positions, &indices, Tolerance::DEFAULT), 2);
    }
}
