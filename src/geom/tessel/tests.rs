use std::collections::HashSet;
use std::f64::consts::PI;

use super::*;
use crate::geom::core::Point3;
use crate::geom::mesh::{GeomMesh, count_edge_topology};
use crate::geom::parametric::ParametricFunction;
use crate::geom::surface::{SphereSurface, TorusSurface};
use crate::geom::tessellation::SplitTieBreak;

/// Unit square in the xy plane lifted by `h * (sin(pi x) + sin(pi y)) / 2`.
/// Parameters are the x and y coordinates.
struct BumpFunction {
    height: f64,
}

impl TessFunction for BumpFunction {
    fn define_basis(&self, basis: &mut Basis<'_>) -> Result<(), TessellationError> {
        let mut corner = |u: f64, v: f64| basis.add_vertex(self.surface_pos([u, v]), [u, v]);
        let p00 = corner(0.0, 0.0)?;
        let p10 = corner(1.0, 0.0)?;
        let p11 = corner(1.0, 1.0)?;
        let p01 = corner(0.0, 1.0)?;
        basis.add_triangle(p00, p10, p11)?;
        basis.add_triangle(p00, p11, p01)
    }

    fn surface_pos(&self, params: [f64; 2]) -> Point3 {
        let [x, y] = params;
        Point3::new(x, y, self.height * ((PI * x).sin() + (PI * y).sin()) * 0.5)
    }
}

/// Finite basis over a surface that evaluates to NaN everywhere else.
struct BrokenFunction;

impl TessFunction for BrokenFunction {
    fn define_basis(&self, basis: &mut Basis<'_>) -> Result<(), TessellationError> {
        let a = basis.add_vertex(Point3::new(0.0, 0.0, 0.0), [0.0, 0.0])?;
        let b = basis.add_vertex(Point3::new(1.0, 0.0, 0.0), [1.0, 0.0])?;
        let c = basis.add_vertex(Point3::new(0.0, 1.0, 0.0), [0.0, 1.0])?;
        basis.add_triangle(a, b, c)
    }

    fn surface_pos(&self, _params: [f64; 2]) -> Point3 {
        Point3::new(f64::NAN, 0.0, 0.0)
    }
}

struct NoBasis;

impl TessFunction for NoBasis {
    fn define_basis(&self, _basis: &mut Basis<'_>) -> Result<(), TessellationError> {
        Ok(())
    }

    fn surface_pos(&self, params: [f64; 2]) -> Point3 {
        Point3::new(params[0], params[1], 0.0)
    }
}

const BUMP: BumpFunction = BumpFunction { height: 0.5 };

fn emit_mesh<F, E>(tess: &mut Tessellator<'_, F, E>) -> GeomMesh
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    let mut mesh = GeomMesh::default();
    tess.emit(&mut mesh).unwrap();
    mesh
}

fn directed_edges(mesh: &GeomMesh) -> HashSet<(u32, u32)> {
    mesh.triangles()
        .flat_map(|[a, b, c]| [(a, b), (b, c), (c, a)])
        .collect()
}

fn longest_cell_side<F, E>(tess: &Tessellator<'_, F, E>) -> f64
where
    F: TessFunction + ?Sized,
    E: ErrorBound + ?Sized,
{
    let mut longest: f64 = 0.0;
    for cell in &tess.cells {
        let corners = tess.cell_corners(cell).unwrap();
        for k in 0..3 {
            let a = tess.reg.vertex(corners[k]).unwrap().position;
            let b = tess.reg.vertex(corners[(k + 1) % 3]).unwrap().position;
            longest = longest.max(a.distance_to(b));
        }
    }
    longest
}

fn on_square_boundary(params: [f64; 2]) -> bool {
    params
        .iter()
        .any(|&t| t.abs() < 1e-12 || (t - 1.0).abs() < 1e-12)
}

#[test]
fn shared_edges_are_refined_identically_from_both_sides() {
    let mut tess = Tessellator::new(&BUMP, &0.05, TessellationOptions::default()).unwrap();
    tess.run().unwrap();
    let mesh = emit_mesh(&mut tess);
    let uvs = mesh.uvs.as_ref().unwrap();

    let edges = directed_edges(&mesh);
    let mut interior = 0;
    for &(a, b) in &edges {
        let (pa, pb) = (uvs[a as usize], uvs[b as usize]);
        let mid = [(pa[0] + pb[0]) * 0.5, (pa[1] + pb[1]) * 0.5];
        if on_square_boundary(mid) {
            continue;
        }
        interior += 1;
        assert!(edges.contains(&(b, a)), "interior edge {a}->{b} has no twin");
    }
    assert!(interior > 0);

    // Diagonal vertices are corners of cells on both sides of it.
    let mut below = HashSet::new();
    let mut above = HashSet::new();
    for tri in mesh.triangles() {
        let centroid = tri
            .iter()
            .map(|&i| uvs[i as usize][0] - uvs[i as usize][1])
            .sum::<f64>();
        let side = if centroid > 0.0 { &mut below } else { &mut above };
        side.extend(tri);
    }
    let diagonal: Vec<u32> = (0..mesh.vertex_count() as u32)
        .filter(|&i| {
            let [u, v] = uvs[i as usize];
            (u - v).abs() < 1e-12 && !on_square_boundary([u, v])
        })
        .collect();
    // The diagonal was cut at least twice, so its halves were split too.
    assert!(diagonal.len() >= 2, "diagonal vertices: {diagonal:?}");
    for vertex in diagonal {
        assert!(below.contains(&vertex) && above.contains(&vertex));
    }
}

#[test]
fn output_edges_stay_within_bound() {
    let bound = 0.02;
    let mut tess = Tessellator::new(&BUMP, &bound, TessellationOptions::default()).unwrap();
    tess.run().unwrap();
    let mesh = emit_mesh(&mut tess);
    let uvs = mesh.uvs.as_ref().unwrap();

    for (a, b) in directed_edges(&mesh) {
        let (pa, pb) = (uvs[a as usize], uvs[b as usize]);
        let chord_mid = Point3::from(mesh.positions[a as usize])
            .midpoint(Point3::from(mesh.positions[b as usize]));
        let surface_mid = BUMP.surface_pos([(pa[0] + pb[0]) * 0.5, (pa[1] + pb[1]) * 0.5]);
        assert!(surface_mid.distance_to(chord_mid) <= bound + 1e-12);
    }
}

#[test]
fn every_cell_owns_three_live_edges() {
    let mut tess = Tessellator::new(&BUMP, &0.03, TessellationOptions::default()).unwrap();
    tess.define_basis().unwrap();
    assert_eq!(tess.cell_count(), 2);
    // Four sides plus a diagonal sampled once; the diagonal's twin is derived.
    assert_eq!(tess.stats().root_edges, 5);
    assert_eq!(tess.reg.edges.len(), 6);

    tess.structure().unwrap();
    assert_eq!(tess.reg.edges.len(), 3 * tess.cell_count());
    for cell in &tess.cells {
        for &edge in &cell.edges {
            assert!(tess.reg.edge(edge).unwrap().is_simple());
        }
    }
    let stats = tess.stats();
    assert!(stats.splits > 0);
    assert!(stats.discarded_edges > 0);
    assert!(stats.root_edges > stats.discarded_edges);
}

#[test]
fn no_vertex_is_left_behind() {
    let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
    let mut tess = Tessellator::new(&sphere, &0.02, TessellationOptions::default()).unwrap();
    tess.run().unwrap();
    let mesh = emit_mesh(&mut tess);

    assert_eq!(tess.stats().unreferenced_vertices, 0);
    assert_eq!(tess.stats().vertices, mesh.vertex_count());
    assert_eq!(tess.stats().cells, mesh.triangle_count());
    assert_eq!(count_edge_topology(&mesh.indices), (0, 0));
    assert!(mesh.normals.is_some());
}

#[test]
fn shortest_split_tie_break_keeps_mesh_closed() {
    let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
    let options = TessellationOptions::default().with_tie_break(SplitTieBreak::ShortestSplit);
    let mut tess = Tessellator::new(&sphere, &0.02, options).unwrap();
    tess.run().unwrap();
    let mesh = emit_mesh(&mut tess);
    assert_eq!(count_edge_topology(&mesh.indices), (0, 0));
}

#[test]
fn coarse_seamed_basis_converges_by_bisecting_long_edges() {
    // Nine quads over a torus: the cells are long and thin across the
    // seams, so splitting only through curved edges would fan out forever.
    let torus = ParametricFunction::new(TorusSurface::new(Point3::ORIGIN, 2.0, 0.5).unwrap())
        .with_grid(1, 1);
    let mut tess = Tessellator::new(&torus, &0.05, TessellationOptions::default()).unwrap();
    tess.run().unwrap();
    let stats = tess.stats();
    assert_eq!(stats.basis_triangles, 18);
    assert!(stats.forced_bisections > 0);
    assert!(stats.cells < 4_000, "{} cells", stats.cells);

    for cell in &tess.cells {
        for &edge in &cell.edges {
            assert!(tess.reg.edge(edge).unwrap().is_simple());
        }
    }
    let mesh = emit_mesh(&mut tess);
    assert_eq!(count_edge_topology(&mesh.indices), (0, 0));
    // Closed genus-one surface.
    assert_eq!(mesh.triangle_count(), 2 * mesh.vertex_count());
}

#[test]
fn split_cells_shrink_through_their_longest_edge() {
    let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
    let mut tess = Tessellator::new(&sphere, &0.01, TessellationOptions::default()).unwrap();
    tess.define_basis().unwrap();
    let before = longest_cell_side(&tess);
    tess.structure().unwrap();
    assert!(longest_cell_side(&tess) < 0.75 * before);
}

#[test]
fn runs_are_deterministic() {
    let run = || {
        let mut tess = Tessellator::new(&BUMP, &0.01, TessellationOptions::default()).unwrap();
        tess.run().unwrap();
        (emit_mesh(&mut tess), tess.stats())
    };
    let (first, first_stats) = run();
    let (second, second_stats) = run();
    assert_eq!(first, second);
    assert_eq!(first_stats, second_stats);
}

#[test]
fn phases_must_run_in_order() {
    let mut tess = Tessellator::new(&BUMP, &0.05, TessellationOptions::default()).unwrap();
    assert!(matches!(tess.structure(), Err(TessellationError::Internal(_))));
    assert!(matches!(tess.assign_indices(), Err(TessellationError::Internal(_))));

    tess.define_basis().unwrap();
    assert!(matches!(tess.define_basis(), Err(TessellationError::Internal(_))));
    let mut mesh = GeomMesh::default();
    assert!(matches!(tess.emit(&mut mesh), Err(TessellationError::Internal(_))));
    assert!(mesh.positions.is_empty());

    tess.structure().unwrap();
    tess.assign_indices().unwrap();
    tess.emit(&mut mesh).unwrap();
    assert!(mesh.triangle_count() > 2);
}

#[test]
fn empty_basis_is_rejected() {
    let mut tess = Tessellator::new(&NoBasis, &0.1, TessellationOptions::default()).unwrap();
    assert_eq!(tess.define_basis(), Err(TessellationError::EmptyBasis));
}

#[test]
fn non_finite_surface_is_reported() {
    let mut tess =
        Tessellator::new(&BrokenFunction, &0.01, TessellationOptions::default()).unwrap();
    assert!(matches!(
        tess.define_basis(),
        Err(TessellationError::NonFinitePosition { .. })
    ));
}

#[test]
fn non_positive_bound_is_rejected() {
    for bound in [0.0, -0.1, f64::NAN] {
        let mut tess = Tessellator::new(&BUMP, &bound, TessellationOptions::default()).unwrap();
        assert!(matches!(
            tess.define_basis(),
            Err(TessellationError::InvalidErrorBound { .. })
        ));
    }
}

#[test]
fn depth_and_cell_limits_abort_the_run() {
    let shallow = TessellationOptions::default().with_max_depth(1);
    let mut tess = Tessellator::new(&BUMP, &0.001, shallow).unwrap();
    assert_eq!(
        tess.define_basis(),
        Err(TessellationError::RecursionLimit { max_depth: 1 })
    );

    let small = TessellationOptions::default().with_max_cells(4);
    let mut tess = Tessellator::new(&BUMP, &0.001, small).unwrap();
    tess.define_basis().unwrap();
    assert_eq!(
        tess.structure(),
        Err(TessellationError::RefinementLimit { max_cells: 4 })
    );
}

#[test]
fn invalid_options_fail_construction() {
    let options = TessellationOptions::default().with_max_depth(0);
    assert!(matches!(
        Tessellator::new(&BUMP, &0.1, options),
        Err(TessellationError::InvalidOptions(_))
    ));
}
