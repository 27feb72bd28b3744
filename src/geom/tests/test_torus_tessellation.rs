use std::collections::HashSet;

use crate::geom::{
    ParametricFunction, Point3, SurfacePreset, TorusSurface, tessellate,
};

#[test]
fn torus_closes_across_both_seams() {
    let torus = SurfacePreset::Torus.function();
    let (mesh, diag) = tessellate(torus.as_ref(), &0.005).unwrap();

    assert!(diag.is_valid_solid(), "{diag}");
    assert_eq!(diag.open_edge_count, 0);

    // Seam vertices are shared, never duplicated.
    let distinct: HashSet<[i64; 3]> = mesh
        .positions
        .iter()
        .map(|p| p.map(|c| (c * 1e9).round() as i64))
        .collect();
    assert_eq!(distinct.len(), mesh.vertex_count());
}

#[test]
fn torus_volume_converges() {
    let (major, minor) = (2.0, 0.5);
    let torus = ParametricFunction::new(TorusSurface::new(Point3::ORIGIN, major, minor).unwrap());
    let exact = 2.0 * std::f64::consts::PI.powi(2) * major * minor * minor;

    let (_, coarse) = tessellate(&torus, &0.02).unwrap();
    let (_, fine) = tessellate(&torus, &0.002).unwrap();
    let coarse_gap = (exact - coarse.enclosed_volume.unwrap()).abs();
    let fine_gap = (exact - fine.enclosed_volume.unwrap()).abs();

    assert!(fine_gap < coarse_gap);
    assert!(fine_gap / exact < 0.01, "relative gap {}", fine_gap / exact);
}

#[test]
fn coarse_grid_is_raised_to_minimum() {
    let torus = ParametricFunction::new(TorusSurface::new(Point3::ORIGIN, 2.0, 0.5).unwrap())
        .with_grid(1, 1);
    assert_eq!(torus.grid(), (3, 3));
    let (_, diag) = tessellate(&torus, &0.05).unwrap();
    assert_eq!(diag.basis_triangle_count, 18);
    assert!(diag.is_valid_solid(), "{diag}");
    // Long seam-spanning cells only converge once their simple sides are cut.
    assert!(diag.forced_bisection_count > 0);
}
