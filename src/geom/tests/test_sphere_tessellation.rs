//! End-to-end tessellation of a sphere: a closed surface with a seam and
//! two poles.

use crate::geom::{
    ParametricFunction, Point3, SphereSurface, TessellationOptions, tessellate,
    tessellate_with_options,
};

const RADIUS: f64 = 1.0;

fn unit_sphere() -> ParametricFunction<SphereSurface> {
    ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, RADIUS).unwrap())
}

#[test]
fn sphere_is_closed_and_outward() {
    let (mesh, diag) = tessellate(&unit_sphere(), &0.01).unwrap();

    mesh.validate().expect("mesh validate");
    assert!(diag.is_valid_solid(), "{diag}");
    assert_eq!(diag.degenerate_triangle_count, 0);
    assert!(!diag.has_warnings(), "{:?}", diag.warnings);
    assert!(
        (50..=2000).contains(&mesh.vertex_count()),
        "unexpected vertex count {}",
        mesh.vertex_count()
    );

    let volume = diag.enclosed_volume.expect("closed mesh has a volume");
    let exact = 4.0 / 3.0 * std::f64::consts::PI;
    assert!(volume > 0.0);
    assert!(volume < exact && exact - volume < 0.15, "volume {volume}");
}

#[test]
fn sphere_vertices_lie_on_surface() {
    let (mesh, _) = tessellate(&unit_sphere(), &0.01).unwrap();
    for p in &mesh.positions {
        let r = Point3::from(*p).to_vec3().length();
        assert!((r - RADIUS).abs() < 1e-12);
    }
}

#[test]
fn sphere_chords_respect_error_bound() {
    let bound = 0.01;
    let (mesh, _) = tessellate(&unit_sphere(), &bound).unwrap();

    for [a, b, c] in mesh.triangles() {
        for (i, j) in [(a, b), (b, c), (c, a)] {
            let pi = mesh.position(i).unwrap();
            let pj = mesh.position(j).unwrap();
            let sagitta = RADIUS - pi.midpoint(pj).to_vec3().length();
            assert!(sagitta <= bound + 1e-9, "edge {i}-{j} sags by {sagitta}");
        }
    }
}

#[test]
fn sphere_normals_are_radial() {
    let (mesh, _) = tessellate(&unit_sphere(), &0.02).unwrap();
    let normals = mesh.normals.as_ref().expect("analytic normals");
    assert_eq!(normals.len(), mesh.vertex_count());
    for (p, n) in mesh.positions.iter().zip(normals) {
        let dot = p[0] * n[0] + p[1] * n[1] + p[2] * n[2];
        assert!((dot - 1.0).abs() < 1e-9);
    }
}

#[test]
fn smooth_normals_fill_in_without_analytic_ones() {
    let plain = unit_sphere().with_analytic_normals(false);
    let (mesh, _) = tessellate(&plain, &0.02).unwrap();
    let normals = mesh.normals.as_ref().expect("computed normals");
    for (p, n) in mesh.positions.iter().zip(normals) {
        let dot = p[0] * n[0] + p[1] * n[1] + p[2] * n[2];
        assert!(dot > 0.9, "normal points away from the radius: {dot}");
    }

    let options = TessellationOptions {
        compute_missing_normals: false,
        ..TessellationOptions::default()
    };
    let (mesh, _) = tessellate_with_options(&plain, &0.02, options).unwrap();
    assert!(mesh.normals.is_none());
}

#[test]
fn tighter_bound_refines_much_further() {
    let (coarse, _) = tessellate(&unit_sphere(), &0.01).unwrap();
    let (fine, diag) = tessellate(&unit_sphere(), &1e-4).unwrap();
    assert!(diag.is_valid_solid());
    assert!(
        fine.triangle_count() >= 10 * coarse.triangle_count(),
        "{} vs {}",
        fine.triangle_count(),
        coarse.triangle_count()
    );
}

#[test]
fn denser_basis_still_meshes_closed() {
    let dense = unit_sphere().with_grid(12, 8);
    let (mesh, diag) = tessellate(&dense, &0.01).unwrap();
    assert!(diag.is_valid_solid(), "{diag}");
    assert!(diag.basis_triangle_count == 12 * 8 * 2 - 2 * 12);
    assert!(mesh.triangle_count() >= diag.basis_triangle_count);
}
