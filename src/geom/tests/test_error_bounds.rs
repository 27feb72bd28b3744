use crate::geom::{
    ErrorBound, ParametricFunction, Point3, PositionalError, SphereSurface, SurfacePreset,
    TessellationError, tessellate,
};

#[test]
fn smaller_bound_never_means_fewer_triangles() {
    let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
    let counts: Vec<usize> = [0.2, 0.05, 0.0125, 0.003]
        .iter()
        .map(|bound| tessellate(&sphere, bound).unwrap().0.triangle_count())
        .collect();
    for pair in counts.windows(2) {
        assert!(pair[0] < pair[1], "{counts:?}");
    }
}

#[test]
fn positional_bound_refines_where_it_is_tight() {
    let sphere = ParametricFunction::new(SphereSurface::new(Point3::ORIGIN, 1.0).unwrap());
    let bound = PositionalError(|p: Point3| if p.x > 0.0 { 0.002 } else { 0.05 });
    let (mesh, diag) = tessellate(&sphere, &bound).unwrap();
    assert!(diag.is_valid_solid(), "{diag}");
    assert!(diag.forced_bisection_count > 0);

    let (mut east, mut west) = (0, 0);
    for [a, b, c] in mesh.triangles() {
        let x = [a, b, c]
            .iter()
            .map(|&i| mesh.position(i).unwrap().x)
            .sum::<f64>()
            / 3.0;
        if x > 0.5 {
            east += 1;
        } else if x < -0.5 {
            west += 1;
        }
    }
    assert!(east > 4 * west, "east {east}, west {west}");
}

#[test]
fn bound_that_turns_non_positive_is_reported() {
    let sinc = SurfacePreset::Sinc.function();
    let bound = PositionalError(|p: Point3| if p.z > 0.5 { 0.0 } else { 0.05 });
    let err = tessellate(sinc.as_ref(), &bound).unwrap_err();
    assert_eq!(err, TessellationError::InvalidErrorBound { value: 0.0 });
}

#[test]
fn bound_is_usable_through_a_trait_object() {
    let sphere = SurfacePreset::UnitSphere.function();
    let bound: Box<dyn ErrorBound> = Box::new(0.05);
    let (mesh, diag) = tessellate(sphere.as_ref(), &bound).unwrap();
    assert!(mesh.triangle_count() > 0);
    assert!(diag.is_watertight());
}
