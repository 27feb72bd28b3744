mod test_error_bounds;
mod test_sphere_tessellation;
mod test_torus_tessellation;
