//! Named demonstration surfaces used by the CLI and the WASM entry point.

use super::core::{Point3, Vec3};
use super::function::TessFunction;
use super::parametric::ParametricFunction;
use super::surface::{SincSurface, SphereSurface, TorusSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePreset {
    /// Sphere of radius 1 at the origin.
    UnitSphere,
    /// Torus with major radius 1 and minor radius 0.35 around the z axis.
    Torus,
    /// Rippled `sin(r)/r` height field over `[-4, 4]²`.
    Sinc,
}

impl SurfacePreset {
    pub const ALL: [SurfacePreset; 3] = [Self::UnitSphere, Self::Torus, Self::Sinc];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::UnitSphere => "sphere",
            Self::Torus => "torus",
            Self::Sinc => "sinc",
        }
    }

    /// Looks a preset up by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|preset| preset.name() == name)
    }

    #[must_use]
    pub fn function(self) -> Box<dyn TessFunction + Send + Sync> {
        match self {
            Self::UnitSphere => Box::new(ParametricFunction::new(SphereSurface {
                center: Point3::ORIGIN,
                x_axis: Vec3::X,
                y_axis: Vec3::Y,
                z_axis: Vec3::Z,
                radius: 1.0,
            })),
            Self::Torus => Box::new(ParametricFunction::new(TorusSurface {
                center: Point3::ORIGIN,
                x_axis: Vec3::X,
                y_axis: Vec3::Y,
                z_axis: Vec3::Z,
                major_radius: 1.0,
                minor_radius: 0.35,
            })),
            Self::Sinc => Box::new(ParametricFunction::new(SincSurface {
                center: Point3::ORIGIN,
                extent: 4.0,
                amplitude: 1.0,
                frequency: 3.0,
            })),
        }
    }
}
